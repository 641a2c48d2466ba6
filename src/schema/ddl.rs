//! Table declarations
//!
//! Column definitions and the declaration list a `create table` statement is
//! assembled from. Executing DDL and migrating existing tables is left to
//! the caller.

use super::descriptor::{FieldType, GenerationType};
use super::marshaller::{FieldSchema, RecordSchema};
use crate::ast::Dialect;
use crate::error::{DepotError, DepotResult};

/// Strings at least this long map to `TEXT` rather than `VARCHAR(n)`
const MAX_VARCHAR_LENGTH: u32 = 1 << 15;

impl RecordSchema {
    /// SQL following the column name in a column declaration, e.g.
    /// ` VARCHAR(255) NOT NULL`
    ///
    /// Computed fields have no column and yield `None`.
    pub fn column_definition(
        &self,
        field: &FieldSchema,
        dialect: Dialect,
    ) -> DepotResult<Option<String>> {
        if field.is_computed() {
            return Ok(None);
        }

        if let Some(generated) = &field.generated {
            match generated.strategy {
                GenerationType::Auto | GenerationType::Identity => {
                    return Ok(Some(" SERIAL UNIQUE".to_string()));
                }
                GenerationType::Sequence => {
                    return Err(DepotError::Unsupported(format!(
                        "sequence key generation on `{}.{}`",
                        self.type_name(),
                        field.name
                    )));
                }
                // the value comes from the generator table
                GenerationType::Table => {}
            }
        }

        let column = &field.column;
        let sql_type = match &column.definition {
            Some(definition) => definition.clone(),
            None => column_type(&field.field_type, column.length, dialect).ok_or_else(|| {
                DepotError::Unsupported(format!(
                    "no column type for `{}.{}`; declare an explicit definition",
                    self.type_name(),
                    field.name
                ))
            })?,
        };

        let mut out = format!(" {sql_type}");
        if !column.nullable {
            out.push_str(" NOT NULL");
        }
        if column.unique {
            out.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default_value {
            out.push_str(" DEFAULT ");
            out.push_str(default);
        }
        Ok(Some(out))
    }

    /// Column declarations, then indexes and unique constraints, then the
    /// primary key; empty for a computed record
    pub fn declarations(&self, dialect: Dialect) -> DepotResult<Vec<String>> {
        if self.table_name().is_none() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for field in self.column_fields() {
            if let Some(definition) = self.column_definition(field, dialect)? {
                out.push(format!(
                    "{}{}",
                    dialect.quote_ident(&field.column_name),
                    definition
                ));
            }
        }

        for index in self.indexes() {
            let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
            out.push(format!(
                "{kind} {} ({})",
                dialect.quote_ident(&index.name),
                self.column_list(&index.fields, dialect)?
            ));
        }

        for constraint in self.unique_constraints() {
            let columns: Vec<String> = constraint
                .columns
                .iter()
                .map(|c| dialect.quote_ident(c))
                .collect();
            out.push(format!("UNIQUE ({})", columns.join(", ")));
        }

        let pk = self.primary_key_fields();
        if !pk.is_empty() {
            let pk: Vec<String> = pk.iter().map(|f| f.to_string()).collect();
            out.push(format!("PRIMARY KEY ({})", self.column_list(&pk, dialect)?));
        }
        Ok(out)
    }

    fn column_list(&self, fields: &[String], dialect: Dialect) -> DepotResult<String> {
        let columns = fields
            .iter()
            .map(|f| {
                self.require_field(f)
                    .map(|field| dialect.quote_ident(&field.column_name))
            })
            .collect::<DepotResult<Vec<_>>>()?;
        Ok(columns.join(", "))
    }
}

fn column_type(field_type: &FieldType, length: u32, dialect: Dialect) -> Option<String> {
    let sql = match (field_type, dialect) {
        (FieldType::Boolean, Dialect::MySql) => "TINYINT",
        (FieldType::Boolean, Dialect::PostgreSql) => "BOOLEAN",
        (FieldType::TinyInt, Dialect::MySql) => "TINYINT",
        (FieldType::TinyInt, Dialect::PostgreSql) => "SMALLINT",
        (FieldType::SmallInt, _) => "SMALLINT",
        (FieldType::Integer, _) => "INTEGER",
        (FieldType::BigInt, _) => "BIGINT",
        (FieldType::Float, _) => "FLOAT",
        (FieldType::Double, Dialect::MySql) => "DOUBLE",
        (FieldType::Double, Dialect::PostgreSql) => "DOUBLE PRECISION",
        (FieldType::Text, _) => {
            if length < MAX_VARCHAR_LENGTH {
                return Some(format!("VARCHAR({length})"));
            }
            "TEXT"
        }
        (FieldType::Bytes, Dialect::PostgreSql) => "BYTEA",
        (FieldType::Bytes, Dialect::MySql) => {
            if length < MAX_VARCHAR_LENGTH {
                return Some(format!("VARBINARY({length})"));
            }
            if length < (1 << 16) {
                "BLOB"
            } else if length < (1 << 24) {
                "MEDIUMBLOB"
            } else {
                "LONGBLOB"
            }
        }
        (FieldType::Date, _) => "DATE",
        (FieldType::Timestamp, Dialect::MySql) => "DATETIME",
        (FieldType::Timestamp, Dialect::PostgreSql) => "TIMESTAMP",
        (FieldType::Json, _) => "JSON",
        (FieldType::Custom(_), _) => return None,
    };
    Some(sql.to_string())
}
