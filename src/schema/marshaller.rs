//! Compiled record schemas
//!
//! [`RecordSchema::build`] validates a record's descriptor once and resolves
//! everything later stages need: the table name, each field's column name,
//! the primary key, the key generation strategy and shadowing.

use super::descriptor::{
    Column, Computed, FieldType, FullTextIndex, GeneratedValue, GenerationType, Index,
    RecordDescriptor, TableGenerator, UniqueConstraint,
};
use super::record::{PersistentRecord, RecordType};
use crate::ast::{Key, Value};
use crate::error::{DepotError, DepotResult};
use std::collections::HashSet;

/// A validated persistent field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub column_name: String,
    pub field_type: FieldType,
    pub column: Column,
    pub id: bool,
    pub generated: Option<GeneratedValue>,
    pub computed: Option<Computed>,
}

impl FieldSchema {
    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    pub fn shadow_of(&self) -> Option<RecordType> {
        self.computed.as_ref().and_then(|c| c.shadow_of)
    }

    /// Whether the database assigns this field's value on insert
    pub fn is_identity(&self) -> bool {
        self.generated
            .as_ref()
            .is_some_and(|g| g.strategy.is_identity())
    }
}

/// Key generation resolved from a field's `generated` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct KeyGenerator {
    pub field: String,
    pub strategy: GenerationType,
    pub table_generator: Option<TableGenerator>,
}

/// A validated persistent record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    record: RecordType,
    type_name: String,
    table_name: Option<String>,
    computed: Option<Computed>,
    fields: Vec<FieldSchema>,
    key_generator: Option<KeyGenerator>,
    indexes: Vec<Index>,
    unique_constraints: Vec<UniqueConstraint>,
    full_text_indexes: Vec<FullTextIndex>,
    table_generators: Vec<TableGenerator>,
}

impl RecordSchema {
    /// Build the schema of `record` from its descriptor
    pub fn build(record: RecordType) -> DepotResult<Self> {
        Self::from_descriptor(record, record.descriptor())
    }

    pub fn of<R: PersistentRecord>() -> DepotResult<Self> {
        Self::build(RecordType::of::<R>())
    }

    pub fn from_descriptor(record: RecordType, descriptor: RecordDescriptor) -> DepotResult<Self> {
        let RecordDescriptor {
            type_name,
            table_name,
            computed,
            fields: field_descriptors,
            indexes,
            unique_constraints,
            full_text_indexes,
            table_generators,
        } = descriptor;

        if let Some(shadow) = computed.as_ref().and_then(|c| c.shadow_of) {
            if shadow == record {
                return Err(DepotError::invalid_schema(&type_name, "record shadows itself"));
            }
            if shadow.descriptor().computed.is_some() {
                return Err(DepotError::invalid_schema(
                    &type_name,
                    format!("can not shadow computed record `{shadow}`"),
                ));
            }
        }

        let table_name = match &computed {
            Some(_) => None,
            None => Some(table_name.unwrap_or_else(|| type_name.clone())),
        };

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(field_descriptors.len());
        for field in field_descriptors {
            if !seen.insert(field.name.clone()) {
                return Err(DepotError::invalid_schema(
                    &type_name,
                    format!("duplicate field `{}`", field.name),
                ));
            }

            let mut column = field.column;
            if let Some(shadow) = field.computed.as_ref().and_then(|c| c.shadow_of) {
                let inherited = shadowed_column(&type_name, &field.name, shadow)?;
                if column == Column::default() {
                    column = inherited;
                } else {
                    column.name.get_or_insert(inherited.name.unwrap_or_default());
                }
            }

            fields.push(FieldSchema {
                column_name: column.name.clone().unwrap_or_else(|| field.name.clone()),
                name: field.name,
                field_type: field.field_type,
                column,
                id: field.id,
                generated: field.generated,
                computed: field.computed,
            });
        }

        let key_generator = resolve_key_generator(&type_name, &fields, &table_generators)?;

        for index in &indexes {
            check_fields_exist(&type_name, &fields, &index.fields, "index")?;
        }
        for fts in &full_text_indexes {
            check_fields_exist(&type_name, &fields, &fts.fields, "full-text index")?;
        }

        Ok(Self {
            record,
            type_name,
            table_name,
            computed,
            fields,
            key_generator,
            indexes,
            unique_constraints,
            full_text_indexes,
            table_generators,
        })
    }

    #[inline]
    pub fn record(&self) -> RecordType {
        self.record
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Table name, or `None` for a computed record
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// The concrete record a computed record reads from
    pub fn shadow_of(&self) -> Option<RecordType> {
        self.computed.as_ref().and_then(|c| c.shadow_of)
    }

    /// The record whose table backs this one's `from`: itself, its shadow, or none
    pub fn table_record(&self) -> Option<RecordType> {
        match &self.computed {
            None => Some(self.record),
            Some(computed) => computed.shadow_of,
        }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn require_field(&self, name: &str) -> DepotResult<&FieldSchema> {
        self.field(name)
            .ok_or_else(|| DepotError::unknown_field(&self.type_name, name))
    }

    /// Fields stored in this record's own table
    pub fn column_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| !f.is_computed())
    }

    /// Primary key field names in declaration order
    pub fn primary_key_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.id)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.fields.iter().any(|f| f.id)
    }

    /// Fields the database fills in on insert
    pub fn identity_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_identity())
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn key_generator(&self) -> Option<&KeyGenerator> {
        self.key_generator.as_ref()
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }

    pub fn full_text_indexes(&self) -> &[FullTextIndex] {
        &self.full_text_indexes
    }

    pub fn full_text_index(&self, name: &str) -> Option<&FullTextIndex> {
        self.full_text_indexes.iter().find(|f| f.name == name)
    }

    pub fn table_generators(&self) -> &[TableGenerator] {
        &self.table_generators
    }

    /// The key of `instance`, built from its primary key field values
    pub fn primary_key<R: PersistentRecord>(&self, instance: &R) -> DepotResult<Key> {
        if RecordType::of::<R>() != self.record {
            return Err(DepotError::KeyMismatch {
                record: self.type_name.clone(),
                reason: format!("instance is a `{}`", RecordType::of::<R>()),
            });
        }
        self.make_key(instance.field_values())
    }

    /// Pick the primary key components out of a list of field values
    pub fn make_key(&self, values: Vec<(&'static str, Value)>) -> DepotResult<Key> {
        let pk = self.primary_key_fields();
        if pk.is_empty() {
            return Err(DepotError::KeyMismatch {
                record: self.type_name.clone(),
                reason: "record has no primary key".to_string(),
            });
        }
        let mut key_values = Vec::with_capacity(pk.len());
        for field in pk {
            let value = values
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| DepotError::KeyMismatch {
                    record: self.type_name.clone(),
                    reason: format!("missing value for `{field}`"),
                })?;
            key_values.push((field.to_string(), value));
        }
        Ok(Key::of(self.record, key_values))
    }
}

/// Column a computed field inherits from the field it shadows, with its
/// name resolved
fn shadowed_column(record: &str, field: &str, shadow: RecordType) -> DepotResult<Column> {
    let invalid = |reason: String| DepotError::InvalidShadow {
        record: record.to_string(),
        field: field.to_string(),
        reason,
    };

    let target = shadow.descriptor();
    if target.computed.is_some() {
        return Err(invalid(format!("`{shadow}` is a computed record")));
    }
    let Some(target_field) = target.find_field(field) else {
        return Err(invalid(format!("`{shadow}` has no field `{field}`")));
    };
    match &target_field.computed {
        Some(c) if c.shadow_of.is_some() => Err(invalid(format!(
            "`{shadow}.{field}` is itself a shadowing field"
        ))),
        Some(_) => Err(invalid(format!("`{shadow}.{field}` is a computed field"))),
        None => {
            let mut column = target_field.column.clone();
            column.name.get_or_insert_with(|| target_field.name.clone());
            Ok(column)
        }
    }
}

fn resolve_key_generator(
    record: &str,
    fields: &[FieldSchema],
    table_generators: &[TableGenerator],
) -> DepotResult<Option<KeyGenerator>> {
    let generated: Vec<&FieldSchema> = fields.iter().filter(|f| f.generated.is_some()).collect();
    let Some(field) = generated.first() else {
        return Ok(None);
    };
    if generated.len() > 1 {
        return Err(DepotError::invalid_schema(
            record,
            "only one field may declare a generated value",
        ));
    }

    let pk_count = fields.iter().filter(|f| f.id).count();
    if !field.id || pk_count != 1 {
        return Err(DepotError::invalid_schema(
            record,
            format!(
                "generated value on `{}` requires it to be the single primary key field",
                field.name
            ),
        ));
    }
    if !field.field_type.is_numeric() {
        return Err(DepotError::invalid_schema(
            record,
            format!("generated value on non-numeric field `{}`", field.name),
        ));
    }

    let Some(generated) = &field.generated else {
        return Ok(None);
    };
    let table_generator = match generated.strategy {
        GenerationType::Table => {
            let Some(name) = &generated.generator else {
                return Err(DepotError::invalid_schema(
                    record,
                    format!("table strategy on `{}` names no generator", field.name),
                ));
            };
            let found = table_generators
                .iter()
                .find(|g| &g.name == name)
                .cloned()
                .ok_or_else(|| {
                    DepotError::invalid_schema(record, format!("unknown table generator `{name}`"))
                })?;
            Some(found)
        }
        _ => None,
    };

    Ok(Some(KeyGenerator {
        field: field.name.clone(),
        strategy: generated.strategy,
        table_generator,
    }))
}

fn check_fields_exist(
    record: &str,
    fields: &[FieldSchema],
    names: &[String],
    what: &str,
) -> DepotResult<()> {
    for name in names {
        if !fields.iter().any(|f| &f.name == name) {
            return Err(DepotError::invalid_schema(
                record,
                format!("{what} references unknown field `{name}`"),
            ));
        }
    }
    Ok(())
}
