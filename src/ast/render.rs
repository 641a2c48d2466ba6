//! SQL compilation
//!
//! This module turns clause trees into SQL text. It is the only place in the
//! crate where SQL strings are constructed.
//!
//! # Architecture
//!
//! - [`SqlCompiler`]: resolves schemas through a [`SchemaCache`], validates
//!   closure and drives the renderer
//! - `SqlRenderer`: single-pass output buffer; every `?` it writes pushes the
//!   matching value, so placeholders and parameters can never drift apart
//!
//! Keywords are written in lowercase. Identifiers are quoted per [`Dialect`];
//! table abbreviations (`t0`, `t1`, ...) are generated and never quoted.

use super::clause::{
    DefinitionKind, DeleteClause, FieldDefinition, InsertClause, SelectClause, Statement,
    UpdateClause, WhereClause,
};
use super::dialect::Dialect;
use super::expr::{ColumnExp, Expr};
use super::key::{Key, MultiKey};
use super::params::{ParamCollector, Value};
use super::scope;
use super::types::DepotTypes;
use crate::error::{DepotError, DepotResult};
use crate::schema::{FieldSchema, RecordType, SchemaCache};
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashSet;

/// Default buffer capacity for a statement
const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Compiler configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    pub dialect: Dialect,
    /// Break clauses onto separate lines
    pub pretty: bool,
}

/// SQL text plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiles statements against the schemas of a [`SchemaCache`]
///
/// Compilation is pure: the same tree and options always produce the same
/// SQL and parameters.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler<'c> {
    cache: &'c SchemaCache,
    options: CompilerOptions,
}

impl<'c> SqlCompiler<'c> {
    pub fn new(cache: &'c SchemaCache, dialect: Dialect) -> Self {
        Self::with_options(
            cache,
            CompilerOptions {
                dialect,
                pretty: false,
            },
        )
    }

    pub fn with_options(cache: &'c SchemaCache, options: CompilerOptions) -> Self {
        Self { cache, options }
    }

    pub fn pretty(mut self) -> Self {
        self.options.pretty = true;
        self
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    /// Compile a statement into SQL text and its bound values
    ///
    /// Closure is validated before anything is rendered, so a failed compile
    /// never yields partial output.
    pub fn compile(&self, statement: &Statement) -> DepotResult<CompiledQuery> {
        let mut records = IndexSet::new();
        statement.collect_records(&mut records);
        let types = DepotTypes::from_set(self.cache, &records)?;
        scope::validate(statement, &types)?;

        let mut renderer = SqlRenderer::new(&types, self.options);
        renderer.render_statement(statement)?;
        let query = renderer.finish();

        tracing::debug!(
            kind = statement.kind(),
            record = %statement.record(),
            dialect = %self.options.dialect,
            params = query.params.len(),
            sql = %query.sql,
            "compiled statement"
        );
        Ok(query)
    }

    /// Compile a free-standing expression
    ///
    /// Every record the expression references gets an abbreviation; no
    /// closure check applies since there is no enclosing select.
    pub fn compile_expr(&self, expr: &Expr) -> DepotResult<CompiledQuery> {
        let mut records = IndexSet::new();
        expr.collect_records(&mut records);
        let types = DepotTypes::from_set(self.cache, &records)?;

        let mut renderer = SqlRenderer::new(&types, self.options);
        renderer.render_expr(expr)?;
        Ok(renderer.finish())
    }
}

struct SqlRenderer<'a> {
    output: String,
    params: ParamCollector,
    indent_level: usize,
    pretty: bool,
    dialect: Dialect,
    types: &'a DepotTypes,
    /// Definitions of the selects being rendered, innermost last
    definitions: Vec<(RecordType, &'a [FieldDefinition])>,
    /// Field overrides apply only while expanding projections and keys
    enable_overrides: bool,
    /// Definitions and literal computed fields get `as <field>`
    aliasing: bool,
    /// Table written by name instead of abbreviation (MySQL delete)
    unaliased: Option<RecordType>,
}

impl<'a> SqlRenderer<'a> {
    fn new(types: &'a DepotTypes, options: CompilerOptions) -> Self {
        Self {
            output: String::with_capacity(DEFAULT_BUFFER_CAPACITY),
            params: ParamCollector::new(),
            indent_level: 0,
            pretty: options.pretty,
            dialect: options.dialect,
            types,
            definitions: Vec::new(),
            enable_overrides: false,
            aliasing: false,
            unaliased: None,
        }
    }

    fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.output,
            params: self.params.into_params(),
        }
    }

    // =========================================================================
    // Statement rendering
    // =========================================================================

    fn render_statement(&mut self, statement: &'a Statement) -> DepotResult<()> {
        match statement {
            Statement::Select(s) => self.render_select(s),
            Statement::Insert(s) => self.render_insert(s),
            Statement::Update(s) => self.render_update(s),
            Statement::Delete(s) => self.render_delete(s),
        }
    }

    fn render_select(&mut self, select: &'a SelectClause) -> DepotResult<()> {
        self.definitions.push((select.record, &select.definitions));
        let result = self.render_select_body(select);
        self.definitions.pop();
        result
    }

    fn render_select_body(&mut self, select: &'a SelectClause) -> DepotResult<()> {
        if select.from_override.is_none() {
            self.table_of(select.record)?;
        }

        self.write("select ");
        self.render_projection(select)?;

        self.newline();
        self.write("from ");
        match &select.from_override {
            Some(from) => {
                for (i, record) in from.records.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.render_table_ref(*record)?;
                }
            }
            None => self.render_table_ref(select.record)?,
        }

        let types = self.types;
        for join in &select.joins {
            self.newline();
            self.write(join.kind.as_sql());
            self.write(" ");
            let table_record = self.table_of(join.record)?;
            self.write_ident(types.table_name(table_record)?);
            self.write(" as ");
            match &join.alias {
                Some(alias) => self.write_ident(alias),
                None => self.write(types.abbreviation(table_record)?),
            }
            self.write(" on ");
            self.render_expr(&join.condition)?;
        }

        if let Some(where_clause) = &select.where_clause {
            self.render_where(where_clause)?;
        }

        if let Some(group_by) = &select.group_by {
            self.newline();
            self.write("group by ");
            for (i, term) in group_by.terms.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.render_expr(term)?;
            }
        }

        if let Some(order_by) = &select.order_by {
            self.newline();
            self.write("order by ");
            for (i, (term, order)) in order_by.terms.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.render_expr(term)?;
                self.write(" ");
                self.write(order.as_sql());
            }
        }

        if let Some(limit) = &select.limit {
            self.newline();
            self.write("limit ");
            self.bind(Value::Integer(clamp(limit.count)));
            self.write(" offset ");
            self.bind(Value::Integer(clamp(limit.offset)));
        }

        if select.for_update {
            self.newline();
            self.write("for update");
        }
        Ok(())
    }

    fn render_projection(&mut self, select: &'a SelectClause) -> DepotResult<()> {
        let types = self.types;
        let schema = types.schema(select.record)?;
        let fields: Vec<&FieldSchema> = if select.fields.is_empty() {
            schema.fields().iter().collect()
        } else {
            select
                .fields
                .iter()
                .map(|name| schema.require_field(name))
                .collect::<DepotResult<_>>()?
        };

        let record = select.record;
        self.scoped(true, true, |r| {
            let mut first = true;
            for field in fields {
                if !r.projects(record, field) {
                    continue;
                }
                if !first {
                    r.write(", ");
                }
                first = false;
                r.render_column(&ColumnExp::of(record, field.name.as_str()))?;
            }
            Ok(())
        })
    }

    /// Non-required computed fields with nothing defining them are left out
    fn projects(&self, record: RecordType, field: &FieldSchema) -> bool {
        match &field.computed {
            Some(computed) if !computed.required => {
                computed.definition.is_some() || self.definition(record, &field.name).is_some()
            }
            _ => true,
        }
    }

    fn render_insert(&mut self, insert: &'a InsertClause) -> DepotResult<()> {
        let types = self.types;
        let schema = types.schema(insert.record)?;
        let table = schema.table_name().ok_or_else(|| {
            DepotError::invalid_schema(insert.record, "computed records can not be inserted")
        })?;

        let identity: HashSet<&str> = insert
            .identity_fields
            .iter()
            .map(String::as_str)
            .chain(schema.identity_fields())
            .collect();
        let fields: Vec<&FieldSchema> = schema.column_fields().collect();

        self.write("insert into ");
        self.write_ident(table);
        self.write(" (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write_ident(&field.column_name);
        }
        self.write(")");

        self.newline();
        self.write("values (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if identity.contains(field.name.as_str()) {
                self.write("default");
                continue;
            }
            let value = insert
                .value(&field.name)
                .ok_or_else(|| DepotError::MissingValue {
                    record: insert.record.to_string(),
                    field: field.name.clone(),
                })?;
            self.bind(value.clone());
        }
        self.write(")");
        Ok(())
    }

    fn render_update(&mut self, update: &'a UpdateClause) -> DepotResult<()> {
        let Some(where_clause) = &update.where_clause else {
            return Err(DepotError::MissingWhere {
                record: update.record.to_string(),
            });
        };
        if update.assignments.is_empty() {
            return Err(DepotError::Unsupported(format!(
                "update of `{}` assigns no fields",
                update.record
            )));
        }

        let types = self.types;
        let schema = types.schema(update.record)?;
        let table = schema.table_name().ok_or_else(|| {
            DepotError::invalid_schema(update.record, "computed records can not be updated")
        })?;

        self.write("update ");
        self.write_ident(table);
        self.write(" as ");
        self.write(types.abbreviation(update.record)?);

        self.newline();
        self.write("set ");
        for (i, (name, value)) in update.assignments.iter().enumerate() {
            let field = schema.require_field(name)?;
            if field.is_computed() {
                return Err(DepotError::InvalidDefinition {
                    record: update.record.to_string(),
                    field: name.clone(),
                    reason: "computed fields can not be assigned",
                });
            }
            if i > 0 {
                self.write(", ");
            }
            self.write_ident(&field.column_name);
            self.write(" = ");
            self.render_expr(value)?;
        }

        self.render_where(where_clause)
    }

    fn render_delete(&mut self, delete: &'a DeleteClause) -> DepotResult<()> {
        let types = self.types;
        let table = types.schema(delete.record)?.table_name().ok_or_else(|| {
            DepotError::invalid_schema(delete.record, "computed records can not be deleted from")
        })?;

        self.write("delete from ");
        self.write_ident(table);
        if self.dialect.aliases_delete() {
            self.write(" as ");
            self.write(types.abbreviation(delete.record)?);
        } else {
            self.unaliased = Some(delete.record);
        }

        let result = self.render_where(&delete.where_clause);
        self.unaliased = None;
        result
    }

    // =========================================================================
    // Where clauses and keys
    // =========================================================================

    fn render_where(&mut self, where_clause: &'a WhereClause) -> DepotResult<()> {
        self.newline();
        self.write("where ");
        match where_clause {
            WhereClause::Condition(expr) => self.render_expr(expr),
            WhereClause::Key(key) => self.render_key(key),
            WhereClause::MultiKey(key) => self.render_multi_key(key),
        }
    }

    /// `pk1 = ? and pk2 is null ...` in primary key order
    fn render_key(&mut self, key: &Key) -> DepotResult<()> {
        let types = self.types;
        let primary_key = types.schema(key.record)?.primary_key_fields();
        let values = key.ordered_values(&primary_key)?;

        self.scoped(true, false, |r| {
            for (i, (field, value)) in primary_key.iter().zip(values).enumerate() {
                if i > 0 {
                    r.write(" and ");
                }
                r.render_key_component(key.record, field, value)?;
            }
            Ok(())
        })
    }

    fn render_multi_key(&mut self, key: &MultiKey) -> DepotResult<()> {
        let types = self.types;
        let primary_key = types.schema(key.record)?.primary_key_fields();
        let values = key.ordered_single(&primary_key)?;
        let fixed = primary_key.iter().filter(|field| **field != key.field);

        self.scoped(true, false, |r| {
            for (field, value) in fixed.zip(values) {
                r.render_key_component(key.record, field, value)?;
                r.write(" and ");
            }
            r.render_column(&ColumnExp::of(key.record, key.field.as_str()))?;
            r.write(" in (");
            r.bind_list(&key.values);
            r.write(")");
            Ok(())
        })
    }

    fn render_key_component(
        &mut self,
        record: RecordType,
        field: &str,
        value: &Value,
    ) -> DepotResult<()> {
        self.render_column(&ColumnExp::of(record, field))?;
        if value.is_null() {
            self.write(" is null");
        } else {
            self.write(" = ");
            self.bind(value.clone());
        }
        Ok(())
    }

    // =========================================================================
    // Expression rendering
    // =========================================================================

    fn render_expr(&mut self, expr: &'a Expr) -> DepotResult<()> {
        match expr {
            Expr::Column(column) => self.render_column(column)?,

            Expr::Literal(text) => self.write(text),

            Expr::Value(value) => self.bind(value.clone()),

            Expr::Function { name, args } => {
                self.write(name);
                self.write("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.render_expr(arg)?;
                }
                self.write(")");
            }

            Expr::EpochSeconds(inner) => match self.dialect {
                Dialect::MySql => {
                    self.write("unix_timestamp(");
                    self.render_expr(inner)?;
                    self.write(")");
                }
                Dialect::PostgreSql => {
                    self.write("extract(epoch from ");
                    self.render_expr(inner)?;
                    self.write(")");
                }
            },

            Expr::Binary { lhs, op, rhs } => {
                self.render_operand(lhs)?;
                self.write(" ");
                self.write(op.as_sql());
                self.write(" ");
                self.render_operand(rhs)?;
            }

            Expr::Multi { op, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        self.write(" ");
                        self.write(op.as_sql());
                        self.write(" ");
                    }
                    self.write("(");
                    self.render_expr(operand)?;
                    self.write(")");
                }
            }

            Expr::Not(inner) => {
                self.write("not (");
                self.render_expr(inner)?;
                self.write(")");
            }

            Expr::IsNull(column) => {
                self.render_column(column)?;
                self.write(" is null");
            }

            Expr::In { column, values } => {
                self.render_column(column)?;
                self.write(" in (");
                self.bind_list(values);
                self.write(")");
            }

            Expr::Exists(select) => {
                self.write("exists (");
                self.indent();
                self.newline_if_pretty();
                self.render_select(select)?;
                self.dedent();
                self.newline_if_pretty();
                self.write(")");
            }

            Expr::FullTextMatch {
                record,
                index,
                query,
            } => self.render_full_text(*record, index, query)?,
        }
        Ok(())
    }

    /// Operands of a binary operator are parenthesized iff they are compound
    fn render_operand(&mut self, expr: &'a Expr) -> DepotResult<()> {
        if expr.is_compound() {
            self.write("(");
            self.render_expr(expr)?;
            self.write(")");
            Ok(())
        } else {
            self.render_expr(expr)
        }
    }

    fn render_full_text(&mut self, record: RecordType, index: &str, query: &str) -> DepotResult<()> {
        let types = self.types;
        let schema = types.schema(record)?;
        let fts = schema.full_text_index(index).ok_or_else(|| {
            DepotError::invalid_schema(record, format!("no full-text index named `{index}`"))
        })?;
        let table_record = self.table_of(record)?;

        match self.dialect {
            Dialect::MySql => {
                self.write("match(");
                for (i, name) in fts.fields.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write_table_qualifier(table_record)?;
                    self.write(".");
                    self.write_ident(&schema.require_field(name)?.column_name);
                }
                self.write(") against (");
                self.bind(Value::from(query));
                self.write(" in boolean mode)");
            }
            Dialect::PostgreSql => {
                self.write_table_qualifier(table_record)?;
                self.write(".");
                self.write_ident(&format!("ftsCol_{}", fts.name));
                self.write(" @@ to_tsquery('default', ");
                self.bind(Value::from(query));
                self.write(")");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Column resolution
    // =========================================================================

    /// Write a field reference, substituting definitions, overrides and
    /// literal computed fields for the plain `abbreviation.column` form
    fn render_column(&mut self, column: &ColumnExp) -> DepotResult<()> {
        let Some(record) = column.record else {
            self.write_ident(&column.field);
            return Ok(());
        };
        let types = self.types;
        let schema = types.schema(record)?;
        let field = schema.require_field(&column.field)?;

        if let Some(definition) = self.definition(record, &column.field) {
            let applies = match definition.kind {
                DefinitionKind::Definition => true,
                DefinitionKind::Override => self.enable_overrides,
            };
            if applies {
                let aliasing = self.aliasing;
                // no nested overrides and no aliases inside a definition
                self.scoped(false, false, |r| r.render_expr(&definition.definition))?;
                if aliasing {
                    self.write_field_alias(&column.field);
                }
                return Ok(());
            }
        }

        if let Some(literal) = field.computed.as_ref().and_then(|c| c.definition.as_deref()) {
            self.write(literal);
            if self.aliasing {
                self.write_field_alias(&column.field);
            }
            return Ok(());
        }

        let Some(table_record) = field.shadow_of().or_else(|| schema.table_record()) else {
            return Err(DepotError::NoDefinition {
                record: record.to_string(),
                field: column.field.clone(),
            });
        };
        match &column.qualifier {
            Some(alias) => self.write_ident(alias),
            None => self.write_table_qualifier(table_record)?,
        }
        self.write(".");
        self.write_ident(&field.column_name);
        Ok(())
    }

    fn definition(&self, record: RecordType, field: &str) -> Option<&'a FieldDefinition> {
        self.definitions
            .iter()
            .rev()
            .find_map(|&(owner, definitions)| {
                if owner == record {
                    definitions.iter().find(|d| d.field == field)
                } else {
                    None
                }
            })
    }

    fn table_of(&self, record: RecordType) -> DepotResult<RecordType> {
        self.types
            .schema(record)?
            .table_record()
            .ok_or_else(|| DepotError::ComputedWithoutFrom {
                record: record.to_string(),
            })
    }

    /// `TABLE as t0`
    fn render_table_ref(&mut self, record: RecordType) -> DepotResult<()> {
        let types = self.types;
        let table_record = self.table_of(record)?;
        self.write_ident(types.table_name(table_record)?);
        self.write(" as ");
        self.write(types.abbreviation(table_record)?);
        Ok(())
    }

    fn write_table_qualifier(&mut self, table_record: RecordType) -> DepotResult<()> {
        let types = self.types;
        if self.unaliased == Some(table_record) {
            self.write_ident(types.table_name(table_record)?);
        } else {
            self.write(types.abbreviation(table_record)?);
        }
        Ok(())
    }

    fn write_field_alias(&mut self, field: &str) {
        self.write(" as ");
        self.write_ident(field);
    }

    /// Run `f` with the override and aliasing switches set, restoring them after
    fn scoped<T>(
        &mut self,
        enable_overrides: bool,
        aliasing: bool,
        f: impl FnOnce(&mut Self) -> DepotResult<T>,
    ) -> DepotResult<T> {
        let saved = (self.enable_overrides, self.aliasing);
        self.enable_overrides = enable_overrides;
        self.aliasing = aliasing;
        let result = f(self);
        (self.enable_overrides, self.aliasing) = saved;
        result
    }

    // =========================================================================
    // Low-level output methods
    // =========================================================================

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn write_ident(&mut self, ident: &str) {
        self.dialect.write_ident(&mut self.output, ident);
    }

    fn bind(&mut self, value: Value) {
        self.output.push('?');
        self.params.push(value);
    }

    fn bind_list(&mut self, values: &[Value]) {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.bind(value.clone());
        }
    }

    fn newline(&mut self) {
        if self.pretty {
            self.output.push('\n');
            for _ in 0..self.indent_level {
                self.output.push_str("    ");
            }
        } else {
            self.output.push(' ');
        }
    }

    fn newline_if_pretty(&mut self) {
        if self.pretty {
            self.newline();
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// =========================================================================
// Convenience functions
// =========================================================================

/// Compile a statement to compact SQL
pub fn compile(
    cache: &SchemaCache,
    dialect: Dialect,
    statement: &Statement,
) -> DepotResult<CompiledQuery> {
    SqlCompiler::new(cache, dialect).compile(statement)
}

/// Compile a statement to SQL with one clause per line
pub fn compile_pretty(
    cache: &SchemaCache,
    dialect: Dialect,
    statement: &Statement,
) -> DepotResult<CompiledQuery> {
    SqlCompiler::new(cache, dialect).pretty().compile(statement)
}
