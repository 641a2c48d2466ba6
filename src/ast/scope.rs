//! Closure validation
//!
//! Before anything is emitted, every column, key and full-text match in a
//! statement must refer to a record bound in its select's scope: the
//! selected record and its shadow, from-override records and join records.
//! A sub-select also sees the scopes enclosing it; an enclosing select never
//! sees into its sub-selects. Qualified columns must name a join alias
//! declared in scope.

use super::clause::{
    DefinitionKind, DeleteClause, SelectClause, Statement, UpdateClause, WhereClause,
};
use super::expr::{ColumnExp, Expr};
use super::types::DepotTypes;
use crate::error::{DepotError, DepotResult};
use crate::schema::RecordType;
use std::collections::{HashMap, HashSet};

struct Scope<'p> {
    /// Record the scope's statement reads or writes
    owner: RecordType,
    records: HashSet<RecordType>,
    /// Table-owning records rendered under their generated abbreviation
    tables: HashSet<RecordType>,
    aliases: HashMap<String, RecordType>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    fn new(owner: RecordType, parent: Option<&'p Scope<'p>>) -> Self {
        let mut records = HashSet::new();
        records.insert(owner);
        Self {
            owner,
            records,
            tables: HashSet::new(),
            aliases: HashMap::new(),
            parent,
        }
    }

    fn binds(&self, record: RecordType) -> bool {
        self.records.contains(&record) || self.parent.is_some_and(|p| p.binds(record))
    }

    fn alias(&self, alias: &str) -> Option<RecordType> {
        self.aliases
            .get(alias)
            .copied()
            .or_else(|| self.parent.and_then(|p| p.alias(alias)))
    }

    fn holds_table(&self, table: RecordType) -> bool {
        self.tables.contains(&table) || self.parent.is_some_and(|p| p.holds_table(table))
    }

    fn encloses(&self, record: RecordType) -> bool {
        self.owner == record || self.parent.is_some_and(|p| p.encloses(record))
    }
}

/// Check that `statement` only references records it binds
pub(crate) fn validate(statement: &Statement, types: &DepotTypes) -> DepotResult<()> {
    match statement {
        Statement::Select(select) => validate_select(select, types, None),
        // an insert binds values, never expressions
        Statement::Insert(_) => Ok(()),
        Statement::Update(update) => validate_update(update, types),
        Statement::Delete(delete) => validate_delete(delete, types),
    }
}

fn validate_select(
    select: &SelectClause,
    types: &DepotTypes,
    parent: Option<&Scope<'_>>,
) -> DepotResult<()> {
    if parent.is_some_and(|p| p.encloses(select.record)) {
        return Err(DepotError::NestedSelect {
            record: select.record.to_string(),
        });
    }

    let what = format!("select on `{}`", select.record);
    let mut scope = Scope::new(select.record, parent);
    bind_with_shadow(&mut scope, select.record, types)?;
    match &select.from_override {
        Some(from) => {
            for record in &from.records {
                bind_with_shadow(&mut scope, *record, types)?;
                bind_table(&mut scope, *record, types, &what)?;
            }
        }
        None => bind_table(&mut scope, select.record, types, &what)?,
    }
    for join in &select.joins {
        let context = format!("join on `{}` in {what}", join.record);
        match &join.alias {
            Some(alias) => {
                if is_abbreviation(alias) || scope.alias(alias).is_some() {
                    return Err(DepotError::AliasCollision {
                        alias: alias.clone(),
                        context,
                    });
                }
                scope.aliases.insert(alias.clone(), join.record);
            }
            None => {
                bind_with_shadow(&mut scope, join.record, types)?;
                bind_table(&mut scope, join.record, types, &context)?;
            }
        }
    }

    check_definitions(select, types)?;
    for definition in &select.definitions {
        check_expr(
            &definition.definition,
            &scope,
            types,
            &format!("definition of `{}` in {what}", definition.field),
        )?;
    }
    for join in &select.joins {
        check_expr(
            &join.condition,
            &scope,
            types,
            &format!("join on `{}` in {what}", join.record),
        )?;
    }
    if let Some(where_clause) = &select.where_clause {
        check_where(where_clause, &scope, types, &format!("where clause of {what}"))?;
    }
    if let Some(group_by) = &select.group_by {
        for term in &group_by.terms {
            check_expr(term, &scope, types, &format!("group by of {what}"))?;
        }
    }
    if let Some(order_by) = &select.order_by {
        for (term, _) in &order_by.terms {
            check_expr(term, &scope, types, &format!("order by of {what}"))?;
        }
    }
    Ok(())
}

fn validate_update(update: &UpdateClause, types: &DepotTypes) -> DepotResult<()> {
    let mut scope = Scope::new(update.record, None);
    bind_with_shadow(&mut scope, update.record, types)?;
    let what = format!("update of `{}`", update.record);
    for (field, value) in &update.assignments {
        check_expr(value, &scope, types, &format!("assignment to `{field}` in {what}"))?;
    }
    if let Some(where_clause) = &update.where_clause {
        check_where(where_clause, &scope, types, &format!("where clause of {what}"))?;
    }
    Ok(())
}

fn validate_delete(delete: &DeleteClause, types: &DepotTypes) -> DepotResult<()> {
    let mut scope = Scope::new(delete.record, None);
    bind_with_shadow(&mut scope, delete.record, types)?;
    check_where(
        &delete.where_clause,
        &scope,
        types,
        &format!("where clause of delete from `{}`", delete.record),
    )
}

fn bind_with_shadow(scope: &mut Scope<'_>, record: RecordType, types: &DepotTypes) -> DepotResult<()> {
    scope.records.insert(record);
    if let Some(shadow) = types.schema(record)?.shadow_of() {
        scope.records.insert(shadow);
    }
    Ok(())
}

/// Claim the generated abbreviation of the table behind `record`
///
/// A second claim on the same table would render two `tN` references to
/// it; such a join must declare its own alias.
fn bind_table(
    scope: &mut Scope<'_>,
    record: RecordType,
    types: &DepotTypes,
    context: &str,
) -> DepotResult<()> {
    let Some(table) = types.schema(record)?.table_record() else {
        return Ok(());
    };
    if scope.holds_table(table) {
        return Err(DepotError::AliasCollision {
            alias: types.abbreviation(table)?.to_string(),
            context: context.to_string(),
        });
    }
    scope.tables.insert(table);
    Ok(())
}

/// `t0`, `t1`, ... are reserved for generated table references
fn is_abbreviation(alias: &str) -> bool {
    alias
        .strip_prefix('t')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// A definition supplies a computed value; an override replaces a concrete one
fn check_definitions(select: &SelectClause, types: &DepotTypes) -> DepotResult<()> {
    let schema = types.schema(select.record)?;
    for definition in &select.definitions {
        let field = schema.require_field(&definition.field)?;
        let invalid = |reason| DepotError::InvalidDefinition {
            record: select.record.to_string(),
            field: definition.field.clone(),
            reason,
        };
        match definition.kind {
            DefinitionKind::Override if field.is_computed() => {
                return Err(invalid("a field override needs a concrete field"));
            }
            DefinitionKind::Definition if !field.is_computed() && !schema.is_computed() => {
                return Err(invalid("a field definition needs a computed field"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_where(
    where_clause: &WhereClause,
    scope: &Scope<'_>,
    types: &DepotTypes,
    context: &str,
) -> DepotResult<()> {
    match where_clause {
        WhereClause::Condition(expr) => check_expr(expr, scope, types, context),
        WhereClause::Key(key) => check_record(key.record, scope, context),
        WhereClause::MultiKey(key) => check_record(key.record, scope, context),
    }
}

fn check_record(record: RecordType, scope: &Scope<'_>, context: &str) -> DepotResult<()> {
    if scope.binds(record) {
        Ok(())
    } else {
        Err(DepotError::unbound(record, context))
    }
}

fn check_column(column: &ColumnExp, scope: &Scope<'_>, context: &str) -> DepotResult<()> {
    let Some(record) = column.record else {
        return Ok(());
    };
    match &column.qualifier {
        Some(alias) => match scope.alias(alias) {
            Some(bound) if bound == record => Ok(()),
            Some(_) => Err(DepotError::unbound(
                record,
                format!("{context} (via alias `{alias}`)"),
            )),
            None => Err(DepotError::UnknownAlias {
                alias: alias.clone(),
                context: context.to_string(),
            }),
        },
        None => check_record(record, scope, context),
    }
}

fn check_expr(
    expr: &Expr,
    scope: &Scope<'_>,
    types: &DepotTypes,
    context: &str,
) -> DepotResult<()> {
    match expr {
        Expr::Column(column) | Expr::IsNull(column) | Expr::In { column, .. } => {
            check_column(column, scope, context)
        }
        Expr::Literal(_) | Expr::Value(_) => Ok(()),
        Expr::Function { args, .. } => args
            .iter()
            .try_for_each(|arg| check_expr(arg, scope, types, context)),
        Expr::EpochSeconds(inner) | Expr::Not(inner) => check_expr(inner, scope, types, context),
        Expr::Binary { lhs, rhs, .. } => {
            check_expr(lhs, scope, types, context)?;
            check_expr(rhs, scope, types, context)
        }
        Expr::Multi { operands, .. } => operands
            .iter()
            .try_for_each(|operand| check_expr(operand, scope, types, context)),
        Expr::Exists(select) => validate_select(select, types, Some(scope)),
        Expr::FullTextMatch { record, .. } => check_record(*record, scope, context),
    }
}
