//! SQL statement and clause types
//!
//! This module defines the top-level statements (SELECT, INSERT, UPDATE,
//! DELETE) and the clauses a select is assembled from. Builder methods may be
//! called in any order; the compiler always emits clauses in SQL grammar
//! order.

use super::expr::{ColumnExp, Expr, IntoExpr};
use super::key::{Key, MultiKey};
use super::params::Value;
use crate::error::{DepotError, DepotResult};
use crate::schema::{PersistentRecord, RecordType};
use indexmap::IndexSet;

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectClause),
    Insert(InsertClause),
    Update(UpdateClause),
    Delete(DeleteClause),
}

impl Statement {
    /// The record type this statement reads or writes
    pub fn record(&self) -> RecordType {
        match self {
            Self::Select(s) => s.record,
            Self::Insert(s) => s.record,
            Self::Update(s) => s.record,
            Self::Delete(s) => s.record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        match self {
            Self::Select(s) => s.collect_records(out),
            Self::Insert(s) => {
                out.insert(s.record);
            }
            Self::Update(s) => s.collect_records(out),
            Self::Delete(s) => s.collect_records(out),
        }
    }
}

impl From<SelectClause> for Statement {
    fn from(s: SelectClause) -> Self {
        Self::Select(s)
    }
}

impl From<InsertClause> for Statement {
    fn from(s: InsertClause) -> Self {
        Self::Insert(s)
    }
}

impl From<UpdateClause> for Statement {
    fn from(s: UpdateClause) -> Self {
        Self::Update(s)
    }
}

impl From<DeleteClause> for Statement {
    fn from(s: DeleteClause) -> Self {
        Self::Delete(s)
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "inner join",
            Self::LeftOuter => "left outer join",
            Self::RightOuter => "right outer join",
        }
    }
}

/// Join of another record's table
///
/// A join with an alias renders under that alias instead of the record's
/// abbreviation; columns reach it through [`ColumnExp::qualified`].
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub record: RecordType,
    pub alias: Option<String>,
    pub condition: Expr,
    pub kind: JoinKind,
}

impl Join {
    pub fn new(record: RecordType, condition: impl IntoExpr, kind: JoinKind) -> Self {
        Self {
            record,
            alias: None,
            condition: condition.into_expr(),
            kind,
        }
    }

    pub fn inner<R: PersistentRecord>(condition: impl IntoExpr) -> Self {
        Self::new(RecordType::of::<R>(), condition, JoinKind::Inner)
    }

    pub fn left_outer<R: PersistentRecord>(condition: impl IntoExpr) -> Self {
        Self::new(RecordType::of::<R>(), condition, JoinKind::LeftOuter)
    }

    pub fn right_outer<R: PersistentRecord>(condition: impl IntoExpr) -> Self {
        Self::new(RecordType::of::<R>(), condition, JoinKind::RightOuter)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub terms: Vec<(Expr, Order)>,
}

impl OrderBy {
    pub fn ascending(expr: impl IntoExpr) -> Self {
        Self {
            terms: vec![(expr.into_expr(), Order::Asc)],
        }
    }

    pub fn descending(expr: impl IntoExpr) -> Self {
        Self {
            terms: vec![(expr.into_expr(), Order::Desc)],
        }
    }

    pub fn then(mut self, expr: impl IntoExpr, order: Order) -> Self {
        self.terms.push((expr.into_expr(), order));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub terms: Vec<Expr>,
}

impl GroupBy {
    pub fn new(terms: Vec<Expr>) -> Self {
        Self { terms }
    }
}

/// `limit ? offset ?`; both bound, count first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub count: u64,
}

impl Limit {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// Supplies the value of a computed field
    Definition,
    /// Replaces a concrete field while expanding the projection and key conditions
    Override,
}

/// Substitutes an expression for a field of the selected record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub field: String,
    pub definition: Expr,
    pub kind: DefinitionKind,
}

impl FieldDefinition {
    pub fn new(field: impl Into<String>, definition: impl IntoExpr) -> Self {
        Self {
            field: field.into(),
            definition: definition.into_expr(),
            kind: DefinitionKind::Definition,
        }
    }

    pub fn field_override(field: impl Into<String>, definition: impl IntoExpr) -> Self {
        Self {
            field: field.into(),
            definition: definition.into_expr(),
            kind: DefinitionKind::Override,
        }
    }
}

/// Replaces the select's implied `from` with an explicit list of tables
#[derive(Debug, Clone, PartialEq)]
pub struct FromOverride {
    pub records: Vec<RecordType>,
}

impl FromOverride {
    pub fn new(records: Vec<RecordType>) -> Self {
        Self { records }
    }

    pub fn of<R: PersistentRecord>() -> Self {
        Self::new(vec![RecordType::of::<R>()])
    }

    pub fn and<R: PersistentRecord>(mut self) -> Self {
        self.records.push(RecordType::of::<R>());
        self
    }
}

/// Row restriction of a select, update or delete
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Condition(Expr),
    Key(Key),
    MultiKey(MultiKey),
}

impl WhereClause {
    /// `a = ? and b is null ...`: `is null` for null values, `=` otherwise
    pub fn from_pairs(pairs: Vec<(ColumnExp, Value)>) -> DepotResult<Self> {
        let mut conditions: Vec<Expr> = pairs
            .into_iter()
            .map(|(column, value)| {
                if value.is_null() {
                    Expr::is_null(column)
                } else {
                    Expr::eq(column, value)
                }
            })
            .collect();
        let condition = if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Expr::and(conditions)?
        };
        Ok(Self::Condition(condition))
    }

    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        match self {
            Self::Condition(expr) => expr.collect_records(out),
            Self::Key(key) => {
                out.insert(key.record);
            }
            Self::MultiKey(key) => {
                out.insert(key.record);
            }
        }
    }
}

impl From<Expr> for WhereClause {
    fn from(expr: Expr) -> Self {
        Self::Condition(expr)
    }
}

impl From<Key> for WhereClause {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl From<MultiKey> for WhereClause {
    fn from(key: MultiKey) -> Self {
        Self::MultiKey(key)
    }
}

/// SELECT statement over one persistent record
#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub record: RecordType,
    /// Projected fields; empty selects every persistent field
    pub fields: Vec<String>,
    pub from_override: Option<FromOverride>,
    pub joins: Vec<Join>,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<GroupBy>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
    pub for_update: bool,
    pub definitions: Vec<FieldDefinition>,
}

impl SelectClause {
    pub fn new<R: PersistentRecord>() -> Self {
        Self::for_record(RecordType::of::<R>())
    }

    pub fn for_record(record: RecordType) -> Self {
        Self {
            record,
            fields: Vec::new(),
            from_override: None,
            joins: Vec::new(),
            where_clause: None,
            group_by: None,
            order_by: None,
            limit: None,
            for_update: false,
            definitions: Vec::new(),
        }
    }

    /// Build a select from clauses given in any order
    ///
    /// Fails if a single-valued clause (where, from override, group by,
    /// order by, limit, for update) appears more than once.
    pub fn from_clauses(
        record: RecordType,
        fields: Vec<String>,
        clauses: Vec<QueryClause>,
    ) -> DepotResult<Self> {
        fn once<T>(slot: &mut Option<T>, value: T, clause: &'static str) -> DepotResult<()> {
            if slot.is_some() {
                return Err(DepotError::DuplicateClause { clause });
            }
            *slot = Some(value);
            Ok(())
        }

        let mut select = Self::for_record(record).with_fields(fields);
        for clause in clauses {
            match clause {
                QueryClause::Where(w) => once(&mut select.where_clause, w, "where")?,
                QueryClause::FromOverride(f) => once(&mut select.from_override, f, "from")?,
                QueryClause::GroupBy(g) => once(&mut select.group_by, g, "group by")?,
                QueryClause::OrderBy(o) => once(&mut select.order_by, o, "order by")?,
                QueryClause::Limit(l) => once(&mut select.limit, l, "limit")?,
                QueryClause::ForUpdate => {
                    if select.for_update {
                        return Err(DepotError::DuplicateClause {
                            clause: "for update",
                        });
                    }
                    select.for_update = true;
                }
                QueryClause::Join(j) => select.joins.push(j),
                QueryClause::Definition(d) => select.definitions.push(d),
            }
        }
        Ok(select)
    }

    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_from(mut self, from: FromOverride) -> Self {
        self.from_override = Some(from);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_where(mut self, where_clause: impl Into<WhereClause>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = Some(group_by);
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    pub fn define(mut self, definition: FieldDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn definition(&self, field: &str) -> Option<&FieldDefinition> {
        self.definitions.iter().find(|d| d.field == field)
    }

    /// Records in the order the rendered statement first mentions them
    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        out.insert(self.record);
        for definition in &self.definitions {
            definition.definition.collect_records(out);
        }
        if let Some(from) = &self.from_override {
            out.extend(from.records.iter().copied());
        }
        for join in &self.joins {
            out.insert(join.record);
            join.condition.collect_records(out);
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.collect_records(out);
        }
        if let Some(group_by) = &self.group_by {
            for term in &group_by.terms {
                term.collect_records(out);
            }
        }
        if let Some(order_by) = &self.order_by {
            for (term, _) in &order_by.terms {
                term.collect_records(out);
            }
        }
    }
}

/// Any clause [`SelectClause::from_clauses`] accepts
#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    Where(WhereClause),
    FromOverride(FromOverride),
    Join(Join),
    GroupBy(GroupBy),
    OrderBy(OrderBy),
    Limit(Limit),
    ForUpdate,
    Definition(FieldDefinition),
}

impl From<WhereClause> for QueryClause {
    fn from(w: WhereClause) -> Self {
        Self::Where(w)
    }
}

impl From<Key> for QueryClause {
    fn from(key: Key) -> Self {
        Self::Where(WhereClause::Key(key))
    }
}

impl From<FromOverride> for QueryClause {
    fn from(f: FromOverride) -> Self {
        Self::FromOverride(f)
    }
}

impl From<Join> for QueryClause {
    fn from(j: Join) -> Self {
        Self::Join(j)
    }
}

impl From<GroupBy> for QueryClause {
    fn from(g: GroupBy) -> Self {
        Self::GroupBy(g)
    }
}

impl From<OrderBy> for QueryClause {
    fn from(o: OrderBy) -> Self {
        Self::OrderBy(o)
    }
}

impl From<Limit> for QueryClause {
    fn from(l: Limit) -> Self {
        Self::Limit(l)
    }
}

impl From<FieldDefinition> for QueryClause {
    fn from(d: FieldDefinition) -> Self {
        Self::Definition(d)
    }
}

/// INSERT of one row
///
/// Columns listed in `identity_fields`, and those the schema declares with
/// an identity or auto strategy, render `default`; every other persistent
/// column binds its value.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertClause {
    pub record: RecordType,
    pub values: Vec<(String, Value)>,
    pub identity_fields: Vec<String>,
}

impl InsertClause {
    pub fn new(record: RecordType, values: Vec<(String, Value)>) -> Self {
        Self {
            record,
            values,
            identity_fields: Vec::new(),
        }
    }

    pub fn from_record<R: PersistentRecord>(record: &R) -> Self {
        Self::new(
            RecordType::of::<R>(),
            record
                .field_values()
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect(),
        )
    }

    pub fn with_identity_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.identity_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }
}

/// Single-table UPDATE; compiling one without a where clause is an error
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateClause {
    pub record: RecordType,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<WhereClause>,
}

impl UpdateClause {
    pub fn new<R: PersistentRecord>() -> Self {
        Self::for_record(RecordType::of::<R>())
    }

    pub fn for_record(record: RecordType) -> Self {
        Self {
            record,
            assignments: Vec::new(),
            where_clause: None,
        }
    }

    /// Update the named fields of `record` to its current values
    pub fn from_record<R: PersistentRecord>(record: &R, fields: &[&str]) -> Self {
        let mut update = Self::new::<R>();
        for (field, value) in record.field_values() {
            if fields.contains(&field) {
                update = update.set(field, value);
            }
        }
        update
    }

    pub fn set(mut self, field: impl Into<String>, value: impl IntoExpr) -> Self {
        self.assignments.push((field.into(), value.into_expr()));
        self
    }

    pub fn with_where(mut self, where_clause: impl Into<WhereClause>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        out.insert(self.record);
        for (_, value) in &self.assignments {
            value.collect_records(out);
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.collect_records(out);
        }
    }
}

/// Single-table DELETE
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub record: RecordType,
    pub where_clause: WhereClause,
}

impl DeleteClause {
    pub fn new<R: PersistentRecord>(where_clause: impl Into<WhereClause>) -> Self {
        Self {
            record: RecordType::of::<R>(),
            where_clause: where_clause.into(),
        }
    }

    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        out.insert(self.record);
        self.where_clause.collect_records(out);
    }
}
