//! SQL expression types
//!
//! Expressions are immutable trees: columns of persistent records, literal
//! SQL fragments, bound values, function calls and the operators combining
//! them. Every node can report the record types it references, which the
//! compiler uses to assign table abbreviations and to validate that each
//! reference is bound by an enclosing `from` or `join`.

use super::clause::SelectClause;
use super::params::Value;
use crate::error::{DepotError, DepotResult};
use crate::schema::{PersistentRecord, RecordType};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexSet;

/// Reference to a field of a persistent record
///
/// Renders as `<abbreviation>.<column>`. A column with a qualifier renders
/// under that join alias instead, which is how self-joins address their
/// second role. A column with no record renders as the bare field name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnExp {
    pub record: Option<RecordType>,
    pub field: String,
    pub qualifier: Option<String>,
}

impl ColumnExp {
    pub fn new<R: PersistentRecord>(field: impl Into<String>) -> Self {
        Self::of(RecordType::of::<R>(), field)
    }

    pub fn of(record: RecordType, field: impl Into<String>) -> Self {
        Self {
            record: Some(record),
            field: field.into(),
            qualifier: None,
        }
    }

    /// A column not tied to any record, rendered as its bare name
    pub fn bare(field: impl Into<String>) -> Self {
        Self {
            record: None,
            field: field.into(),
            qualifier: None,
        }
    }

    /// Address this column through a declared join alias
    pub fn qualified(mut self, alias: impl Into<String>) -> Self {
        self.qualifier = Some(alias.into());
        self
    }

    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        if let Some(record) = self.record {
            out.insert(record);
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Bitwise
    BitAnd,
    BitOr,
}

impl BinaryOperator {
    /// Get the SQL representation of this operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "like",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::BitAnd => "&",
            Self::BitOr => "|",
        }
    }
}

/// Operators joining any number of conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiOperator {
    And,
    Or,
}

impl MultiOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// The main expression enum
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Field of a persistent record
    Column(ColumnExp),

    /// Literal SQL text, written verbatim
    Literal(String),

    /// Bound value, written as `?`
    Value(Value),

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// Seconds since the epoch of a timestamp expression
    EpochSeconds(Box<Expr>),

    /// lhs op rhs
    Binary {
        lhs: Box<Expr>,
        op: BinaryOperator,
        rhs: Box<Expr>,
    },

    /// (a) and (b) and ...; never empty
    Multi {
        op: MultiOperator,
        operands: Vec<Expr>,
    },

    /// not (expr)
    Not(Box<Expr>),

    /// column is null
    IsNull(ColumnExp),

    /// column in (?, ...); never empty
    In { column: ColumnExp, values: Vec<Value> },

    /// exists (select ...)
    Exists(Box<SelectClause>),

    /// Dialect-specific match against a declared full-text index
    FullTextMatch {
        record: RecordType,
        index: String,
        query: String,
    },
}

/// Conversion into an expression operand
///
/// Implemented for expressions, columns, bound values and the Rust types
/// that convert into a [`Value`], so operators accept `30` or `"bob"`
/// directly and wrap them as bound values.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for ColumnExp {
    fn into_expr(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::Value(self)
    }
}

macro_rules! impl_into_expr_for_value {
    ($($t:ty),*) => {
        $(
            impl IntoExpr for $t {
                fn into_expr(self) -> Expr {
                    Expr::Value(Value::from(self))
                }
            }
        )*
    };
}

impl_into_expr_for_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    serde_json::Value
);

impl<T: Into<Value>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::Value(Value::from(self))
    }
}

impl From<ColumnExp> for Expr {
    fn from(column: ColumnExp) -> Self {
        Self::Column(column)
    }
}

impl Expr {
    // Convenience constructors

    pub fn column<R: PersistentRecord>(field: impl Into<String>) -> Self {
        Self::Column(ColumnExp::new::<R>(field))
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }

    pub fn epoch_seconds(expr: impl IntoExpr) -> Self {
        Self::EpochSeconds(Box::new(expr.into_expr()))
    }

    /// Create a binary operation
    pub fn binary(lhs: impl IntoExpr, op: BinaryOperator, rhs: impl IntoExpr) -> Self {
        Self::Binary {
            lhs: Box::new(lhs.into_expr()),
            op,
            rhs: Box::new(rhs.into_expr()),
        }
    }

    pub fn eq(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Eq, rhs)
    }

    pub fn not_eq(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::NotEq, rhs)
    }

    pub fn lt(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Lt, rhs)
    }

    pub fn lt_eq(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::LtEq, rhs)
    }

    pub fn gt(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Gt, rhs)
    }

    pub fn gt_eq(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::GtEq, rhs)
    }

    pub fn like(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Like, rhs)
    }

    pub fn add(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Add, rhs)
    }

    pub fn sub(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Sub, rhs)
    }

    pub fn mul(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Mul, rhs)
    }

    pub fn div(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::Div, rhs)
    }

    pub fn bit_and(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::BitAnd, rhs)
    }

    pub fn bit_or(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Self {
        Self::binary(lhs, BinaryOperator::BitOr, rhs)
    }

    /// Join conditions with a multi-ary operator; fails on an empty list
    pub fn multi(op: MultiOperator, operands: impl IntoIterator<Item = Expr>) -> DepotResult<Self> {
        let operands: Vec<Expr> = operands.into_iter().collect();
        if operands.is_empty() {
            return Err(DepotError::EmptyOperator {
                operator: op.as_sql(),
            });
        }
        Ok(Self::Multi { op, operands })
    }

    pub fn and(operands: impl IntoIterator<Item = Expr>) -> DepotResult<Self> {
        Self::multi(MultiOperator::And, operands)
    }

    pub fn or(operands: impl IntoIterator<Item = Expr>) -> DepotResult<Self> {
        Self::multi(MultiOperator::Or, operands)
    }

    pub fn not(expr: impl IntoExpr) -> Self {
        Self::Not(Box::new(expr.into_expr()))
    }

    pub fn is_null(column: ColumnExp) -> Self {
        Self::IsNull(column)
    }

    /// column in (values); fails on an empty value list
    pub fn in_list<V: Into<Value>>(
        column: ColumnExp,
        values: impl IntoIterator<Item = V>,
    ) -> DepotResult<Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(DepotError::EmptyInList {
                column: column.field,
            });
        }
        Ok(Self::In { column, values })
    }

    pub fn exists(select: SelectClause) -> Self {
        Self::Exists(Box::new(select))
    }

    pub fn full_text_match<R: PersistentRecord>(
        index: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self::FullTextMatch {
            record: RecordType::of::<R>(),
            index: index.into(),
            query: query.into(),
        }
    }

    /// Union, in first-reference order, every record type this tree touches
    pub fn collect_records(&self, out: &mut IndexSet<RecordType>) {
        match self {
            Self::Column(column) | Self::IsNull(column) => column.collect_records(out),
            Self::In { column, .. } => column.collect_records(out),
            Self::Literal(_) | Self::Value(_) => {}
            Self::Function { args, .. } => {
                for arg in args {
                    arg.collect_records(out);
                }
            }
            Self::EpochSeconds(inner) | Self::Not(inner) => inner.collect_records(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_records(out);
                rhs.collect_records(out);
            }
            Self::Multi { operands, .. } => {
                for operand in operands {
                    operand.collect_records(out);
                }
            }
            Self::Exists(select) => select.collect_records(out),
            Self::FullTextMatch { record, .. } => {
                out.insert(*record);
            }
        }
    }

    pub fn referenced_records(&self) -> Vec<RecordType> {
        let mut out = IndexSet::new();
        self.collect_records(&mut out);
        out.into_iter().collect()
    }

    /// Whether this node renders as an infix operation needing parentheses
    /// when it appears as an operand
    pub(crate) fn is_compound(&self) -> bool {
        matches!(self, Self::Binary { .. } | Self::Multi { .. })
    }
}
