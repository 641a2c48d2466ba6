//! SQL Abstract Syntax Tree (AST) module
//!
//! This module provides a typed representation of SQL statements over
//! persistent records, and the compiler that renders them to SQL text plus
//! an ordered list of bound values. It knows nothing about connections, so
//! everything here can be tested without a database.
//!
//! # Architecture
//!
//! - [`expr`]: expressions and operators (columns, bound values, functions,
//!   comparisons, `and`/`or`, `in`, `exists`, full-text match)
//! - [`clause`]: statements and the clauses a select is assembled from
//! - [`key`]: primary key and multi-key conditions
//! - [`params`]: bound values and their collector
//! - [`dialect`]: MySQL and PostgreSQL differences
//! - [`types`]: per-statement schemas and table abbreviations
//! - [`render`]: SQL generation
//!
//! # Example
//!
//! ```rust,ignore
//! use depot::*;
//!
//! let cache = SchemaCache::new();
//! let select = SelectClause::new::<UserRecord>()
//!     .with_where(Expr::eq(ColumnExp::new::<UserRecord>("age"), 30));
//!
//! let query = compile(&cache, Dialect::MySql, &select.into())?;
//! // select t0.user_id, t0.name, t0.age from USERS as t0 where t0.age = ?
//! // params: [30]
//! ```

mod clause;
mod dialect;
mod expr;
mod key;
mod params;
mod render;
mod scope;
mod types;

// Re-export all public types
pub use clause::*;
pub use dialect::*;
pub use expr::*;
pub use key::*;
pub use params::*;
pub use render::*;
pub use types::*;

#[cfg(test)]
mod tests;
