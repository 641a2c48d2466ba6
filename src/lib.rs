//! Depot: a typed SQL query construction and rendering layer
//!
//! Depot lets callers compose SQL statements as immutable expression and
//! clause trees over persistent record types, then compiles those trees into
//! dialect-correct SQL text plus an ordered list of bound values.
//!
//! - [`ast`]: expressions, operators, clauses and the SQL compiler
//! - [`schema`]: record descriptors, compiled record schemas and the schema cache
//! - [`codegen`]: the source rewriter behind `depot-genrecord`
//! - [`executor`]: the seam to an external connection provider, plus telemetry
//!
//! # Example
//!
//! ```rust,ignore
//! use depot::*;
//!
//! #[derive(PersistentRecord)]
//! #[depot(table = "USERS")]
//! pub struct UserRecord {
//!     #[depot(id)]
//!     pub user_id: i32,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let cache = SchemaCache::new();
//! let select = SelectClause::new::<UserRecord>()
//!     .with_where(Expr::eq(ColumnExp::new::<UserRecord>("age"), 30));
//! let query = SqlCompiler::new(&cache, Dialect::MySql).compile(&select.into())?;
//! // select t0.user_id, t0.name, t0.age from USERS as t0 where t0.age = ?
//! ```

// lets `::depot::` paths emitted by the derive macro resolve inside this crate
extern crate self as depot;

pub mod ast;
pub mod codegen;
pub mod error;
pub mod executor;
pub mod schema;

pub use ast::*;
pub use error::{DepotError, DepotResult};
pub use schema::*;

pub use depot_macros::PersistentRecord;

#[cfg(test)]
pub(crate) mod test_records;
