//! Execution seam
//!
//! Depot never opens connections itself. Callers hand in anything that
//! implements [`Connection`]; this module compiles the statement, logs it
//! according to the telemetry level and delegates.
//!
//! ```text
//! Statement ──SqlCompiler──► CompiledQuery ──Connection──► rows | count
//!                                 │
//!                                 └── telemetry (DEPOT_LOG_LEVEL)
//! ```

mod telemetry;

pub use telemetry::*;

use crate::ast::{CompiledQuery, SqlCompiler, Statement, Value};
use crate::error::{DepotError, DepotResult};
use indexmap::IndexMap;

/// One result row, keyed by column label in select order
pub type Row = IndexMap<String, Value>;

/// A connection supplied by the caller
///
/// Implementations bind `params` to the `?` placeholders of `sql` in order.
pub trait Connection {
    fn query(&mut self, sql: &str, params: &[Value]) -> DepotResult<Vec<Row>>;

    /// Run a write statement, returning the number of affected rows
    fn update(&mut self, sql: &str, params: &[Value]) -> DepotResult<u64>;
}

/// Compile a select and run it on `conn`
pub fn execute_query<C: Connection + ?Sized>(
    conn: &mut C,
    compiler: &SqlCompiler<'_>,
    statement: &Statement,
) -> DepotResult<Vec<Row>> {
    if !matches!(statement, Statement::Select(_)) {
        return Err(DepotError::Unsupported(format!(
            "execute_query needs a select, got {}",
            statement.kind()
        )));
    }
    let query = compiler.compile(statement)?;
    run(statement.kind(), &query, |sql, params| conn.query(sql, params))
}

/// Compile an insert, update or delete and run it on `conn`
pub fn execute_update<C: Connection + ?Sized>(
    conn: &mut C,
    compiler: &SqlCompiler<'_>,
    statement: &Statement,
) -> DepotResult<u64> {
    if matches!(statement, Statement::Select(_)) {
        return Err(DepotError::Unsupported(
            "execute_update can not run a select".to_string(),
        ));
    }
    let query = compiler.compile(statement)?;
    run(statement.kind(), &query, |sql, params| conn.update(sql, params))
}

fn run<T>(
    kind: &'static str,
    query: &CompiledQuery,
    exec: impl FnOnce(&str, &[Value]) -> DepotResult<T>,
) -> DepotResult<T> {
    log_sql(kind, &query.sql, &query.params);
    let timer = ExecutionTimer::new(kind);

    match exec(&query.sql, &query.params) {
        Ok(result) => {
            timer.success();
            Ok(result)
        }
        Err(err) => {
            timer.failure(&err.to_string());
            Err(err)
        }
    }
}
