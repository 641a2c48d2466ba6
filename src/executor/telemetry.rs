//! Telemetry and logging for statement execution
//!
//! Logging of SQL text and bound values is gated separately from the
//! `tracing` filter, since bound values may carry user data.
//!
//! # Configuration
//!
//! Set the `DEPOT_LOG_LEVEL` environment variable to one of:
//! - `off` - No logging (default)
//! - `basic` - Log SQL and timing only
//! - `detailed` - Log SQL, bound values and statement kind
//! - `debug` - Log everything including the values as JSON
//!
//! # Example
//!
//! ```bash
//! export DEPOT_LOG_LEVEL=detailed
//! ```

use crate::ast::Value;
use std::str::FromStr;
use std::time::Instant;

pub const LOG_LEVEL_VAR: &str = "DEPOT_LOG_LEVEL";

/// Longest SQL text logged below `Detailed`
const MAX_BASIC_SQL_LEN: usize = 1000;

/// Log level for SQL telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// No logging
    #[default]
    Off = 0,
    /// SQL and timing
    Basic = 1,
    /// SQL, bound values and statement kind
    Detailed = 2,
    /// Everything
    Debug = 3,
}

impl LogLevel {
    /// Parse a level name; anything unrecognised is `Off`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "basic" => Self::Basic,
            "detailed" => Self::Detailed,
            "debug" => Self::Debug,
            _ => Self::Off,
        }
    }
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Current log level from `DEPOT_LOG_LEVEL`
pub fn get_log_level() -> LogLevel {
    std::env::var(LOG_LEVEL_VAR)
        .map(|s| LogLevel::parse(&s))
        .unwrap_or_default()
}

/// Cut `sql` to at most `max` bytes on a char boundary
fn truncate(sql: &str, max: usize) -> String {
    if sql.len() <= max {
        return sql.to_string();
    }
    let mut end = max;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Log a statement about to be executed
pub fn log_sql(kind: &str, sql: &str, params: &[Value]) {
    log_sql_at(get_log_level(), kind, sql, params);
}

pub(crate) fn log_sql_at(level: LogLevel, kind: &str, sql: &str, params: &[Value]) {
    if level < LogLevel::Basic {
        return;
    }

    if level < LogLevel::Detailed {
        tracing::info!(sql = %truncate(sql, MAX_BASIC_SQL_LEN), "depot: executing");
        return;
    }

    tracing::info!(kind, sql, params = params.len(), "depot: executing");
    for (index, value) in params.iter().enumerate() {
        tracing::info!(index = index + 1, kind = value.kind(), value = ?value, "depot: param");
    }

    if level >= LogLevel::Debug {
        match serde_json::to_string(params) {
            Ok(json) => tracing::debug!(params = %json, "depot: params as json"),
            Err(err) => tracing::debug!(error = %err, "depot: params not serializable"),
        }
    }
}

/// Log the outcome of an execution
pub fn log_result(start: Instant, success: bool) {
    if get_log_level() < LogLevel::Basic {
        return;
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = if success { "completed" } else { "failed" };

    tracing::info!(duration_ms, "depot: execution {}", status);
}

/// Log an error
pub fn log_error(context: &str, error: &str) {
    if get_log_level() < LogLevel::Basic {
        return;
    }

    tracing::warn!(context, error, "depot: execution error");
}

/// A guard that logs execution timing on drop
pub struct ExecutionTimer {
    start: Instant,
    context: String,
    logged: bool,
}

impl ExecutionTimer {
    /// Start a new execution timer
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            context: context.into(),
            logged: false,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Mark as successful and log
    pub fn success(mut self) {
        self.logged = true;
        log_result(self.start, true);
    }

    /// Mark as failed and log
    pub fn failure(mut self, error: &str) {
        self.logged = true;
        log_error(&self.context, error);
        log_result(self.start, false);
    }
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        // dropped without an outcome, e.g. by a panicking connection
        if !self.logged {
            log_result(self.start, false);
        }
    }
}
