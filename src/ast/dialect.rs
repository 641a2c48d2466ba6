//! SQL dialects
//!
//! The few places where MySQL and PostgreSQL disagree: identifier quoting,
//! full-text matching, epoch conversion, delete aliasing and column types.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    MySql,
    PostgreSql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
        }
    }

    /// Append an identifier to `out`, quoted as this dialect requires
    pub fn write_ident(&self, out: &mut String, ident: &str) {
        match self {
            Self::MySql => out.push_str(ident),
            Self::PostgreSql => {
                out.push('"');
                // Escape any double quotes in the identifier by doubling them
                for c in ident.chars() {
                    if c == '"' {
                        out.push('"');
                    }
                    out.push(c);
                }
                out.push('"');
            }
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        self.write_ident(&mut out, ident);
        out
    }

    /// MySQL's `delete` does not accept a table alias
    pub fn aliases_delete(&self) -> bool {
        matches!(self, Self::PostgreSql)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSql),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}
