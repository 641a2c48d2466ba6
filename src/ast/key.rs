//! Primary key conditions
//!
//! A [`Key`] identifies one row of a record's table by its primary key
//! values; a [`MultiKey`] identifies several rows that share all but one
//! key component. Both are checked against the record's declared primary
//! key when the statement is compiled.

use super::params::Value;
use crate::error::{DepotError, DepotResult};
use crate::schema::{PersistentRecord, RecordType};

/// Primary key values of one row
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub record: RecordType,
    pub values: Vec<(String, Value)>,
}

impl Key {
    pub fn new<R: PersistentRecord>(values: Vec<(&str, Value)>) -> Self {
        Self::of(
            RecordType::of::<R>(),
            values
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect(),
        )
    }

    pub fn of(record: RecordType, values: Vec<(String, Value)>) -> Self {
        Self { record, values }
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Values ordered as `primary_key` lists its fields
    ///
    /// Fails if the key misses a primary key field or names one that is not
    /// part of the primary key.
    pub fn ordered_values<'a>(&'a self, primary_key: &[&str]) -> DepotResult<Vec<&'a Value>> {
        if primary_key.is_empty() {
            return Err(self.mismatch("record has no primary key".to_string()));
        }
        if let Some((extra, _)) = self
            .values
            .iter()
            .find(|(name, _)| !primary_key.contains(&name.as_str()))
        {
            return Err(self.mismatch(format!("`{extra}` is not a primary key field")));
        }
        primary_key
            .iter()
            .map(|field| {
                self.value(field)
                    .ok_or_else(|| self.mismatch(format!("missing value for `{field}`")))
            })
            .collect()
    }

    fn mismatch(&self, reason: String) -> DepotError {
        DepotError::KeyMismatch {
            record: self.record.to_string(),
            reason,
        }
    }
}

/// Rows sharing fixed values for some key fields and any of a list of values
/// for one other field
#[derive(Debug, Clone, PartialEq)]
pub struct MultiKey {
    pub record: RecordType,
    pub single: Vec<(String, Value)>,
    pub field: String,
    pub values: Vec<Value>,
}

impl MultiKey {
    pub fn new<R: PersistentRecord>(
        single: Vec<(&str, Value)>,
        field: impl Into<String>,
        values: Vec<Value>,
    ) -> DepotResult<Self> {
        let field = field.into();
        if values.is_empty() {
            return Err(DepotError::EmptyInList { column: field });
        }
        Ok(Self {
            record: RecordType::of::<R>(),
            single: single
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            field,
            values,
        })
    }

    /// Fixed values ordered as `primary_key` lists its fields, leaving out
    /// the varying field
    ///
    /// Fails unless the fixed fields and the varying field together cover
    /// the primary key exactly.
    pub fn ordered_single<'a>(&'a self, primary_key: &[&str]) -> DepotResult<Vec<&'a Value>> {
        if !primary_key.contains(&self.field.as_str()) {
            return Err(self.mismatch(format!("`{}` is not a primary key field", self.field)));
        }
        if let Some((extra, _)) = self
            .single
            .iter()
            .find(|(name, _)| *name == self.field || !primary_key.contains(&name.as_str()))
        {
            return Err(self.mismatch(format!("`{extra}` is not a fixed primary key field")));
        }
        primary_key
            .iter()
            .filter(|field| **field != self.field)
            .map(|field| {
                self.single
                    .iter()
                    .find(|(name, _)| name == field)
                    .map(|(_, value)| value)
                    .ok_or_else(|| self.mismatch(format!("missing value for `{field}`")))
            })
            .collect()
    }

    fn mismatch(&self, reason: String) -> DepotError {
        DepotError::KeyMismatch {
            record: self.record.to_string(),
            reason,
        }
    }
}
