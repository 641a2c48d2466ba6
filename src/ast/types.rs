//! Per-statement record registry
//!
//! [`DepotTypes`] resolves the schema of every record a statement touches
//! and assigns each table-owning record a short abbreviation (`t0`, `t1`,
//! ...) in the order the statement first references it. A record's shadow
//! targets, whole-record or per-field, are registered right after it so
//! the abbreviation sequence depends only on the tree.

use crate::error::{DepotError, DepotResult};
use crate::schema::{RecordSchema, RecordType, SchemaCache};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DepotTypes {
    schemas: IndexMap<RecordType, Arc<RecordSchema>>,
    abbreviations: IndexMap<RecordType, String>,
}

impl DepotTypes {
    /// Register `records` in order, pulling their schemas from `cache`
    pub fn build(
        cache: &SchemaCache,
        records: impl IntoIterator<Item = RecordType>,
    ) -> DepotResult<Self> {
        let mut types = Self {
            schemas: IndexMap::new(),
            abbreviations: IndexMap::new(),
        };
        for record in records {
            types.register(cache, record)?;
        }
        Ok(types)
    }

    pub fn from_set(cache: &SchemaCache, records: &IndexSet<RecordType>) -> DepotResult<Self> {
        Self::build(cache, records.iter().copied())
    }

    fn register(&mut self, cache: &SchemaCache, record: RecordType) -> DepotResult<()> {
        if self.schemas.contains_key(&record) {
            return Ok(());
        }
        let schema = cache.get(record)?;
        if schema.table_name().is_some() {
            let abbreviation = format!("t{}", self.abbreviations.len());
            self.abbreviations.insert(record, abbreviation);
        }
        self.schemas.insert(record, Arc::clone(&schema));

        let shadows = schema
            .shadow_of()
            .into_iter()
            .chain(schema.fields().iter().filter_map(|f| f.shadow_of()));
        for shadow in shadows {
            self.register(cache, shadow)?;
        }
        Ok(())
    }

    pub fn schema(&self, record: RecordType) -> DepotResult<&RecordSchema> {
        self.schemas
            .get(&record)
            .map(|schema| schema.as_ref())
            .ok_or_else(|| DepotError::UnknownRecord {
                record: record.to_string(),
            })
    }

    /// Abbreviation of the table backing `record`
    ///
    /// A computed record borrows its shadow's abbreviation; one with no
    /// shadow has none.
    pub fn abbreviation(&self, record: RecordType) -> DepotResult<&str> {
        let table_record = self
            .schema(record)?
            .table_record()
            .ok_or_else(|| DepotError::ComputedWithoutFrom {
                record: record.to_string(),
            })?;
        self.abbreviations
            .get(&table_record)
            .map(String::as_str)
            .ok_or_else(|| DepotError::UnknownRecord {
                record: table_record.to_string(),
            })
    }

    pub fn table_name(&self, record: RecordType) -> DepotResult<&str> {
        let schema = self.schema(record)?;
        schema
            .table_name()
            .ok_or_else(|| DepotError::ComputedWithoutFrom {
                record: record.to_string(),
            })
    }

    pub fn column_name(&self, record: RecordType, field: &str) -> DepotResult<&str> {
        Ok(self
            .schema(record)?
            .require_field(field)?
            .column_name
            .as_str())
    }

    /// Registered records with their abbreviations, in assignment order
    pub fn abbreviations(&self) -> impl Iterator<Item = (RecordType, &str)> {
        self.abbreviations
            .iter()
            .map(|(record, abbreviation)| (*record, abbreviation.as_str()))
    }

    pub fn records(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.schemas.keys().copied()
    }
}
