//! Process-wide schema cache

use super::marshaller::RecordSchema;
use super::record::{PersistentRecord, RecordType};
use crate::error::DepotResult;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily populated map from record type to its compiled schema
///
/// Schemas are built outside the lock; when two threads race to build the
/// same one, the first to publish wins and the other's copy is dropped.
/// Building is deterministic, so both copies are equal. Published schemas
/// are never mutated.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<TypeId, Arc<RecordSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, record: RecordType) -> DepotResult<Arc<RecordSchema>> {
        if let Some(schema) = self.schemas.read().get(&record.type_id()) {
            return Ok(Arc::clone(schema));
        }

        let built = Arc::new(RecordSchema::build(record)?);
        let mut schemas = self.schemas.write();
        let schema = schemas.entry(record.type_id()).or_insert_with(|| {
            tracing::debug!(record = %record, "published record schema");
            built
        });
        Ok(Arc::clone(schema))
    }

    pub fn get_of<R: PersistentRecord>(&self) -> DepotResult<Arc<RecordSchema>> {
        self.get(RecordType::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}
