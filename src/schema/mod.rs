//! Persistent record schemas
//!
//! Records declare themselves through [`PersistentRecord`] (usually derived);
//! [`RecordSchema`] is the validated form the compiler reads, cached per
//! record type by [`SchemaCache`].

mod cache;
mod ddl;
mod descriptor;
mod marshaller;
mod record;

pub use cache::SchemaCache;
pub use descriptor::{
    Column, Computed, FieldDescriptor, FieldType, FullTextIndex, GeneratedValue, GenerationType,
    Index, RecordDescriptor, TableGenerator, UniqueConstraint,
};
pub use marshaller::{FieldSchema, KeyGenerator, RecordSchema};
pub use record::{PersistentRecord, RecordType};
