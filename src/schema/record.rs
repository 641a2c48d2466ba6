//! Persistent record types

use super::descriptor::RecordDescriptor;
use crate::ast::Value;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A struct whose instances map onto rows of a table
///
/// Normally implemented with `#[derive(PersistentRecord)]`.
pub trait PersistentRecord: 'static {
    /// Declared schema of this record type
    fn descriptor() -> RecordDescriptor;

    /// Current value of every persistent field, in declaration order
    fn field_values(&self) -> Vec<(&'static str, Value)>;
}

/// Handle identifying a persistent record type
///
/// Two handles are equal iff they name the same Rust type.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
    descriptor: fn() -> RecordDescriptor,
}

impl RecordType {
    pub fn of<R: PersistentRecord>() -> Self {
        let full = std::any::type_name::<R>();
        Self {
            id: TypeId::of::<R>(),
            name: short_type_name(full),
            descriptor: R::descriptor,
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Unqualified type name, e.g. `UserRecord`
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a fresh descriptor for this record type
    pub fn descriptor(&self) -> RecordDescriptor {
        (self.descriptor)()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    // strip the module path but keep generic arguments intact
    let base_end = full.find('<').unwrap_or(full.len());
    match full[..base_end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordType({})", self.name)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
