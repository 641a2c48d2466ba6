//! Procedural macros for depot
//!
//! `#[derive(PersistentRecord)]` compiles `#[depot(...)]` attributes on a
//! struct into a `RecordDescriptor` and a `field_values` accessor.

use proc_macro::TokenStream;

mod attrs;
mod record;

/// Derive `depot::PersistentRecord` for a struct with named fields.
///
/// Struct-level attributes:
///
/// - `table = "NAME"`: table name (defaults to the struct name)
/// - `index(name = "ix", fields("a", "b"), unique)`
/// - `unique(columns("a", "b"))`
/// - `full_text(name = "fts", fields("a", "b"))`
/// - `table_generator(name = "..", table = "..", pk_column = "..", value_column = "..", pk_value = "..")`
/// - `computed(shadow_of = OtherRecord)`: the record owns no table
///
/// Field-level attributes:
///
/// - `id`: part of the primary key, in declaration order
/// - `column(name = "..", unique, nullable, definition = "..", length = N, default = "..")`
/// - `generated(strategy = "identity" | "auto" | "table" | "sequence", generator = "..")`
/// - `computed(required = bool, definition = "..", shadow_of = OtherRecord)`
/// - `transient`: not persisted at all
///
/// ```ignore
/// #[derive(PersistentRecord)]
/// #[depot(table = "USERS")]
/// pub struct UserRecord {
///     #[depot(id, generated(strategy = "identity"))]
///     pub user_id: i32,
///     #[depot(column(length = 64))]
///     pub name: String,
///     pub age: i32,
/// }
/// ```
#[proc_macro_derive(PersistentRecord, attributes(depot))]
pub fn derive_persistent_record(input: TokenStream) -> TokenStream {
    record::derive_persistent_record_inner(input)
}
