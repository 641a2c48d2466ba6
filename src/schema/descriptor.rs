//! Record descriptors
//!
//! A [`RecordDescriptor`] is the raw, unvalidated declaration of a persistent
//! record: what `#[derive(PersistentRecord)]` produces from `#[depot(...)]`
//! attributes, or what a hand-written [`PersistentRecord`] impl builds with
//! the builder methods below. [`RecordSchema`] compiles and validates it.
//!
//! [`PersistentRecord`]: super::PersistentRecord
//! [`RecordSchema`]: super::RecordSchema

use super::record::RecordType;

/// Storage type of a persistent field, inferred from its Rust type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Text,
    Bytes,
    Date,
    Timestamp,
    Json,
    /// A type with no built-in column mapping; needs an explicit column definition
    Custom(String),
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt
        )
    }
}

/// Column metadata attached to a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name; defaults to the field name
    pub name: Option<String>,
    pub unique: bool,
    /// Nullability is opt-in: columns are `NOT NULL` unless this is set
    pub nullable: bool,
    /// Explicit SQL type, replacing the one inferred from the field type
    pub definition: Option<String>,
    pub length: u32,
    pub default_value: Option<String>,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            name: None,
            unique: false,
            nullable: false,
            definition: None,
            length: 255,
            default_value: None,
        }
    }
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Primary key generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationType {
    Table,
    Sequence,
    Identity,
    Auto,
}

impl GenerationType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "sequence" => Some(Self::Sequence),
            "identity" => Some(Self::Identity),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Whether the database assigns the value on insert
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity | Self::Auto)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedValue {
    pub strategy: GenerationType,
    /// Name of the table generator, required by [`GenerationType::Table`]
    pub generator: Option<String>,
}

impl GeneratedValue {
    pub fn new(strategy: GenerationType) -> Self {
        Self {
            strategy,
            generator: None,
        }
    }

    pub fn identity() -> Self {
        Self::new(GenerationType::Identity)
    }

    pub fn table(generator: impl Into<String>) -> Self {
        Self {
            strategy: GenerationType::Table,
            generator: Some(generator.into()),
        }
    }
}

/// A named key generator backed by a row in a counter table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGenerator {
    pub name: String,
    pub table: String,
    pub pk_column: String,
    pub value_column: String,
    pub pk_value: String,
}

impl TableGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: "IdSequences".to_string(),
            pk_column: "sequence".to_string(),
            value_column: "value".to_string(),
            pk_value: name.clone(),
            name,
        }
    }
}

/// Marks a record or field as computed rather than backed by its own storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Computed {
    /// Non-required computed fields with no definition are left out of projections
    pub required: bool,
    /// Literal SQL that produces the field's value
    pub definition: Option<String>,
    /// Concrete record whose table (or same-named field) backs this one
    pub shadow_of: Option<RecordType>,
}

impl Default for Computed {
    fn default() -> Self {
        Self {
            required: true,
            definition: None,
            shadow_of: None,
        }
    }
}

impl Computed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn shadowing(mut self, record: RecordType) -> Self {
        self.shadow_of = Some(record);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTextIndex {
    pub name: String,
    pub fields: Vec<String>,
}

/// Declaration of one field of a persistent record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub id: bool,
    pub column: Column,
    pub generated: Option<GeneratedValue>,
    pub computed: Option<Computed>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            id: false,
            column: Column::default(),
            generated: None,
            computed: None,
        }
    }

    pub fn with_id(mut self) -> Self {
        self.id = true;
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.column = column;
        self
    }

    pub fn with_generated(mut self, generated: GeneratedValue) -> Self {
        self.generated = Some(generated);
        self
    }

    pub fn with_computed(mut self, computed: Computed) -> Self {
        self.computed = Some(computed);
        self
    }
}

/// Declaration of a persistent record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub type_name: String,
    /// Table name; defaults to the type name
    pub table_name: Option<String>,
    /// Set for computed entities, which own no table
    pub computed: Option<Computed>,
    pub fields: Vec<FieldDescriptor>,
    pub indexes: Vec<Index>,
    pub unique_constraints: Vec<UniqueConstraint>,
    pub full_text_indexes: Vec<FullTextIndex>,
    pub table_generators: Vec<TableGenerator>,
}

impl RecordDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table_name: None,
            computed: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            unique_constraints: Vec::new(),
            full_text_indexes: Vec::new(),
            table_generators: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_computed(mut self, computed: Computed) -> Self {
        self.computed = Some(computed);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn index(mut self, name: impl Into<String>, fields: &[&str], unique: bool) -> Self {
        self.indexes.push(Index {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
        });
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn full_text(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.full_text_indexes.push(FullTextIndex {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn table_generator(mut self, generator: TableGenerator) -> Self {
        self.table_generators.push(generator);
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_defaults() {
        let column = Column::default();
        assert!(!column.nullable);
        assert!(!column.unique);
        assert_eq!(column.length, 255);
        assert!(column.name.is_none());
    }

    #[test]
    fn test_generation_type_parse() {
        assert_eq!(GenerationType::parse("IDENTITY"), Some(GenerationType::Identity));
        assert_eq!(GenerationType::parse("table"), Some(GenerationType::Table));
        assert_eq!(GenerationType::parse("uuid"), None);
        assert!(GenerationType::Auto.is_identity());
        assert!(!GenerationType::Table.is_identity());
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = RecordDescriptor::new("GameRecord")
            .with_table("GAMES")
            .field(FieldDescriptor::new("game_id", FieldType::Integer).with_id())
            .field(
                FieldDescriptor::new("title", FieldType::Text)
                    .with_column(Column::named("TITLE").with_length(64)),
            )
            .index("ix_title", &["title"], false);

        assert_eq!(descriptor.table_name.as_deref(), Some("GAMES"));
        assert_eq!(descriptor.fields.len(), 2);
        assert!(descriptor.find_field("game_id").unwrap().id);
        assert_eq!(descriptor.find_field("title").unwrap().column.length, 64);
        assert_eq!(descriptor.indexes[0].fields, vec!["title".to_string()]);
    }
}
