//! Generated snippets
//!
//! Every function here is a pure function of its arguments. Each returns
//! whole lines, newline-terminated, indented with `indent`.

use super::parse::SourceField;
use super::splice::Region;
use heck::ToShoutySnakeCase;

const INDENT: &str = "    ";

/// `user_id` -> `USER_ID`
pub fn constant_name(field: &str) -> String {
    field.to_shouty_snake_case()
}

pub fn field_constant(indent: &str, field: &str) -> String {
    format!(
        "{indent}pub const {}: &'static str = \"{field}\";\n",
        constant_name(field)
    )
}

pub fn column_accessor(indent: &str, field: &str) -> String {
    format!(
        "{indent}pub fn {field}_c() -> ::depot::ColumnExp {{\n\
         {indent}{INDENT}::depot::ColumnExp::new::<Self>(Self::{})\n\
         {indent}}}\n",
        constant_name(field)
    )
}

/// `get_key(a: A, b: B) -> Key` over the id fields in declaration order
pub fn key_builder(indent: &str, ids: &[&SourceField]) -> String {
    let args = ids
        .iter()
        .map(|field| format!("{}: {}", field.name, field.ty))
        .collect::<Vec<_>>()
        .join(", ");
    let values = ids
        .iter()
        .map(|field| {
            format!(
                "(Self::{}, ::depot::Value::from({}))",
                constant_name(&field.name),
                field.name
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{indent}pub fn get_key({args}) -> ::depot::Key {{\n\
         {indent}{INDENT}::depot::Key::new::<Self>(vec![{values}])\n\
         {indent}}}\n"
    )
}

/// Contents of the fields region
pub fn fields_body(indent: &str, fields: &[SourceField]) -> String {
    let mut out = String::new();
    for field in fields {
        out.push_str(&field_constant(indent, &field.name));
    }
    for field in fields {
        out.push('\n');
        out.push_str(&column_accessor(indent, &field.name));
    }
    out
}

/// Contents of the methods region; empty for a record without id fields
pub fn methods_body(indent: &str, fields: &[SourceField]) -> String {
    let ids: Vec<&SourceField> = fields.iter().filter(|field| field.id).collect();
    if ids.is_empty() {
        return String::new();
    }
    key_builder(indent, &ids)
}

/// A region with its markers
pub fn region(indent: &str, region: Region, body: &str) -> String {
    format!(
        "{indent}{}\n{body}{indent}{}\n",
        region.start_marker(),
        region.end_marker()
    )
}

/// A fresh `impl` block holding both regions
pub fn impl_block(record: &str, fields: &[SourceField]) -> String {
    format!(
        "impl {record} {{\n{}\n{}}}\n",
        region(INDENT, Region::Fields, &fields_body(INDENT, fields)),
        region(INDENT, Region::Methods, &methods_body(INDENT, fields)),
    )
}

/// One level deeper than `indent`
pub fn nested(indent: &str) -> String {
    format!("{indent}{INDENT}")
}
