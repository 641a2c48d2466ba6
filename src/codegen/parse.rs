//! Locating records in Rust source
//!
//! Positions come from `proc-macro2` span locations and are turned into
//! byte offsets of the original text, so the rewrite never re-prints code
//! it did not generate.

use super::splice::LineIndex;
use crate::error::DepotResult;
use proc_macro2::{Span, TokenTree};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Attribute, Fields, Item, ItemImpl, ItemStruct, Meta, Type};

/// A persistent field as declared in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    pub name: String,
    /// Field type as written, whitespace collapsed
    pub ty: String,
    pub id: bool,
}

/// Byte offsets of the braces of an inherent `impl` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplBody {
    pub open: usize,
    pub close: usize,
}

/// A struct deriving `PersistentRecord`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSource {
    pub name: String,
    pub fields: Vec<SourceField>,
    /// Byte offset just past the struct's closing brace
    pub struct_end: usize,
    /// Inherent `impl` blocks in the same module, in source order
    pub impls: Vec<ImplBody>,
}

impl RecordSource {
    pub fn has_id(&self) -> bool {
        self.fields.iter().any(|field| field.id)
    }
}

/// Every record in `text`, including those in inline modules
pub fn records(text: &str) -> DepotResult<Vec<RecordSource>> {
    let file = syn::parse_file(text)?;
    let index = LineIndex::new(text);
    let mut out = Vec::new();
    collect(&file.items, &index, text, &mut out);
    Ok(out)
}

fn collect(items: &[Item], index: &LineIndex<'_>, text: &str, out: &mut Vec<RecordSource>) {
    for item in items {
        match item {
            Item::Struct(item) if derives_record(&item.attrs) => {
                if let Some(record) = record_source(item, items, index, text) {
                    out.push(record);
                }
            }
            Item::Mod(module) => {
                if let Some((_, content)) = &module.content {
                    collect(content, index, text, out);
                }
            }
            _ => {}
        }
    }
}

fn record_source(
    item: &ItemStruct,
    siblings: &[Item],
    index: &LineIndex<'_>,
    text: &str,
) -> Option<RecordSource> {
    let Fields::Named(named) = &item.fields else {
        return None;
    };
    let name = item.ident.unraw().to_string();

    let fields = named
        .named
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?;
            let flags = depot_flags(&field.attrs);
            if flags.transient {
                return None;
            }
            Some(SourceField {
                name: ident.unraw().to_string(),
                ty: source_of(&field.ty, index, text),
                id: flags.id,
            })
        })
        .collect();

    let impls = siblings
        .iter()
        .filter_map(|sibling| match sibling {
            Item::Impl(item_impl) if is_inherent_impl_of(item_impl, &name) => Some(ImplBody {
                open: index.offset(item_impl.brace_token.span.open().start()),
                close: index.offset(item_impl.brace_token.span.close().start()),
            }),
            _ => None,
        })
        .collect();

    Some(RecordSource {
        name,
        fields,
        struct_end: index.offset(named.brace_token.span.close().end()),
        impls,
    })
}

fn derives_record(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("derive"))
        .any(|attr| {
            let mut found = false;
            // a derive list that fails to parse is not ours to judge
            let _ = attr.parse_nested_meta(|meta| {
                if meta
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == "PersistentRecord")
                {
                    found = true;
                }
                Ok(())
            });
            found
        })
}

#[derive(Default)]
struct DepotFlags {
    id: bool,
    transient: bool,
}

/// Top-level `id` and `transient` words of `#[depot(...)]`
fn depot_flags(attrs: &[Attribute]) -> DepotFlags {
    let mut flags = DepotFlags::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("depot")) {
        let Meta::List(list) = &attr.meta else {
            continue;
        };
        for token in list.tokens.clone() {
            if let TokenTree::Ident(ident) = token {
                if ident == "id" {
                    flags.id = true;
                } else if ident == "transient" {
                    flags.transient = true;
                }
            }
        }
    }
    flags
}

fn is_inherent_impl_of(item: &ItemImpl, name: &str) -> bool {
    if item.trait_.is_some() {
        return false;
    }
    match item.self_ty.as_ref() {
        Type::Path(path) => path.qself.is_none() && path.path.is_ident(name),
        _ => false,
    }
}

fn source_of(ty: &Type, index: &LineIndex<'_>, text: &str) -> String {
    let span: Span = ty.span();
    let (start, end) = (index.offset(span.start()), index.offset(span.end()));
    text.get(start..end)
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"use depot::PersistentRecord;

#[derive(Debug, PersistentRecord)]
#[depot(table = "GAMES")]
pub struct GameRecord {
    #[depot(id, generated(strategy = "identity"))]
    pub game_id: i32,
    #[depot(column(name = "TITLE"))]
    pub title: String,
    #[depot(transient)]
    pub cached: Option<Vec<u8>>,
    pub owner: Option< i64 >,
}

impl GameRecord {
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl std::fmt::Display for GameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.game_id)
    }
}

#[derive(Debug)]
pub struct NotARecord {
    pub id: i32,
}

mod nested {
    #[derive(depot::PersistentRecord)]
    struct Inner {
        #[depot(id)]
        key: u32,
    }
}
"#;

    #[test]
    fn test_finds_records_and_fields() {
        let records = records(SOURCE).unwrap();
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["GameRecord", "Inner"]
        );

        let game = &records[0];
        assert_eq!(
            game.fields,
            vec![
                SourceField {
                    name: "game_id".into(),
                    ty: "i32".into(),
                    id: true
                },
                SourceField {
                    name: "title".into(),
                    ty: "String".into(),
                    id: false
                },
                SourceField {
                    name: "owner".into(),
                    ty: "Option< i64 >".into(),
                    id: false
                },
            ]
        );
        assert!(game.has_id());
        assert!(records[1].has_id());
    }

    #[test]
    fn test_offsets_point_at_braces() {
        let records = records(SOURCE).unwrap();
        let game = &records[0];

        // only the inherent impl counts
        assert_eq!(game.impls.len(), 1);
        let body = game.impls[0];
        assert_eq!(&SOURCE[body.open..body.open + 1], "{");
        assert_eq!(&SOURCE[body.close..body.close + 1], "}");
        assert!(SOURCE[..body.open].ends_with("impl GameRecord "));
        assert!(SOURCE[..game.struct_end].ends_with("pub owner: Option< i64 >,\n}"));

        assert!(records[1].impls.is_empty());
    }

    #[test]
    fn test_parse_errors_surface() {
        assert!(records("pub struct {").is_err());
    }
}
