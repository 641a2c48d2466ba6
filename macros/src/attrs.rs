//! Parsing of `#[depot(...)]` attributes

use proc_macro2::Span;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Attribute, LitBool, LitInt, LitStr, Path, Token};

#[derive(Default)]
pub(crate) struct RecordAttrs {
    pub table: Option<LitStr>,
    pub indexes: Vec<IndexAttr>,
    pub uniques: Vec<Vec<LitStr>>,
    pub full_texts: Vec<FullTextAttr>,
    pub generators: Vec<GeneratorAttr>,
    pub computed: Option<ComputedAttr>,
}

pub(crate) struct IndexAttr {
    pub name: LitStr,
    pub fields: Vec<LitStr>,
    pub unique: bool,
}

pub(crate) struct FullTextAttr {
    pub name: LitStr,
    pub fields: Vec<LitStr>,
}

#[derive(Default)]
pub(crate) struct GeneratorAttr {
    pub name: Option<LitStr>,
    pub table: Option<LitStr>,
    pub pk_column: Option<LitStr>,
    pub value_column: Option<LitStr>,
    pub pk_value: Option<LitStr>,
}

#[derive(Default)]
pub(crate) struct ComputedAttr {
    pub required: Option<bool>,
    pub definition: Option<LitStr>,
    pub shadow_of: Option<Path>,
}

#[derive(Default)]
pub(crate) struct ColumnAttr {
    pub name: Option<LitStr>,
    pub unique: bool,
    pub nullable: bool,
    pub definition: Option<LitStr>,
    pub length: Option<LitInt>,
    pub default: Option<LitStr>,
}

pub(crate) struct GeneratedAttr {
    pub strategy: LitStr,
    pub generator: Option<LitStr>,
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub id: bool,
    pub transient: bool,
    pub column: Option<ColumnAttr>,
    pub generated: Option<GeneratedAttr>,
    pub computed: Option<ComputedAttr>,
}

const STRATEGIES: &[&str] = &["table", "sequence", "identity", "auto"];

fn depot_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("depot"))
}

/// `fields("a", "b")`
fn parse_str_list(meta: &ParseNestedMeta) -> syn::Result<Vec<LitStr>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let list = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
    Ok(list.into_iter().collect())
}

/// Bare `flag` or `flag = true|false`
fn parse_flag(meta: &ParseNestedMeta) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        let value: LitBool = meta.value()?.parse()?;
        Ok(value.value)
    } else {
        Ok(true)
    }
}

fn parse_str(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    meta.value()?.parse()
}

pub(crate) fn parse_record_attrs(attrs: &[Attribute]) -> syn::Result<RecordAttrs> {
    let mut out = RecordAttrs::default();
    for attr in depot_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                out.table = Some(parse_str(&meta)?);
                Ok(())
            } else if meta.path.is_ident("index") {
                let mut name = None;
                let mut fields = Vec::new();
                let mut unique = false;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        name = Some(parse_str(&inner)?);
                    } else if inner.path.is_ident("fields") {
                        fields = parse_str_list(&inner)?;
                    } else if inner.path.is_ident("unique") {
                        unique = parse_flag(&inner)?;
                    } else {
                        return Err(inner.error("unknown index attribute"));
                    }
                    Ok(())
                })?;
                let Some(name) = name else {
                    return Err(meta.error("index needs a name"));
                };
                if fields.is_empty() {
                    return Err(meta.error("index needs at least one field"));
                }
                out.indexes.push(IndexAttr {
                    name,
                    fields,
                    unique,
                });
                Ok(())
            } else if meta.path.is_ident("unique") {
                let mut columns = Vec::new();
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("columns") {
                        columns = parse_str_list(&inner)?;
                        Ok(())
                    } else {
                        Err(inner.error("unknown unique attribute"))
                    }
                })?;
                if columns.is_empty() {
                    return Err(meta.error("unique constraint needs at least one column"));
                }
                out.uniques.push(columns);
                Ok(())
            } else if meta.path.is_ident("full_text") {
                let mut name = None;
                let mut fields = Vec::new();
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        name = Some(parse_str(&inner)?);
                    } else if inner.path.is_ident("fields") {
                        fields = parse_str_list(&inner)?;
                    } else {
                        return Err(inner.error("unknown full_text attribute"));
                    }
                    Ok(())
                })?;
                let Some(name) = name else {
                    return Err(meta.error("full_text index needs a name"));
                };
                out.full_texts.push(FullTextAttr { name, fields });
                Ok(())
            } else if meta.path.is_ident("table_generator") {
                let mut generator = GeneratorAttr::default();
                meta.parse_nested_meta(|inner| {
                    let slot = if inner.path.is_ident("name") {
                        &mut generator.name
                    } else if inner.path.is_ident("table") {
                        &mut generator.table
                    } else if inner.path.is_ident("pk_column") {
                        &mut generator.pk_column
                    } else if inner.path.is_ident("value_column") {
                        &mut generator.value_column
                    } else if inner.path.is_ident("pk_value") {
                        &mut generator.pk_value
                    } else {
                        return Err(inner.error("unknown table_generator attribute"));
                    };
                    *slot = Some(parse_str(&inner)?);
                    Ok(())
                })?;
                if generator.name.is_none() {
                    return Err(meta.error("table_generator needs a name"));
                }
                out.generators.push(generator);
                Ok(())
            } else if meta.path.is_ident("computed") {
                out.computed = Some(parse_computed(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unknown depot record attribute"))
            }
        })?;
    }
    Ok(out)
}

fn parse_computed(meta: &ParseNestedMeta) -> syn::Result<ComputedAttr> {
    let mut computed = ComputedAttr::default();
    // bare `computed`
    if meta.input.is_empty() || meta.input.peek(Token![,]) {
        return Ok(computed);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("required") {
            computed.required = Some(parse_flag(&inner)?);
        } else if inner.path.is_ident("definition") {
            computed.definition = Some(parse_str(&inner)?);
        } else if inner.path.is_ident("shadow_of") {
            computed.shadow_of = Some(inner.value()?.parse()?);
        } else {
            return Err(inner.error("unknown computed attribute"));
        }
        Ok(())
    })?;
    Ok(computed)
}

pub(crate) fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in depot_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                out.id = true;
                Ok(())
            } else if meta.path.is_ident("transient") {
                out.transient = true;
                Ok(())
            } else if meta.path.is_ident("column") {
                let mut column = ColumnAttr::default();
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        column.name = Some(parse_str(&inner)?);
                    } else if inner.path.is_ident("unique") {
                        column.unique = parse_flag(&inner)?;
                    } else if inner.path.is_ident("nullable") {
                        column.nullable = parse_flag(&inner)?;
                    } else if inner.path.is_ident("definition") {
                        column.definition = Some(parse_str(&inner)?);
                    } else if inner.path.is_ident("length") {
                        column.length = Some(inner.value()?.parse()?);
                    } else if inner.path.is_ident("default") {
                        column.default = Some(parse_str(&inner)?);
                    } else {
                        return Err(inner.error("unknown column attribute"));
                    }
                    Ok(())
                })?;
                out.column = Some(column);
                Ok(())
            } else if meta.path.is_ident("generated") {
                let mut strategy = None;
                let mut generator = None;
                let bare = meta.input.is_empty() || meta.input.peek(Token![,]);
                if !bare {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("strategy") {
                            let value = parse_str(&inner)?;
                            if !STRATEGIES.contains(&value.value().to_lowercase().as_str()) {
                                return Err(syn::Error::new_spanned(
                                    &value,
                                    "strategy must be one of \"table\", \"sequence\", \"identity\", \"auto\"",
                                ));
                            }
                            strategy = Some(value);
                        } else if inner.path.is_ident("generator") {
                            generator = Some(parse_str(&inner)?);
                        } else {
                            return Err(inner.error("unknown generated attribute"));
                        }
                        Ok(())
                    })?;
                }
                let strategy = strategy.unwrap_or_else(|| LitStr::new("auto", Span::call_site()));
                out.generated = Some(GeneratedAttr {
                    strategy,
                    generator,
                });
                Ok(())
            } else if meta.path.is_ident("computed") {
                out.computed = Some(parse_computed(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unknown depot field attribute"))
            }
        })?;
    }
    Ok(out)
}
