use crate::attrs::{parse_field_attrs, parse_record_attrs, ComputedAttr, FieldAttrs};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type};

pub(crate) fn derive_persistent_record_inner(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "PersistentRecord can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "PersistentRecord can only be derived for structs",
            ));
        }
    };

    let record = parse_record_attrs(&input.attrs)?;

    let mut descriptor = quote! { ::depot::RecordDescriptor::new(#name_str) };
    if let Some(table) = &record.table {
        if record.computed.is_some() {
            return Err(syn::Error::new_spanned(
                table,
                "a computed record can not declare a table",
            ));
        }
        descriptor = quote! { #descriptor.with_table(#table) };
    }
    if let Some(computed) = &record.computed {
        let computed = computed_tokens(computed);
        descriptor = quote! { #descriptor.with_computed(#computed) };
    }

    let mut values = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.transient {
            if attrs.id || attrs.column.is_some() || attrs.computed.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "a transient field can not carry other depot attributes",
                ));
            }
            continue;
        }

        let field_name = ident.to_string();
        let field_type = field_type_tokens(&field.ty);
        let field_descriptor = field_tokens(&field_name, field_type, &attrs);
        descriptor = quote! { #descriptor.field(#field_descriptor) };

        values.push(quote! {
            (#field_name, ::depot::Value::from(::std::clone::Clone::clone(&self.#ident)))
        });
    }

    for index in &record.indexes {
        let index_name = &index.name;
        let index_fields = &index.fields;
        let unique = index.unique;
        descriptor = quote! { #descriptor.index(#index_name, &[#(#index_fields),*], #unique) };
    }
    for columns in &record.uniques {
        descriptor = quote! { #descriptor.unique(&[#(#columns),*]) };
    }
    for fts in &record.full_texts {
        let fts_name = &fts.name;
        let fts_fields = &fts.fields;
        descriptor = quote! { #descriptor.full_text(#fts_name, &[#(#fts_fields),*]) };
    }
    for generator in &record.generators {
        let gen_name = &generator.name;
        let mut tokens = quote! { ::depot::TableGenerator::new(#gen_name) };
        let overrides = [
            (quote! { table }, &generator.table),
            (quote! { pk_column }, &generator.pk_column),
            (quote! { value_column }, &generator.value_column),
            (quote! { pk_value }, &generator.pk_value),
        ];
        let sets: Vec<_> = overrides
            .iter()
            .filter_map(|(slot, value)| {
                value
                    .as_ref()
                    .map(|v| quote! { generator.#slot = ::std::string::String::from(#v); })
            })
            .collect();
        if !sets.is_empty() {
            tokens = quote! {{
                let mut generator = #tokens;
                #(#sets)*
                generator
            }};
        }
        descriptor = quote! { #descriptor.table_generator(#tokens) };
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::depot::PersistentRecord for #name #ty_generics #where_clause {
            fn descriptor() -> ::depot::RecordDescriptor {
                #descriptor
            }

            fn field_values(&self) -> ::std::vec::Vec<(&'static str, ::depot::Value)> {
                ::std::vec![#(#values),*]
            }
        }
    })
}

fn field_tokens(name: &str, field_type: TokenStream2, attrs: &FieldAttrs) -> TokenStream2 {
    let mut tokens = quote! { ::depot::FieldDescriptor::new(#name, #field_type) };
    if attrs.id {
        tokens = quote! { #tokens.with_id() };
    }
    if let Some(column) = &attrs.column {
        let mut col = match &column.name {
            Some(col_name) => quote! { ::depot::Column::named(#col_name) },
            None => quote! { <::depot::Column as ::std::default::Default>::default() },
        };
        if column.unique {
            col = quote! { #col.with_unique() };
        }
        if column.nullable {
            col = quote! { #col.with_nullable() };
        }
        if let Some(definition) = &column.definition {
            col = quote! { #col.with_definition(#definition) };
        }
        if let Some(length) = &column.length {
            col = quote! { #col.with_length(#length) };
        }
        if let Some(default) = &column.default {
            col = quote! { #col.with_default(#default) };
        }
        tokens = quote! { #tokens.with_column(#col) };
    }
    if let Some(generated) = &attrs.generated {
        let strategy = generated.strategy.value().to_lowercase();
        let variant = match strategy.as_str() {
            "table" => quote! { Table },
            "sequence" => quote! { Sequence },
            "identity" => quote! { Identity },
            _ => quote! { Auto },
        };
        let generator = match &generated.generator {
            Some(g) => quote! { ::std::option::Option::Some(::std::string::String::from(#g)) },
            None => quote! { ::std::option::Option::None },
        };
        tokens = quote! {
            #tokens.with_generated(::depot::GeneratedValue {
                strategy: ::depot::GenerationType::#variant,
                generator: #generator,
            })
        };
    }
    if let Some(computed) = &attrs.computed {
        let computed = computed_tokens(computed);
        tokens = quote! { #tokens.with_computed(#computed) };
    }
    tokens
}

fn computed_tokens(computed: &ComputedAttr) -> TokenStream2 {
    let mut tokens = quote! { ::depot::Computed::new() };
    if computed.required == Some(false) {
        tokens = quote! { #tokens.optional() };
    }
    if let Some(definition) = &computed.definition {
        tokens = quote! { #tokens.with_definition(#definition) };
    }
    if let Some(shadow) = &computed.shadow_of {
        tokens = quote! { #tokens.shadowing(::depot::RecordType::of::<#shadow>()) };
    }
    tokens
}

/// Map a Rust field type onto a `FieldType` variant; `Option<T>` maps as `T`
fn field_type_tokens(ty: &Type) -> TokenStream2 {
    let ty = unwrap_option(ty).unwrap_or(ty);
    let Type::Path(type_path) = ty else {
        let text = quote!(#ty).to_string();
        return quote! { ::depot::FieldType::Custom(::std::string::String::from(#text)) };
    };
    let Some(last) = type_path.path.segments.last() else {
        return quote! { ::depot::FieldType::Custom(::std::string::String::new()) };
    };
    let ident = last.ident.to_string();
    let variant = match ident.as_str() {
        "bool" => quote! { Boolean },
        "i8" | "u8" => quote! { TinyInt },
        "i16" | "u16" => quote! { SmallInt },
        "i32" | "u32" => quote! { Integer },
        "i64" | "u64" | "isize" | "usize" => quote! { BigInt },
        "f32" => quote! { Float },
        "f64" => quote! { Double },
        "String" | "str" => quote! { Text },
        "NaiveDate" => quote! { Date },
        "NaiveDateTime" | "DateTime" => quote! { Timestamp },
        "Value" if type_path.path.segments.len() > 1 => quote! { Json },
        "Vec" if is_vec_u8(last) => quote! { Bytes },
        _ => {
            return quote! { ::depot::FieldType::Custom(::std::string::String::from(#ident)) };
        }
    };
    quote! { ::depot::FieldType::#variant }
}

fn unwrap_option(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let last = type_path.path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }
    first_generic(last)
}

fn is_vec_u8(segment: &syn::PathSegment) -> bool {
    matches!(first_generic(segment), Some(Type::Path(p)) if p.path.is_ident("u8"))
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}
