use std::collections::HashMap;

use heck::ToShoutySnakeCase;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input};

/// Derives `weft_core::Entity` and `weft_core::BindColumn`, plus one
/// `weft_core::Field` constant per mapped field (`User::NAME`).
///
/// Container attribute: `#[weft(table = "...")]`.
/// Field attributes: `#[weft(column = "...")]`, `#[weft(tag = "primary;size:64")]`,
/// `#[weft(ignore)]`.
#[proc_macro_derive(Entity, attributes(weft))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_entity_impl(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

struct MappedField<'f> {
    ident: &'f Ident,
    ty: &'f Type,
    name: String,
    column: Option<String>,
    tag: String,
}

fn derive_entity_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let type_name = struct_name.unraw().to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Weft Entity does not support generic structs",
        ));
    }

    let all_fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "Weft Entity only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Weft Entity only supports structs",
            ));
        }
    };

    let table = parse_table(input)?;
    let mut fields = Vec::with_capacity(all_fields.len());
    for field in all_fields {
        if let Some(mapped) = parse_field(field)? {
            fields.push(mapped);
        }
    }

    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    let idents: Vec<_> = fields.iter().map(|f| f.ident).collect();
    let types: Vec<_> = fields.iter().map(|f| f.ty).collect();
    let tags: Vec<_> = fields.iter().map(|f| f.tag.as_str()).collect();
    let mut const_names = HashMap::new();
    for field in &fields {
        let name = field.name.to_shouty_snake_case();
        if let Some(other) = const_names.insert(name.clone(), field.ident) {
            return Err(syn::Error::new_spanned(
                field.ident,
                format!("fields `{}` and `{}` both map to the constant `{}`", other, field.ident, name),
            ));
        }
    }
    let consts: Vec<_> = fields
        .iter()
        .map(|f| format_ident!("{}", f.name.to_shouty_snake_case()))
        .collect();
    let columns: Vec<_> = fields
        .iter()
        .map(|f| match &f.column {
            Some(column) => quote! { Some(#column) },
            None => quote! { None },
        })
        .collect();
    let table = match table {
        Some(table) => quote! { Some(#table) },
        None => quote! { None },
    };
    let count = fields.len();

    Ok(quote! {
        impl #struct_name {
            #(
                pub const #consts: weft_core::Field =
                    weft_core::Field::new(<Self as weft_core::Entity>::KEY, #names);
            )*
        }

        impl weft_core::Entity for #struct_name {
            const KEY: weft_core::EntityKey = concat!(module_path!(), "::", #type_name);

            fn schema() -> &'static weft_core::EntitySchema {
                static COLUMNS: [weft_core::ColumnDef; #count] = [
                    #( weft_core::ColumnDef::new(#names, #columns, #tags), )*
                ];
                static SCHEMA: weft_core::EntitySchema = weft_core::EntitySchema::new(
                    concat!(module_path!(), "::", #type_name),
                    #type_name,
                    #table,
                    &COLUMNS,
                );
                &SCHEMA
            }

            fn values(&self) -> Vec<(&'static str, Option<weft_core::Value>)> {
                vec![
                    #( (#names, weft_core::ToValue::to_value(&self.#idents)), )*
                ]
            }
        }

        impl<DB> weft_core::BindColumn<DB> for #struct_name
        where
            DB: weft_core::sqlx::Database,
            usize: weft_core::sqlx::ColumnIndex<DB::Row>,
            #(
                #types: weft_core::sqlx::Type<DB> + for<'r> weft_core::sqlx::Decode<'r, DB>,
            )*
        {
            fn bind_column(
                &mut self,
                field: &str,
                row: &DB::Row,
                index: usize,
            ) -> Result<bool, weft_core::sqlx::Error> {
                use weft_core::sqlx::Row;
                match field {
                    #( #names => self.#idents = row.try_get(index)?, )*
                    _ => return Ok(false),
                }
                Ok(true)
            }
        }
    })
}

fn parse_table(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("weft") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported weft container attribute, expected `table`"))
            }
        })?;
    }
    Ok(table)
}

/// `None` for `#[weft(ignore)]` fields.
fn parse_field(field: &syn::Field) -> syn::Result<Option<MappedField<'_>>> {
    let Some(ident) = field.ident.as_ref() else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };
    let mut column = None;
    let mut tag = String::new();
    let mut ignore = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("weft") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                column = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("tag") {
                tag = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("ignore") {
                ignore = true;
            } else {
                return Err(meta.error("unsupported weft field attribute"));
            }
            Ok(())
        })?;
    }

    if ignore {
        return Ok(None);
    }
    Ok(Some(MappedField {
        ident,
        ty: &field.ty,
        name: ident.unraw().to_string(),
        column,
        tag,
    }))
}
