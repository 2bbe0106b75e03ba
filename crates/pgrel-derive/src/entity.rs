//! `#[derive(Entity)]`: the static column table plus relation constructors.

mod attrs;

use crate::common::case::to_snake_case;
use crate::common::syn_types::{is_meta, relation_inner};
use attrs::{RelationAttr, field_attr, table_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{Data, DeriveInput, Fields, Result};

const META_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut iter = fields.iter();
    let meta_field = match iter.next() {
        Some(f) if is_meta(&f.ty) => f.ident.clone().expect("named field"),
        Some(f) => {
            return Err(syn::Error::new_spanned(
                &f.ty,
                "the first field of an Entity must be the `Meta` block",
            ));
        }
        None => {
            return Err(syn::Error::new_spanned(
                &input,
                "an Entity needs a leading `Meta` field",
            ));
        }
    };

    let table = table_name(&input)?;
    let mut seen: HashSet<String> = META_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut columns = Vec::new();
    let mut relations = Vec::new();

    for field in iter {
        let ident = field.ident.as_ref().expect("named field");
        let attr = field_attr(field)?;
        let target = relation_inner(&field.ty);

        if let Some((kind, key_field)) = attr.relation {
            let Some(target) = target else {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "relation fields must be typed `RelationData<T>`",
                ));
            };
            relations.push(relation_fn(ident, target, kind, &key_field)?);
            continue;
        }
        if attr.skip {
            continue;
        }
        if target.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "`RelationData` fields need #[orm(belongs_to | has_many | has_one = \"...\")] or #[orm(skip)]",
            ));
        }

        let column = attr
            .column
            .unwrap_or_else(|| to_snake_case(&ident.to_string()));
        if !seen.insert(column.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("column `{}` is mapped twice", column),
            ));
        }
        let field_name = ident.to_string();
        columns.push(quote! {
            pgrel::Column {
                name: #column,
                field: #field_name,
                read: |e| pgrel::Param::new(::core::clone::Clone::clone(&e.#ident)),
                write: |e, row, idx| {
                    e.#ident = pgrel::read_column(row, idx, #column)?;
                    ::core::result::Result::Ok(())
                },
            }
        });
    }

    Ok(quote! {
        impl pgrel::Entity for #name {
            const TABLE: &'static str = #table;
            const COLUMNS: &'static [pgrel::Column<Self>] = &[
                pgrel::Column::<Self>::ID,
                pgrel::Column::<Self>::CREATED_AT,
                pgrel::Column::<Self>::UPDATED_AT,
                pgrel::Column::<Self>::DELETED_AT,
                #(#columns),*
            ];

            fn meta(&self) -> &pgrel::Meta {
                &self.#meta_field
            }

            fn meta_mut(&mut self) -> &mut pgrel::Meta {
                &mut self.#meta_field
            }
        }

        impl #name {
            #(#relations)*
        }
    })
}

fn relation_fn(
    slot: &syn::Ident,
    target: &syn::Type,
    kind: RelationAttr,
    key_field: &syn::LitStr,
) -> Result<TokenStream> {
    let key = syn::parse_str::<syn::Ident>(&key_field.value())
        .map_err(|_| syn::Error::new_spanned(key_field, "expected a field name"))?;
    let key_name = key.to_string();
    let ctor = match kind {
        RelationAttr::BelongsTo => format_ident!("belongs_to"),
        RelationAttr::HasMany => format_ident!("has_many"),
        RelationAttr::HasOne => format_ident!("has_one"),
    };
    // belongs_to reads the key from the owner, the others from the target.
    let key_fn = match kind {
        RelationAttr::BelongsTo => quote! { |e| pgrel::ForeignKey::key(&e.#key) },
        _ => quote! { |t| pgrel::ForeignKey::key(&t.#key) },
    };

    Ok(quote! {
        pub fn #slot() -> pgrel::Relation<Self, #target> {
            pgrel::Relation::<Self, #target>::#ctor(
                #key_name,
                #key_fn,
                |e| &e.#slot,
                |e| &mut e.#slot,
            )
        }
    })
}
