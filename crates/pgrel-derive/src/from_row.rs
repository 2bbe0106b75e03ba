//! `#[derive(FromRow)]`: decode an ad-hoc projection by column name.

use crate::common::case::to_snake_case;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "FromRow can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "FromRow can only be derived for structs",
            ));
        }
    };

    let field_extracts = fields
        .iter()
        .map(|field| {
            let field_name = field.ident.as_ref().expect("named field");
            let column_name = column_name(field)?;
            Ok(quote! {
                #field_name: row.try_get_column(#column_name)?
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics pgrel::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &pgrel::tokio_postgres::Row) -> pgrel::OrmResult<Self> {
                use pgrel::RowExt;
                ::core::result::Result::Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}

/// `#[orm(column = "...")]`, else the default case rule.
fn column_name(field: &syn::Field) -> Result<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("orm") {
            let nested = attr.parse_args::<syn::MetaNameValue>()?;
            if nested.path.is_ident("column") {
                if let syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(lit),
                    ..
                }) = &nested.value
                {
                    return Ok(lit.value());
                }
            }
            return Err(syn::Error::new_spanned(
                &nested,
                "FromRow only understands #[orm(column = \"...\")]",
            ));
        }
    }
    Ok(to_snake_case(&field.ident.as_ref().expect("named field").to_string()))
}
