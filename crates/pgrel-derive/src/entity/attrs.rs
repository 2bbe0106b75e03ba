//! `#[orm(...)]` parsing for `#[derive(Entity)]`.

use heck::ToSnakeCase;
use syn::{DeriveInput, Result};

/// Relation flavour named by a field attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RelationAttr {
    BelongsTo,
    HasMany,
    HasOne,
}

/// Parsed field-level attribute.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub skip: bool,
    pub column: Option<String>,
    /// Relation kind plus the Rust field holding the foreign key.
    pub relation: Option<(RelationAttr, syn::LitStr)>,
}

impl FieldAttr {
    fn merge(&mut self, other: FieldAttr) {
        self.skip |= other.skip;
        if other.column.is_some() {
            self.column = other.column;
        }
        if other.relation.is_some() {
            self.relation = other.relation;
        }
    }
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if ident == "skip" {
                attr.skip = true;
            } else {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                let relation = match ident.to_string().as_str() {
                    "column" => {
                        attr.column = Some(value.value());
                        None
                    }
                    "belongs_to" => Some(RelationAttr::BelongsTo),
                    "has_many" => Some(RelationAttr::HasMany),
                    "has_one" => Some(RelationAttr::HasOne),
                    other => {
                        return Err(syn::Error::new_spanned(
                            &ident,
                            format!("unknown orm attribute `{}`", other),
                        ));
                    }
                };
                if let Some(kind) = relation {
                    if attr.relation.is_some() {
                        return Err(syn::Error::new_spanned(&ident, "only one relation per field"));
                    }
                    attr.relation = Some((kind, value));
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Collect every `#[orm(...)]` on a field.
pub(super) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in &field.attrs {
        if attr.path().is_ident("orm") {
            out.merge(attr.parse_args::<FieldAttr>()?);
        }
    }
    Ok(out)
}

/// Struct-level `#[orm(table = "...")]`, else the snake-cased struct name.
pub(super) fn table_name(input: &DeriveInput) -> Result<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("orm") {
            let nested = attr.parse_args::<syn::MetaNameValue>()?;
            if !nested.path.is_ident("table") {
                return Err(syn::Error::new_spanned(
                    &nested.path,
                    "expected #[orm(table = \"...\")]",
                ));
            }
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(lit),
                ..
            }) = &nested.value
            {
                return Ok(lit.value());
            }
            return Err(syn::Error::new_spanned(&nested.value, "table must be a string literal"));
        }
    }
    Ok(input.ident.to_string().to_snake_case())
}
