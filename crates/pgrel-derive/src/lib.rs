//! Derive macros for pgrel
//!
//! Provides `#[derive(Entity)]` and `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod entity;
mod from_row;

/// Derive the static column table for a persisted struct.
///
/// # Example
///
/// ```ignore
/// use pgrel::{Entity, Meta, RelationData};
///
/// #[derive(Debug, Clone, Default, Entity)]
/// #[orm(table = "albums")]
/// struct Album {
///     meta: Meta,
///     artist_id: Option<uuid::Uuid>,
///     #[orm(column = "year")]
///     release_year: i32,
///     #[orm(belongs_to = "artist_id")]
///     artist: RelationData<Artist>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (default: snake-cased struct name)
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(skip)]` - Not persisted
/// - `#[orm(belongs_to = "fk")]` - `fk` is a field of this struct
/// - `#[orm(has_many = "fk")]`, `#[orm(has_one = "fk")]` - `fk` is a field of the target
///
/// The first field must be the `Meta` block. Each relation field generates
/// an associated `fn <field>() -> pgrel::Relation<Self, Target>`.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `FromRow` for a custom projection.
///
/// # Example
///
/// ```ignore
/// use pgrel::FromRow;
///
/// #[derive(FromRow)]
/// struct AlbumCount {
///     name: String,
///     #[orm(column = "albums")]
///     count: i64,
/// }
/// ```
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
