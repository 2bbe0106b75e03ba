//! # pgrel
//!
//! A small relational mapper for Postgres: typed entities in, parameterized
//! SQL out, with relations that load in bulk instead of one query per row.
//!
//! ## Features
//!
//! - **Static column tables**: `#[derive(Entity)]` generates the column list, no runtime reflection
//! - **Predicate trees**: AND/OR filters and nested groups compile to `$n` placeholders numbered across the whole statement
//! - **Soft delete**: `<table>.deleted_at IS NULL` is injected into reads, joins and bulk updates unless disabled
//! - **Relations**: belongs-to / has-many / has-one with per-owner caches and one-query eager loading
//! - **Injected configuration**: an explicit [`Config`] instead of process-wide state
//! - **Transaction-friendly**: pass a transaction anywhere a `GenericClient` is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgrel::{Entity, Meta, RelationData, qb::Order};
//!
//! #[derive(Debug, Clone, Default, Entity)]
//! #[orm(table = "artists")]
//! struct Artist {
//!     meta: Meta,
//!     name: String,
//!     #[orm(has_many = "artist_id")]
//!     albums: RelationData<Album>,
//! }
//!
//! #[derive(Debug, Clone, Default, Entity)]
//! #[orm(table = "albums")]
//! struct Album {
//!     meta: Meta,
//!     artist_id: Option<uuid::Uuid>,
//!     title: String,
//! }
//!
//! let mut prince = Artist { name: "Prince".into(), ..Default::default() };
//! pgrel::save(&client, &mut prince).await?;
//!
//! let artists = pgrel::query::<Artist>()
//!     .eq("name", "Prince")
//!     .or_filter("name", "=", "Queen")
//!     .order_by("name", Order::Asc)
//!     .with(Artist::albums())
//!     .get(&client)
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod mapper;
mod persist;
pub mod qb;
pub mod relation;
pub mod row;

#[cfg(test)]
mod testing;

pub use client::GenericClient;
pub use config::{Config, Orm};
pub use error::{OrmError, OrmResult};
pub use hook::{NoopHook, QueryContext, QueryHook, TracingSqlHook};
pub use mapper::{Column, Entity, Meta, column_for_field, decode, mapped_columns};
pub use persist::{build_insert, build_update};
pub use qb::{BuiltQuery, Join, JoinKind, Order, Param, ParamList, Query, UpdateQuery};
pub use relation::{EagerLoad, ForeignKey, Relation, RelationData, RelationKind};
pub use row::{FromRow, RowExt, read_column};

// Re-exported for generated code and callers that bind driver types directly.
pub use tokio_postgres;
pub use uuid::Uuid;

#[cfg(feature = "derive")]
pub use pgrel_derive::{Entity, FromRow};

/// Start a read query for `T` with the default configuration.
pub fn query<T: Entity>() -> Query<T> {
    Query::new()
}

/// Start a bulk update for `T` with the default configuration.
pub fn update<T: Entity>() -> UpdateQuery<T> {
    UpdateQuery::new()
}

/// Insert or update `entity` with the default configuration.
pub async fn save<E: Entity>(conn: &dyn GenericClient, entity: &mut E) -> OrmResult<()> {
    persist::save(conn, &config::default_config(), entity).await
}

/// [`save`], panicking on failure.
pub async fn must_save<E: Entity>(conn: &dyn GenericClient, entity: &mut E) {
    save(conn, entity).await.unwrap_or_else(|e| panic!("{}", e))
}
