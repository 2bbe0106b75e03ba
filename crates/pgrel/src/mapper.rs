//! Static per-type column tables.
//!
//! Every entity embeds a [`Meta`] block and exposes an ordered
//! `&'static [Column<Self>]` through [`Entity::COLUMNS`]. Positions 0..4 are
//! always `id`, `created_at`, `updated_at`, `deleted_at`; the entity's own
//! persisted fields follow in declaration order. The table is normally
//! generated by `#[derive(Entity)]`.

use crate::config::Config;
use crate::error::OrmResult;
use crate::qb::Param;
use crate::row::read_column;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// Identifier and lifecycle timestamps shared by every entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Assigned by the caller before the first write or generated by the database on insert.
    pub id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Meta with a pre-assigned identifier.
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// One persisted field: its column name and accessors.
pub struct Column<E> {
    /// Physical column name.
    pub name: &'static str,
    /// Rust field name (`id`, `created_at`, ... for the meta block).
    pub field: &'static str,
    /// Read the current value as a bind parameter.
    pub read: fn(&E) -> Param,
    /// Store the value at the given row position.
    pub write: fn(&mut E, &Row, usize) -> OrmResult<()>,
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> std::fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("field", &self.field)
            .finish()
    }
}

/// A record type persisted as one table row.
pub trait Entity: Default + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Ordered column table, meta columns first.
    const COLUMNS: &'static [Column<Self>];

    fn meta(&self) -> &Meta;

    fn meta_mut(&mut self) -> &mut Meta;

    fn id(&self) -> Option<Uuid> {
        self.meta().id
    }
}

impl<E: Entity> Column<E> {
    pub const ID: Self = Column {
        name: "id",
        field: "id",
        read: |e| Param::new(e.meta().id),
        write: |e, row, idx| {
            e.meta_mut().id = read_column(row, idx, "id")?;
            Ok(())
        },
    };

    pub const CREATED_AT: Self = Column {
        name: "created_at",
        field: "created_at",
        read: |e| Param::new(e.meta().created_at),
        write: |e, row, idx| {
            e.meta_mut().created_at = read_column(row, idx, "created_at")?;
            Ok(())
        },
    };

    pub const UPDATED_AT: Self = Column {
        name: "updated_at",
        field: "updated_at",
        read: |e| Param::new(e.meta().updated_at),
        write: |e, row, idx| {
            e.meta_mut().updated_at = read_column(row, idx, "updated_at")?;
            Ok(())
        },
    };

    pub const DELETED_AT: Self = Column {
        name: "deleted_at",
        field: "deleted_at",
        read: |e| Param::new(e.meta().deleted_at),
        write: |e, row, idx| {
            e.meta_mut().deleted_at = read_column(row, idx, "deleted_at")?;
            Ok(())
        },
    };
}

const META_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// Panics unless the first four columns are the meta block.
fn assert_meta_layout<E: Entity>() {
    let names: Vec<&str> = E::COLUMNS.iter().take(4).map(|c| c.name).collect();
    if names != META_COLUMNS {
        panic!(
            "pgrel: entity `{}` must start with columns {:?}, found {:?}",
            E::TABLE,
            META_COLUMNS,
            names
        );
    }
}

/// Columns read and written for `E` under `config`.
///
/// `deleted_at` is dropped when soft delete is disabled.
pub fn mapped_columns<E: Entity>(config: &Config) -> Vec<&'static Column<E>> {
    assert_meta_layout::<E>();
    E::COLUMNS
        .iter()
        .filter(|c| config.soft_delete || c.name != "deleted_at")
        .collect()
}

/// Look up a column by Rust field name or column name.
///
/// # Panics
///
/// When `E` maps no such field. A relation or partial update naming an
/// unmapped field is a mismatch between code and mapping.
pub fn column_for_field<E: Entity>(field: &str) -> &'static Column<E> {
    E::COLUMNS
        .iter()
        .find(|c| c.field == field)
        .or_else(|| E::COLUMNS.iter().find(|c| c.name == field))
        .unwrap_or_else(|| panic!("pgrel: `{}` has no mapped field `{}`", E::TABLE, field))
}

/// Decode a row laid out as `columns` into a fresh entity.
pub fn decode<E: Entity>(row: &Row, columns: &[&'static Column<E>]) -> OrmResult<E> {
    let mut entity = E::default();
    for (idx, column) in columns.iter().enumerate() {
        (column.write)(&mut entity, row, idx)?;
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Album, Artist};

    #[test]
    fn meta_block_comes_first() {
        let names: Vec<&str> = Artist::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "deleted_at", "name"]);
    }

    #[test]
    fn soft_delete_off_drops_deleted_at() {
        let config = Config::new().soft_delete(false);
        let names: Vec<&str> = mapped_columns::<Album>(&config).iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec!["id", "created_at", "updated_at", "artist_id", "title", "year"]
        );
        let names: Vec<&str> = mapped_columns::<Album>(&Config::default())
            .iter()
            .map(|c| c.name)
            .collect();
        assert!(names.contains(&"deleted_at"));
    }

    #[test]
    fn lookup_by_field_or_column() {
        assert_eq!(column_for_field::<Album>("artist_id").name, "artist_id");
        assert_eq!(column_for_field::<Album>("release_year").name, "year");
        assert_eq!(column_for_field::<Album>("year").field, "release_year");
    }

    #[test]
    #[should_panic(expected = "has no mapped field `label`")]
    fn unknown_field_is_fatal() {
        column_for_field::<Album>("label");
    }

    #[test]
    fn read_accessors_bind_current_values() {
        let id = Uuid::new_v4();
        let artist = Artist {
            meta: Meta::with_id(id),
            name: "Prince".to_string(),
            ..Default::default()
        };
        let rendered: Vec<String> = Artist::COLUMNS
            .iter()
            .map(|c| format!("{:?}", (c.read)(&artist).as_ref()))
            .collect();
        assert_eq!(rendered[0], format!("{:?}", Some(id)));
        assert_eq!(rendered[4], "\"Prince\"");
    }
}
