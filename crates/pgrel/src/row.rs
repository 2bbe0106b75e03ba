//! Row mapping traits and utilities

use crate::error::{OrmError, OrmResult};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Trait for converting a database row into a Rust struct.
///
/// Entities are decoded through their column table (see [`crate::Entity`]);
/// `FromRow` is for ad-hoc result shapes such as aggregate projections.
/// It should typically be derived using `#[derive(FromRow)]`.
///
/// # Example
///
/// ```ignore
/// use pgrel::FromRow;
///
/// #[derive(FromRow)]
/// struct AlbumCount {
///     artist_id: uuid::Uuid,
///     albums: i64,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> OrmResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning OrmError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> OrmResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> OrmResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

/// Read the value at position `idx`, reporting failures against `column`.
///
/// Used by generated column tables, which decode by position so that
/// table-qualified projections (`artists.name`) need no aliasing.
pub fn read_column<T>(row: &Row, idx: usize, column: &str) -> OrmResult<T>
where
    T: for<'a> FromSql<'a>,
{
    if idx >= row.len() {
        return Err(OrmError::decode(
            column,
            format!("column index {} out of range for row of {} columns", idx, row.len()),
        ));
    }
    row.try_get(idx)
        .map_err(|e| OrmError::decode(column, e.to_string()))
}
