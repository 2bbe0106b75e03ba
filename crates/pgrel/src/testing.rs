//! Test fixtures: hand-mapped entities and a client that records statements.

use crate::client::GenericClient;
use crate::error::OrmResult;
use crate::mapper::{Column, Entity, Meta};
use crate::qb::Param;
use crate::relation::{Relation, RelationData};
use crate::row::read_column;
use std::sync::Mutex;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// Records every statement; queries return no rows.
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    affected: u64,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            affected: 1,
        }
    }

    /// Row count reported by `execute`.
    pub(crate) fn affected(mut self, n: u64) -> Self {
        self.affected = n;
        self
    }

    /// `(sql, debug-rendered params)` per call, in order.
    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) {
        let params = params.iter().map(|p| format!("{:?}", p)).collect();
        self.calls.lock().unwrap().push((sql.to_string(), params));
    }
}

#[async_trait::async_trait]
impl GenericClient for RecordingClient {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        self.record(sql, params);
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.record(sql, params);
        Ok(self.affected)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Artist {
    pub meta: Meta,
    pub name: String,
    pub albums: RelationData<Album>,
    pub contact: RelationData<Contact>,
}

impl Entity for Artist {
    const TABLE: &'static str = "artists";
    const COLUMNS: &'static [Column<Self>] = &[
        Column::<Self>::ID,
        Column::<Self>::CREATED_AT,
        Column::<Self>::UPDATED_AT,
        Column::<Self>::DELETED_AT,
        Column {
            name: "name",
            field: "name",
            read: |e| Param::new(e.name.clone()),
            write: |e, row, idx| {
                e.name = read_column(row, idx, "name")?;
                Ok(())
            },
        },
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl Artist {
    pub fn albums() -> Relation<Self, Album> {
        Relation::has_many("artist_id", |a| a.artist_id, |s| &s.albums, |s| &mut s.albums)
    }

    pub fn contact() -> Relation<Self, Contact> {
        Relation::has_one("artist_id", |c| c.artist_id, |s| &s.contact, |s| &mut s.contact)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Album {
    pub meta: Meta,
    pub artist_id: Option<Uuid>,
    pub title: String,
    pub release_year: i32,
    pub artist: RelationData<Artist>,
}

impl Entity for Album {
    const TABLE: &'static str = "albums";
    const COLUMNS: &'static [Column<Self>] = &[
        Column::<Self>::ID,
        Column::<Self>::CREATED_AT,
        Column::<Self>::UPDATED_AT,
        Column::<Self>::DELETED_AT,
        Column {
            name: "artist_id",
            field: "artist_id",
            read: |e| Param::new(e.artist_id),
            write: |e, row, idx| {
                e.artist_id = read_column(row, idx, "artist_id")?;
                Ok(())
            },
        },
        Column {
            name: "title",
            field: "title",
            read: |e| Param::new(e.title.clone()),
            write: |e, row, idx| {
                e.title = read_column(row, idx, "title")?;
                Ok(())
            },
        },
        Column {
            name: "year",
            field: "release_year",
            read: |e| Param::new(e.release_year),
            write: |e, row, idx| {
                e.release_year = read_column(row, idx, "year")?;
                Ok(())
            },
        },
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl Album {
    pub fn artist() -> Relation<Self, Artist> {
        Relation::belongs_to("artist_id", |a| a.artist_id, |s| &s.artist, |s| &mut s.artist)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Contact {
    pub meta: Meta,
    pub artist_id: Option<Uuid>,
    pub email: String,
    pub phone: String,
}

impl Entity for Contact {
    const TABLE: &'static str = "contacts";
    const COLUMNS: &'static [Column<Self>] = &[
        Column::<Self>::ID,
        Column::<Self>::CREATED_AT,
        Column::<Self>::UPDATED_AT,
        Column::<Self>::DELETED_AT,
        Column {
            name: "artist_id",
            field: "artist_id",
            read: |e| Param::new(e.artist_id),
            write: |e, row, idx| {
                e.artist_id = read_column(row, idx, "artist_id")?;
                Ok(())
            },
        },
        Column {
            name: "email",
            field: "email",
            read: |e| Param::new(e.email.clone()),
            write: |e, row, idx| {
                e.email = read_column(row, idx, "email")?;
                Ok(())
            },
        },
        Column {
            name: "phone",
            field: "phone",
            read: |e| Param::new(e.phone.clone()),
            write: |e, row, idx| {
                e.phone = read_column(row, idx, "phone")?;
                Ok(())
            },
        },
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl Contact {
    pub fn for_artist(artist: &Artist, email: &str) -> Self {
        Self {
            meta: Meta::with_id(Uuid::new_v4()),
            artist_id: artist.id(),
            email: email.to_string(),
            ..Default::default()
        }
    }
}
