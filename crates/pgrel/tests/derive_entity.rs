//! Generated column tables and relations, checked through the statements
//! they produce. No database needed.

#![allow(dead_code)]

use pgrel::qb::{JoinKind, Order};
use pgrel::tokio_postgres::Row;
use pgrel::tokio_postgres::types::ToSql;
use pgrel::{
    Config, Entity, FromRow, GenericClient, Meta, OrmResult, Query, RelationData, Uuid,
    build_insert, build_update, column_for_field,
};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "artists")]
struct Artist {
    meta: Meta,
    name: String,
    #[orm(has_many = "artist_id")]
    albums: RelationData<Album>,
    #[orm(has_one = "artist_id")]
    contact: RelationData<Contact>,
}

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "albums")]
struct Album {
    meta: Meta,
    artist_id: Option<Uuid>,
    title: String,
    #[orm(column = "year")]
    release_year: i32,
    #[orm(skip)]
    play_count: u32,
    #[orm(belongs_to = "artist_id")]
    artist: RelationData<Artist>,
}

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "contacts")]
struct Contact {
    meta: pgrel::Meta,
    artist_id: Uuid,
    email: String,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Default, Entity)]
struct RecordLabel {
    meta: Meta,
    LabelName: String,
    HQCountry: String,
}

#[derive(Debug, FromRow)]
struct AlbumCount {
    name: String,
    #[orm(column = "count")]
    albums: i64,
}

/// Records statements; every query returns no rows.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, usize)>>,
}

impl Recorder {
    fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenericClient for Recorder {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        self.calls.lock().unwrap().push((sql.to_string(), params.len()));
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.calls.lock().unwrap().push((sql.to_string(), params.len()));
        Ok(1)
    }
}

fn names<E: Entity>() -> Vec<&'static str> {
    E::COLUMNS.iter().map(|c| c.name).collect()
}

fn with_id<E: Entity>(mut e: E) -> E {
    e.meta_mut().id = Some(Uuid::new_v4());
    e
}

#[test]
fn columns_follow_declaration_order() {
    assert_eq!(Album::TABLE, "albums");
    assert_eq!(
        names::<Album>(),
        vec!["id", "created_at", "updated_at", "deleted_at", "artist_id", "title", "year"]
    );
    assert_eq!(names::<Artist>().last(), Some(&"name"));
}

#[test]
fn default_table_and_column_names() {
    assert_eq!(RecordLabel::TABLE, "record_label");
    assert_eq!(&names::<RecordLabel>()[4..], &["label_name", "hq_country"]);
}

#[test]
fn field_lookup_accepts_field_or_column() {
    assert_eq!(column_for_field::<Album>("release_year").name, "year");
    assert_eq!(column_for_field::<Album>("year").field, "release_year");
}

#[test]
#[should_panic(expected = "has no mapped field `play_count`")]
fn skipped_field_is_not_mapped() {
    column_for_field::<Album>("play_count");
}

#[test]
fn select_uses_generated_columns() {
    let sql = pgrel::query::<Album>()
        .eq("title", "Purple Rain")
        .order_by("year", Order::Desc)
        .to_sql();
    assert_eq!(
        sql,
        "SELECT albums.id, albums.created_at, albums.updated_at, albums.deleted_at, albums.artist_id, albums.title, albums.year FROM albums WHERE (albums.deleted_at IS NULL) AND (title = $1) ORDER BY year desc"
    );
}

#[test]
fn relation_joins_render_both_directions() {
    let sql = Query::<Album>::new()
        .join(Album::artist().join(JoinKind::Inner))
        .to_sql();
    assert!(sql.contains("INNER JOIN artists ON albums.artist_id = artists.id AND artists.deleted_at IS NULL"));

    let sql = Query::<Artist>::new()
        .join(Artist::albums().join(JoinKind::Left))
        .to_sql();
    assert!(sql.contains("LEFT JOIN albums ON artists.id = albums.artist_id"));
}

#[test]
fn writes_use_generated_columns() {
    let config = Config::default();
    let album = Album {
        title: "Sign o' the Times".into(),
        release_year: 1987,
        play_count: 42,
        ..Default::default()
    };
    let built = build_insert(&album, &config);
    assert_eq!(
        built.sql,
        "INSERT INTO albums (created_at,updated_at,deleted_at,artist_id,title,year) VALUES ($1,$2,$3,$4,$5,$6) RETURNING id"
    );

    let built = build_update(&with_id(album), &config, Some(&["release_year"][..])).unwrap();
    assert_eq!(built.sql, "UPDATE albums SET year=$1 WHERE id = $2");
}

#[tokio::test]
async fn eager_loading_is_one_query_per_relation() {
    let client = Recorder::default();
    let mut artists = vec![with_id(Artist::default()), with_id(Artist::default())];

    Artist::albums().load(&client, &mut artists).await.unwrap();
    Artist::contact().load(&client, &mut artists).await.unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].0.ends_with("FROM albums WHERE (albums.deleted_at IS NULL) AND (albums.artist_id IN ($1,$2))"));
    assert!(calls[1].0.ends_with("FROM contacts WHERE (contacts.deleted_at IS NULL) AND (contacts.artist_id IN ($1,$2))"));
    assert!(artists.iter().all(|a| a.albums.loaded && a.contact.loaded));
}

#[tokio::test]
async fn belongs_to_without_keys_skips_the_query() {
    let client = Recorder::default();
    let mut albums = vec![Album::default()];
    Album::artist().load(&client, &mut albums).await.unwrap();
    assert!(client.calls().is_empty());
    assert!(albums[0].artist.loaded);
}

#[tokio::test]
async fn query_with_eager_relation_and_projection() {
    let client = Recorder::default();
    let artists = pgrel::query::<Artist>()
        .with(Artist::albums())
        .get(&client)
        .await
        .unwrap();
    assert!(artists.is_empty());
    // No owners, so the relation never runs.
    assert_eq!(client.calls().len(), 1);

    let counts: Vec<AlbumCount> = pgrel::query::<Artist>()
        .join(Artist::albums().join(JoinKind::Inner))
        .project(&["artists.name", "count(*)"])
        .group_by("artists.name")
        .fetch_as(&client)
        .await
        .unwrap();
    assert!(counts.is_empty());
    assert!(client.calls()[1].0.ends_with("GROUP BY artists.name"));
}
