//! Insert, update and delete for single entities.

use crate::client::GenericClient;
use crate::config::Config;
use crate::error::{OrmError, OrmResult, ResultExt};
use crate::mapper::{Entity, mapped_columns};
use crate::qb::{BuiltQuery, ParamList};
use crate::row::read_column;
use chrono::Utc;
use uuid::Uuid;

/// `INSERT INTO t (...) VALUES (...) RETURNING id`.
///
/// Every mapped column except `id` is written; a pre-assigned `id` is
/// appended as the last column.
pub fn build_insert<E: Entity>(entity: &E, config: &Config) -> BuiltQuery {
    let columns = mapped_columns::<E>(config);
    let mut params = ParamList::new();
    let mut names = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());

    for column in columns.iter().skip(1) {
        names.push(column.name);
        placeholders.push(format!("${}", params.push_param((column.read)(entity))));
    }
    if let Some(id) = entity.id() {
        names.push("id");
        placeholders.push(format!("${}", params.push(id)));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        E::TABLE,
        names.join(","),
        placeholders.join(",")
    );
    BuiltQuery { sql, params }
}

/// `UPDATE t SET col=$1,... WHERE id = $n`.
///
/// With `fields`, only columns whose field or column name is listed are
/// written. `id` is never written.
pub fn build_update<E: Entity>(entity: &E, config: &Config, fields: Option<&[&str]>) -> OrmResult<BuiltQuery> {
    let id = entity
        .id()
        .ok_or_else(|| OrmError::not_found(format!("{} row has no id", E::TABLE)))?;

    let mut params = ParamList::new();
    let mut sets = Vec::new();
    for column in mapped_columns::<E>(config).iter().skip(1) {
        if let Some(fields) = fields {
            if !fields.iter().any(|f| *f == column.field || *f == column.name) {
                continue;
            }
        }
        let idx = params.push_param((column.read)(entity));
        sets.push(format!("{}=${}", column.name, idx));
    }
    if sets.is_empty() {
        return Err(OrmError::validation(format!(
            "no mapped column of {} matches {:?}",
            E::TABLE,
            fields.unwrap_or_default()
        )));
    }

    let idx = params.push(id);
    let sql = format!("UPDATE {} SET {} WHERE id = ${}", E::TABLE, sets.join(","), idx);
    Ok(BuiltQuery { sql, params })
}

pub(crate) async fn save<E: Entity>(conn: &dyn GenericClient, config: &Config, entity: &mut E) -> OrmResult<()> {
    if entity.id().is_none() {
        return insert(conn, config, entity).await;
    }
    entity.meta_mut().updated_at = Some(Utc::now());
    update(conn, config, entity, None).await
}

pub(crate) async fn insert<E: Entity>(conn: &dyn GenericClient, config: &Config, entity: &mut E) -> OrmResult<()> {
    let now = Utc::now();
    let meta = entity.meta_mut();
    meta.created_at = now;
    meta.updated_at = Some(now);

    let built = build_insert(entity, config);
    config.before_query("insert", E::TABLE, &built);
    let row = conn
        .query_one(&built.sql, &built.params.as_refs())
        .await
        .op("insert")?;
    entity.meta_mut().id = read_column(&row, 0, "id").op("insert")?;
    Ok(())
}

pub(crate) async fn save_fields<E: Entity>(
    conn: &dyn GenericClient,
    config: &Config,
    entity: &mut E,
    fields: &[&str],
) -> OrmResult<()> {
    entity.meta_mut().updated_at = Some(Utc::now());
    update(conn, config, entity, Some(fields)).await
}

async fn update<E: Entity>(
    conn: &dyn GenericClient,
    config: &Config,
    entity: &E,
    fields: Option<&[&str]>,
) -> OrmResult<()> {
    let built = build_update(entity, config, fields).op("update")?;
    config.before_query("update", E::TABLE, &built);
    let affected = conn
        .execute(&built.sql, &built.params.as_refs())
        .await
        .op("update")?;
    if affected == 0 {
        return Err(OrmError::not_found(format!("no {} row with that id", E::TABLE)).context("update"));
    }
    Ok(())
}

/// Stamp `deleted_at`. Fails with Validation when soft delete is disabled,
/// since the column is then not mapped.
pub(crate) async fn soft_delete<E: Entity>(conn: &dyn GenericClient, config: &Config, id: Uuid) -> OrmResult<()> {
    if !config.soft_delete {
        return Err(OrmError::validation(format!(
            "soft delete is disabled; {} has no deleted_at column",
            E::TABLE
        ))
        .context("soft_delete"));
    }
    let mut params = ParamList::new();
    params.push(Utc::now());
    params.push(id);
    let built = BuiltQuery {
        sql: format!("UPDATE {} SET deleted_at=$1 WHERE id = $2", E::TABLE),
        params,
    };
    execute_by_id::<E>(conn, config, "soft_delete", built).await
}

pub(crate) async fn delete<E: Entity>(conn: &dyn GenericClient, config: &Config, id: Uuid) -> OrmResult<()> {
    let mut params = ParamList::new();
    params.push(id);
    let built = BuiltQuery {
        sql: format!("DELETE FROM {} WHERE id = $1", E::TABLE),
        params,
    };
    execute_by_id::<E>(conn, config, "delete", built).await
}

async fn execute_by_id<E: Entity>(
    conn: &dyn GenericClient,
    config: &Config,
    op: &'static str,
    built: BuiltQuery,
) -> OrmResult<()> {
    config.before_query(op, E::TABLE, &built);
    let affected = conn
        .execute(&built.sql, &built.params.as_refs())
        .await
        .op(op)?;
    if affected == 0 {
        return Err(OrmError::not_found(format!("no {} row with that id", E::TABLE)).context(op));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::Meta;
    use crate::testing::{Album, Contact, RecordingClient};

    fn contact() -> Contact {
        Contact {
            meta: Meta::with_id(Uuid::new_v4()),
            email: "prince@paisley.park".to_string(),
            phone: "555-1999".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn insert_skips_missing_id() {
        let album = Album {
            title: "Purple Rain".to_string(),
            release_year: 1984,
            ..Default::default()
        };
        let built = build_insert(&album, &Config::default());
        assert_eq!(
            built.sql,
            "INSERT INTO albums (created_at,updated_at,deleted_at,artist_id,title,year) VALUES ($1,$2,$3,$4,$5,$6) RETURNING id"
        );
        assert_eq!(built.params.len(), 6);
    }

    #[test]
    fn insert_appends_pre_assigned_id_last() {
        let album = Album {
            meta: Meta::with_id(Uuid::new_v4()),
            ..Default::default()
        };
        let config = Config::new().soft_delete(false);
        let built = build_insert(&album, &config);
        assert_eq!(
            built.sql,
            "INSERT INTO albums (created_at,updated_at,artist_id,title,year,id) VALUES ($1,$2,$3,$4,$5,$6) RETURNING id"
        );
    }

    #[test]
    fn full_update_covers_every_non_id_column() {
        let built = build_update(&contact(), &Config::default(), None).unwrap();
        assert_eq!(
            built.sql,
            "UPDATE contacts SET created_at=$1,updated_at=$2,deleted_at=$3,artist_id=$4,email=$5,phone=$6 WHERE id = $7"
        );
        assert_eq!(built.params.len(), 7);
    }

    #[test]
    fn partial_update_writes_only_listed_fields() {
        let mut c = contact();
        c.email = "new@paisley.park".to_string();
        c.phone = "555-2000".to_string();

        let built = build_update(&c, &Config::default(), Some(&["email"][..])).unwrap();
        assert_eq!(built.sql, "UPDATE contacts SET email=$1 WHERE id = $2");
        let rendered: Vec<String> = built.params.iter().map(|p| format!("{:?}", p.as_ref())).collect();
        assert_eq!(rendered[0], "\"new@paisley.park\"");
        assert_eq!(rendered[1], format!("{:?}", c.meta.id.unwrap()));
    }

    #[test]
    fn partial_update_never_writes_id() {
        let built = build_update(&contact(), &Config::default(), Some(&["id", "phone"][..])).unwrap();
        assert_eq!(built.sql, "UPDATE contacts SET phone=$1 WHERE id = $2");
    }

    #[test]
    fn partial_update_without_id_is_not_found() {
        let err = build_update(&Contact::default(), &Config::default(), Some(&["email"][..])).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn partial_update_matching_nothing_is_rejected() {
        let err = build_update(&contact(), &Config::default(), Some(&["nickname"][..])).unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let client = RecordingClient::new().affected(0);
        let mut c = contact();
        let err = save(&client, &Config::default(), &mut c).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("pgrel.update: "));
    }

    #[tokio::test]
    async fn save_stamps_updated_at() {
        let client = RecordingClient::new();
        let mut c = contact();
        assert!(c.meta.updated_at.is_none());
        save_fields(&client, &Config::default(), &mut c, &["email"]).await.unwrap();
        assert!(c.meta.updated_at.is_some());
        assert_eq!(client.calls()[0].0, "UPDATE contacts SET email=$1 WHERE id = $2");
    }

    #[tokio::test]
    async fn insert_failure_carries_operation() {
        let client = RecordingClient::new();
        let mut album = Album::default();
        let err = save(&client, &Config::default(), &mut album).await.unwrap_err();
        assert!(err.to_string().starts_with("pgrel.insert: "));
        assert!(album.meta.updated_at.is_some());
        assert_eq!(Some(album.meta.created_at), album.meta.updated_at);
    }

    #[tokio::test]
    async fn soft_and_hard_delete_target_one_id() {
        let client = RecordingClient::new();
        let id = Uuid::new_v4();
        soft_delete::<Contact>(&client, &Config::default(), id).await.unwrap();
        delete::<Contact>(&client, &Config::default(), id).await.unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].0, "UPDATE contacts SET deleted_at=$1 WHERE id = $2");
        assert_eq!(calls[1].0, "DELETE FROM contacts WHERE id = $1");
        assert_eq!(calls[1].1, vec![format!("{:?}", id)]);
    }

    #[tokio::test]
    async fn soft_delete_requires_soft_delete_mode() {
        let client = RecordingClient::new();
        let config = Config::new().soft_delete(false);
        let err = soft_delete::<Contact>(&client, &config, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err.root(), OrmError::Validation(_)));
        assert!(err.to_string().starts_with("pgrel.soft_delete: "));
        assert!(client.calls().is_empty());
    }
}
