//! Injected configuration and the engine handle.

use crate::client::GenericClient;
use crate::error::OrmResult;
use crate::hook::{NoopHook, QueryContext, QueryHook, TracingSqlHook};
use crate::mapper::Entity;
use crate::persist;
use crate::qb::{BuiltQuery, Query, UpdateQuery};
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

/// Settings shared by every builder and persistence call.
///
/// Built once, wrapped in `Arc` and treated as read-only afterwards. The
/// serializable part (`soft_delete`) can be loaded from application config;
/// the hook is always set in code.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inject `<table>.deleted_at IS NULL` into reads and updates, and map the
    /// `deleted_at` column.
    pub soft_delete: bool,

    /// Receives every compiled statement before execution.
    #[serde(skip, default = "default_hook")]
    pub hook: Arc<dyn QueryHook>,
}

fn default_hook() -> Arc<dyn QueryHook> {
    Arc::new(TracingSqlHook::default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soft_delete: true,
            hook: default_hook(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("soft_delete", &self.soft_delete)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete = enabled;
        self
    }

    pub fn hook(mut self, hook: impl QueryHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    pub fn without_hook(mut self) -> Self {
        self.hook = Arc::new(NoopHook);
        self
    }

    pub(crate) fn before_query(&self, op: &'static str, table: &'static str, built: &BuiltQuery) {
        self.hook
            .before_query(&QueryContext::new(op, table, &built.sql, &built.params));
    }
}

static DEFAULT_CONFIG: LazyLock<Arc<Config>> = LazyLock::new(|| Arc::new(Config::default()));

/// Shared default configuration used by the free functions.
pub(crate) fn default_config() -> Arc<Config> {
    DEFAULT_CONFIG.clone()
}

/// Engine handle bound to one configuration.
///
/// ```ignore
/// let orm = pgrel::Orm::new(pgrel::Config::new().soft_delete(false));
/// let mut artist = Artist { name: "Prince".into(), ..Default::default() };
/// orm.save(&client, &mut artist).await?;
/// let found = orm.query::<Artist>().eq("name", "Prince").find(&client).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Orm {
    config: Arc<Config>,
}

impl Default for Orm {
    fn default() -> Self {
        Self {
            config: default_config(),
        }
    }
}

impl Orm {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_arc(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Start a read query for `T`.
    pub fn query<T: Entity>(&self) -> Query<T> {
        Query::new().config(self.config.clone())
    }

    /// Start a bulk `UPDATE ... SET` for `T`.
    pub fn update<T: Entity>(&self) -> UpdateQuery<T> {
        UpdateQuery::new().config(self.config.clone())
    }

    /// Insert when the entity has no identifier, otherwise update every column.
    pub async fn save<E: Entity>(&self, conn: &dyn GenericClient, entity: &mut E) -> OrmResult<()> {
        persist::save(conn, &self.config, entity).await
    }

    /// Always insert, keeping a pre-assigned identifier if there is one.
    pub async fn insert<E: Entity>(&self, conn: &dyn GenericClient, entity: &mut E) -> OrmResult<()> {
        persist::insert(conn, &self.config, entity).await
    }

    /// Update only the listed fields (Rust field or column names).
    pub async fn save_fields<E: Entity>(
        &self,
        conn: &dyn GenericClient,
        entity: &mut E,
        fields: &[&str],
    ) -> OrmResult<()> {
        persist::save_fields(conn, &self.config, entity, fields).await
    }

    /// Stamp `deleted_at` on the row with this identifier.
    pub async fn soft_delete<E: Entity>(&self, conn: &dyn GenericClient, id: Uuid) -> OrmResult<()> {
        persist::soft_delete::<E>(conn, &self.config, id).await
    }

    /// Physically delete the row with this identifier.
    pub async fn delete<E: Entity>(&self, conn: &dyn GenericClient, id: Uuid) -> OrmResult<()> {
        persist::delete::<E>(conn, &self.config, id).await
    }
}
