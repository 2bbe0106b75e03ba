//! Relations between entity types and bulk (eager) loading.
//!
//! A [`Relation<F, T>`] binds an owning entity `F` to a target entity `T`:
//!
//! - `BelongsTo`: `F` holds `T`'s key (`albums.artist_id -> artists.id`)
//! - `HasMany`: `T` holds `F`'s key, any number of `T` per `F`
//! - `HasOne`: `T` holds `F`'s key, at most one `T` per `F`
//!
//! Results are cached per owner in a [`RelationData`] field. [`Relation::load`]
//! resolves a whole slice of owners with one query; [`Relation::get`] and
//! friends read the cache when it is populated and query otherwise. Only
//! [`Relation::unload`] clears a cache.

use crate::client::GenericClient;
use crate::config::Config;
use crate::error::{OrmError, OrmResult, ResultExt};
use crate::mapper::{Entity, column_for_field};
use crate::qb::{Join, JoinKind, Order, Query};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// Per-owner relation cache.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationData<T> {
    pub loaded: bool,
    pub data: Vec<T>,
}

impl<T> Default for RelationData<T> {
    fn default() -> Self {
        Self {
            loaded: false,
            data: Vec::new(),
        }
    }
}

impl<T> RelationData<T> {
    pub fn loaded(data: Vec<T>) -> Self {
        Self { loaded: true, data }
    }
}

/// Values usable as a foreign key field.
pub trait ForeignKey {
    fn key(&self) -> Option<Uuid>;
}

impl ForeignKey for Uuid {
    fn key(&self) -> Option<Uuid> {
        Some(*self)
    }
}

impl ForeignKey for Option<Uuid> {
    fn key(&self) -> Option<Uuid> {
        *self
    }
}

/// Which side carries the foreign key column.
pub enum RelationKind<F, T> {
    /// `F.foreign_key = T.id`
    BelongsTo {
        foreign_key: &'static str,
        key: fn(&F) -> Option<Uuid>,
    },
    /// `T.foreign_key = F.id`, many targets per owner.
    HasMany {
        foreign_key: &'static str,
        key: fn(&T) -> Option<Uuid>,
    },
    /// `T.foreign_key = F.id`, one target per owner.
    HasOne {
        foreign_key: &'static str,
        key: fn(&T) -> Option<Uuid>,
    },
}

impl<F, T> Clone for RelationKind<F, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F, T> Copy for RelationKind<F, T> {}

impl<F, T> std::fmt::Debug for RelationKind<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, fk) = match self {
            Self::BelongsTo { foreign_key, .. } => ("BelongsTo", foreign_key),
            Self::HasMany { foreign_key, .. } => ("HasMany", foreign_key),
            Self::HasOne { foreign_key, .. } => ("HasOne", foreign_key),
        };
        f.debug_struct(kind).field("foreign_key", fk).finish()
    }
}

impl<F: Entity, T: Entity> RelationKind<F, T> {
    /// Key taken from the owner.
    pub fn local_key(&self, owner: &F) -> Option<Uuid> {
        match self {
            Self::BelongsTo { key, .. } => key(owner),
            Self::HasMany { .. } | Self::HasOne { .. } => owner.id(),
        }
    }

    /// Key a target is grouped under.
    pub fn group_key(&self, target: &T) -> Option<Uuid> {
        match self {
            Self::BelongsTo { .. } => target.id(),
            Self::HasMany { key, .. } | Self::HasOne { key, .. } => key(target),
        }
    }

    /// Target column compared against the owner keys.
    pub fn query_column(&self) -> &'static str {
        match self {
            Self::BelongsTo { .. } => "id",
            Self::HasMany { foreign_key, .. } | Self::HasOne { foreign_key, .. } => *foreign_key,
        }
    }

    /// `(owner column, target column)` for join conditions.
    pub fn join_columns(&self) -> (&'static str, &'static str) {
        match self {
            Self::BelongsTo { foreign_key, .. } => (*foreign_key, "id"),
            Self::HasMany { foreign_key, .. } | Self::HasOne { foreign_key, .. } => ("id", *foreign_key),
        }
    }

    fn single(&self) -> bool {
        !matches!(self, Self::HasMany { .. })
    }
}

/// A relation from `F` to `T`, plus caller refinements on the target query.
pub struct Relation<F: Entity, T: Entity> {
    kind: RelationKind<F, T>,
    slot: fn(&F) -> &RelationData<T>,
    slot_mut: fn(&mut F) -> &mut RelationData<T>,
    refine: Query<T>,
}

impl<F: Entity, T: Entity> Clone for Relation<F, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            slot: self.slot,
            slot_mut: self.slot_mut,
            refine: self.refine.clone(),
        }
    }
}

impl<F: Entity, T: Entity> std::fmt::Debug for Relation<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("owner", &F::TABLE)
            .field("target", &T::TABLE)
            .field("kind", &self.kind)
            .field("refine", &self.refine)
            .finish()
    }
}

impl<F: Entity, T: Entity> Relation<F, T> {
    /// `F.field` references `T.id`.
    ///
    /// # Panics
    ///
    /// When `F` maps no such field.
    pub fn belongs_to(
        field: &str,
        key: fn(&F) -> Option<Uuid>,
        slot: fn(&F) -> &RelationData<T>,
        slot_mut: fn(&mut F) -> &mut RelationData<T>,
    ) -> Self {
        let foreign_key = column_for_field::<F>(field).name;
        Self::from_kind(RelationKind::BelongsTo { foreign_key, key }, slot, slot_mut)
    }

    /// `T.field` references `F.id`, many per owner.
    ///
    /// # Panics
    ///
    /// When `T` maps no such field.
    pub fn has_many(
        field: &str,
        key: fn(&T) -> Option<Uuid>,
        slot: fn(&F) -> &RelationData<T>,
        slot_mut: fn(&mut F) -> &mut RelationData<T>,
    ) -> Self {
        let foreign_key = column_for_field::<T>(field).name;
        Self::from_kind(RelationKind::HasMany { foreign_key, key }, slot, slot_mut)
    }

    /// `T.field` references `F.id`, one per owner.
    ///
    /// # Panics
    ///
    /// When `T` maps no such field.
    pub fn has_one(
        field: &str,
        key: fn(&T) -> Option<Uuid>,
        slot: fn(&F) -> &RelationData<T>,
        slot_mut: fn(&mut F) -> &mut RelationData<T>,
    ) -> Self {
        let foreign_key = column_for_field::<T>(field).name;
        Self::from_kind(RelationKind::HasOne { foreign_key, key }, slot, slot_mut)
    }

    fn from_kind(
        kind: RelationKind<F, T>,
        slot: fn(&F) -> &RelationData<T>,
        slot_mut: fn(&mut F) -> &mut RelationData<T>,
    ) -> Self {
        Self {
            kind,
            slot,
            slot_mut,
            refine: Query::new(),
        }
    }

    pub fn kind(&self) -> &RelationKind<F, T> {
        &self.kind
    }

    // ==================== refinement ====================

    pub fn filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.refine = self.refine.filter(column, op, value);
        self
    }

    pub fn or_filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.refine = self.refine.or_filter(column, op, value);
        self
    }

    pub fn filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        self.refine = self.refine.filter_group(f);
        self
    }

    pub fn or_filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        self.refine = self.refine.or_filter_group(f);
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.refine = self.refine.order_by(column, order);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.refine = self.refine.with_deleted();
        self
    }

    /// LIMIT for lazy `get`/`first`/`find` on one owner. Bulk loads reject it.
    pub fn take(mut self, n: i64) -> Self {
        self.refine = self.refine.take(n);
        self
    }

    /// OFFSET for lazy access on one owner. Bulk loads reject it.
    pub fn skip(mut self, n: i64) -> Self {
        self.refine = self.refine.skip(n);
        self
    }

    /// Eager-load a nested relation on the targets.
    pub fn with(mut self, relation: impl EagerLoad<T> + 'static) -> Self {
        self.refine = self.refine.with(relation);
        self
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.refine = self.refine.config(config);
        self
    }

    fn qualified_query_column(&self) -> String {
        format!("{}.{}", T::TABLE, self.kind.query_column())
    }

    // ==================== joins ====================

    /// Join condition `owner.col = target.col` for use in `Query::join`.
    pub fn join(&self, kind: JoinKind) -> Join {
        let (owner_col, target_col) = self.kind.join_columns();
        Join::new(kind, T::TABLE).on(
            &format!("{}.{}", F::TABLE, owner_col),
            "=",
            &format!("{}.{}", T::TABLE, target_col),
        )
    }

    // ==================== cache ====================

    pub fn loaded(&self, owner: &F) -> bool {
        (self.slot)(owner).loaded
    }

    /// Clear the owner's cache.
    pub fn unload(&self, owner: &mut F) {
        *(self.slot_mut)(owner) = RelationData::default();
    }

    /// Bulk-load the relation for every owner with one query.
    pub async fn load(&self, conn: &dyn GenericClient, owners: &mut [F]) -> OrmResult<()>
    where
        T: Clone,
    {
        self.load_with(conn, self.refine.config_ref(), owners).await
    }

    async fn load_with(&self, conn: &dyn GenericClient, config: &Arc<Config>, owners: &mut [F]) -> OrmResult<()>
    where
        T: Clone,
    {
        // One statement serves every owner, so a row cap would starve some of them.
        if self.refine.is_paginated() {
            return Err(OrmError::validation(format!(
                "take/skip on the {} relation apply to one owner; bulk loads cannot paginate",
                T::TABLE
            ))
            .context("load"));
        }

        let keys = candidate_keys(&self.kind, owners);
        if keys.is_empty() {
            tracing::trace!(owner = F::TABLE, target = T::TABLE, "no keys, skipping relation query");
            for owner in owners.iter_mut() {
                *(self.slot_mut)(owner) = RelationData::loaded(Vec::new());
            }
            return Ok(());
        }

        // Key predicate first, then the refinement as one AND group.
        let targets = Query::new()
            .config(config.clone())
            .filter_in(&self.qualified_query_column(), keys)
            .merge(&self.refine)
            .get(conn)
            .await
            .op("load")?;

        distribute(&self.kind, owners, targets, self.slot_mut);
        Ok(())
    }

    // ==================== lazy access ====================

    fn owner_query(&self, owner: &F) -> Option<Query<T>> {
        let key = self.kind.local_key(owner)?;
        Some(
            Query::new()
                .config(self.refine.config_ref().clone())
                .eq(&self.qualified_query_column(), key)
                .merge(&self.refine),
        )
    }

    /// Related rows for one owner: the cache if loaded, otherwise one query.
    pub async fn get(&self, conn: &dyn GenericClient, owner: &F) -> OrmResult<Vec<T>>
    where
        T: Clone,
    {
        let cache = (self.slot)(owner);
        if cache.loaded {
            return Ok(cache.data.clone());
        }
        match self.owner_query(owner) {
            Some(query) => query.get(conn).await,
            None => Ok(Vec::new()),
        }
    }

    /// First related row; Not-found when there is none.
    pub async fn first(&self, conn: &dyn GenericClient, owner: &F) -> OrmResult<T>
    where
        T: Clone,
    {
        let cache = (self.slot)(owner);
        if cache.loaded {
            return cache
                .data
                .first()
                .cloned()
                .ok_or_else(|| OrmError::not_found(format!("no row in {}", T::TABLE)).context("first"));
        }
        match self.owner_query(owner) {
            Some(query) => query.first(conn).await,
            None => Err(OrmError::not_found(format!("{} has no key", F::TABLE)).context("first")),
        }
    }

    /// Exactly one related row; Not-found on zero or several.
    pub async fn find(&self, conn: &dyn GenericClient, owner: &F) -> OrmResult<T>
    where
        T: Clone,
    {
        let cache = (self.slot)(owner);
        if cache.loaded {
            return match cache.data.as_slice() {
                [one] => Ok(one.clone()),
                rows => Err(OrmError::not_found(format!(
                    "expected exactly one row in {}, got {}",
                    T::TABLE,
                    rows.len()
                ))
                .context("find")),
            };
        }
        match self.owner_query(owner) {
            Some(query) => query.find(conn).await,
            None => Err(OrmError::not_found(format!("{} has no key", F::TABLE)).context("find")),
        }
    }

    pub async fn must_get(&self, conn: &dyn GenericClient, owner: &F) -> Vec<T>
    where
        T: Clone,
    {
        self.get(conn, owner).await.unwrap_or_else(|e| panic!("{}", e))
    }

    pub async fn must_first(&self, conn: &dyn GenericClient, owner: &F) -> T
    where
        T: Clone,
    {
        self.first(conn, owner).await.unwrap_or_else(|e| panic!("{}", e))
    }

    pub async fn must_find(&self, conn: &dyn GenericClient, owner: &F) -> T
    where
        T: Clone,
    {
        self.find(conn, owner).await.unwrap_or_else(|e| panic!("{}", e))
    }
}

/// Owner keys in first-seen order, without duplicates.
fn candidate_keys<F: Entity, T: Entity>(kind: &RelationKind<F, T>, owners: &[F]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    owners
        .iter()
        .filter_map(|owner| kind.local_key(owner))
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Group `targets` by key and store each owner's group in its cache.
///
/// Owners without a key, or without matching targets, get an empty loaded cache.
pub(crate) fn distribute<F: Entity, T: Entity + Clone>(
    kind: &RelationKind<F, T>,
    owners: &mut [F],
    targets: Vec<T>,
    slot_mut: fn(&mut F) -> &mut RelationData<T>,
) {
    let mut groups: HashMap<Uuid, Vec<T>> = HashMap::new();
    for target in targets {
        let Some(key) = kind.group_key(&target) else { continue };
        let group = groups.entry(key).or_default();
        if kind.single() && !group.is_empty() {
            continue;
        }
        group.push(target);
    }

    for owner in owners.iter_mut() {
        let data = kind
            .local_key(owner)
            .and_then(|key| groups.get(&key).cloned())
            .unwrap_or_default();
        *slot_mut(owner) = RelationData::loaded(data);
    }
}

/// A post-fetch hook run by [`Query::with`] over the full result set.
#[async_trait::async_trait]
pub trait EagerLoad<F>: Send + Sync {
    async fn load(&self, conn: &dyn GenericClient, config: &Arc<Config>, owners: &mut [F]) -> OrmResult<()>;
}

#[async_trait::async_trait]
impl<F: Entity, T: Entity + Clone> EagerLoad<F> for Relation<F, T> {
    async fn load(&self, conn: &dyn GenericClient, config: &Arc<Config>, owners: &mut [F]) -> OrmResult<()> {
        self.load_with(conn, config, owners).await
    }
}
