//! Entity read queries.

use crate::client::GenericClient;
use crate::config::{Config, default_config};
use crate::error::{OrmError, OrmResult, ResultExt};
use crate::mapper::{self, Entity};
use crate::qb::BuiltQuery;
use crate::qb::expr::{Connective, Filters, Join, Node, compile};
use crate::qb::param::ParamList;
use crate::relation::EagerLoad;
use crate::row::FromRow;
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// Decoder for rows produced by a custom projection.
pub type Decoder<T> = Arc<dyn Fn(&Row) -> OrmResult<T> + Send + Sync>;

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

struct Projection<T> {
    columns: Vec<String>,
    decode: Option<Decoder<T>>,
}

impl<T> Clone for Projection<T> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            decode: self.decode.clone(),
        }
    }
}

/// SELECT builder for one entity type.
///
/// Configuration calls consume and return the builder. Nothing is validated
/// until the statement is compiled, and compiling never touches the builder,
/// so the same `Query` can be executed any number of times.
///
/// ```ignore
/// let artists = pgrel::query::<Artist>()
///     .eq("name", "Prince")
///     .or_filter("name", "=", "Queen")
///     .order_by("name", Order::Asc)
///     .with(Artist::albums())
///     .get(&client)
///     .await?;
/// ```
pub struct Query<T: Entity> {
    config: Arc<Config>,
    filters: Filters,
    having: Filters,
    joins: Vec<Join>,
    orders: Vec<(String, Order)>,
    projection: Option<Projection<T>>,
    group_by: Vec<String>,
    limit: i64,
    offset: i64,
    with_deleted: bool,
    eager: Vec<Arc<dyn EagerLoad<T>>>,
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            filters: self.filters.clone(),
            having: self.having.clone(),
            joins: self.joins.clone(),
            orders: self.orders.clone(),
            projection: self.projection.clone(),
            group_by: self.group_by.clone(),
            limit: self.limit,
            offset: self.offset,
            with_deleted: self.with_deleted,
            eager: self.eager.clone(),
        }
    }
}

impl<T: Entity> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &T::TABLE)
            .field("filters", &self.filters)
            .field("having", &self.having)
            .field("joins", &self.joins)
            .field("orders", &self.orders)
            .field("group_by", &self.group_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("with_deleted", &self.with_deleted)
            .field("eager", &self.eager.len())
            .finish()
    }
}

impl<T: Entity> Query<T> {
    /// Empty query using the default configuration.
    pub fn new() -> Self {
        Self {
            config: default_config(),
            filters: Filters::new(),
            having: Filters::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            projection: None,
            group_by: Vec::new(),
            limit: 0,
            offset: 0,
            with_deleted: false,
            eager: Vec::new(),
        }
    }

    /// Use `config` for compilation and execution.
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn config_ref(&self) -> &Arc<Config> {
        &self.config
    }

    // ==================== WHERE ====================

    /// AND `column op $n`.
    pub fn filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.filters.compare(Connective::And, column, op, value);
        self
    }

    /// OR `column op $n`.
    pub fn or_filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.filters.compare(Connective::Or, column, op, value);
        self
    }

    /// AND a parenthesized group built by `f` on a fresh query.
    pub fn filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(self.blank()).filters;
        self.filters.nest(Connective::And, group);
        self
    }

    /// OR a parenthesized group built by `f` on a fresh query.
    pub fn or_filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(self.blank()).filters;
        self.filters.nest(Connective::Or, group);
        self
    }

    /// AND `column IN (...)`.
    pub fn filter_in<V: ToSql + Send + Sync + 'static>(mut self, column: &str, values: Vec<V>) -> Self {
        self.filters.in_list(Connective::And, column, values);
        self
    }

    /// OR `column IN (...)`.
    pub fn or_filter_in<V: ToSql + Send + Sync + 'static>(mut self, column: &str, values: Vec<V>) -> Self {
        self.filters.in_list(Connective::Or, column, values);
        self
    }

    /// AND `column IS NULL`.
    pub fn filter_null(mut self, column: &str) -> Self {
        self.filters.is_null(Connective::And, column);
        self
    }

    /// AND `column op rhs`, with `rhs` rendered verbatim. Column references only.
    pub fn filter_raw(mut self, column: &str, op: &str, rhs: &str) -> Self {
        self.filters.raw(Connective::And, column, op, rhs);
        self
    }

    /// AND column = value
    pub fn eq<V: ToSql + Send + Sync + 'static>(self, column: &str, value: V) -> Self {
        self.filter(column, "=", value)
    }

    /// AND column != value
    pub fn ne<V: ToSql + Send + Sync + 'static>(self, column: &str, value: V) -> Self {
        self.filter(column, "!=", value)
    }

    /// AND column > value
    pub fn gt<V: ToSql + Send + Sync + 'static>(self, column: &str, value: V) -> Self {
        self.filter(column, ">", value)
    }

    /// AND column < value
    pub fn lt<V: ToSql + Send + Sync + 'static>(self, column: &str, value: V) -> Self {
        self.filter(column, "<", value)
    }

    /// AND column LIKE pattern
    pub fn like<V: ToSql + Send + Sync + 'static>(self, column: &str, pattern: V) -> Self {
        self.filter(column, "LIKE", pattern)
    }

    /// AND column ILIKE pattern
    pub fn ilike<V: ToSql + Send + Sync + 'static>(self, column: &str, pattern: V) -> Self {
        self.filter(column, "ILIKE", pattern)
    }

    // ==================== HAVING ====================

    pub fn having<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.having.compare(Connective::And, column, op, value);
        self
    }

    pub fn or_having<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.having.compare(Connective::Or, column, op, value);
        self
    }

    /// AND a HAVING group; `f` populates the group through the filter methods.
    pub fn having_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(self.blank()).filters;
        self.having.nest(Connective::And, group);
        self
    }

    pub fn or_having_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(self.blank()).filters;
        self.having.nest(Connective::Or, group);
        self
    }

    // ==================== shape ====================

    /// Append a join. Relations render one through `Relation::join`.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Replace the projection and decode rows with `decode`.
    ///
    /// Only the first call takes effect; later calls are logged and ignored.
    pub fn select<F>(mut self, columns: &[&str], decode: F) -> Self
    where
        F: Fn(&Row) -> OrmResult<T> + Send + Sync + 'static,
    {
        self.set_projection(columns, Some(Arc::new(decode)));
        self
    }

    /// Replace the projection for use with [`Query::fetch_as`].
    ///
    /// Shares the first-write policy of [`Query::select`].
    pub fn project(mut self, columns: &[&str]) -> Self {
        self.set_projection(columns, None);
        self
    }

    fn set_projection(&mut self, columns: &[&str], decode: Option<Decoder<T>>) {
        if let Some(existing) = &self.projection {
            tracing::warn!(
                table = T::TABLE,
                existing = ?existing.columns,
                ignored = ?columns,
                "projection already set, ignoring"
            );
            return;
        }
        self.projection = Some(Projection {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            decode,
        });
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.orders.push((column.to_string(), order));
        self
    }

    /// LIMIT; zero or negative means none.
    pub fn take(mut self, n: i64) -> Self {
        self.limit = n;
        self
    }

    /// OFFSET; zero or negative means none.
    pub fn skip(mut self, n: i64) -> Self {
        self.offset = n;
        self
    }

    /// GROUP BY column. Ignored unless a custom projection is set.
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Eager-load `relation` for every row this query returns.
    pub fn with(mut self, relation: impl EagerLoad<T> + 'static) -> Self {
        self.eager.push(Arc::new(relation));
        self
    }

    fn blank(&self) -> Query<T> {
        Query::new().config(self.config.clone())
    }

    /// The accumulated WHERE filters.
    pub(crate) fn into_filters(self) -> Filters {
        self.filters
    }

    /// True when `take` or `skip` was set.
    pub(crate) fn is_paginated(&self) -> bool {
        self.limit > 0 || self.offset > 0
    }

    /// Fold a relation refinement into this query as a nested AND group,
    /// taking over its ordering, joins, soft-delete mode, eager loads and
    /// any `take`/`skip` this query does not set itself.
    pub(crate) fn merge(mut self, refine: &Query<T>) -> Self {
        self.filters.nest(Connective::And, refine.filters.clone());
        self.joins.extend(refine.joins.iter().cloned());
        self.orders.extend(refine.orders.iter().cloned());
        self.eager.extend(refine.eager.iter().cloned());
        self.with_deleted |= refine.with_deleted;
        if self.limit <= 0 {
            self.limit = refine.limit;
        }
        if self.offset <= 0 {
            self.offset = refine.offset;
        }
        self
    }

    /// Fails with Validation when a filter was recorded as unrenderable.
    pub fn validate(&self) -> OrmResult<()> {
        match self.filters.build_error().or(self.having.build_error()) {
            Some(err) => Err(OrmError::Validation(err.to_string())),
            None => Ok(()),
        }
    }

    // ==================== compile ====================

    /// Compile without executing (for inspection). Unrenderable filters are
    /// left out here; execution reports them through [`Query::validate`].
    pub fn build(&self) -> BuiltQuery {
        self.compile(None)
    }

    /// Compiled SQL text.
    pub fn to_sql(&self) -> String {
        self.build().sql
    }

    fn soft_delete_active(&self) -> bool {
        self.config.soft_delete && !self.with_deleted
    }

    fn compile(&self, limit: Option<i64>) -> BuiltQuery {
        let table = T::TABLE;
        let soft = self.soft_delete_active();
        let mut params = ParamList::new();

        let mut sql = String::from("SELECT ");
        match &self.projection {
            Some(projection) => sql.push_str(&projection.columns.join(", ")),
            None => {
                let columns: Vec<String> = mapper::mapped_columns::<T>(&self.config)
                    .iter()
                    .map(|c| format!("{}.{}", table, c.name))
                    .collect();
                sql.push_str(&columns.join(", "));
            }
        }

        sql.push_str(" FROM ");
        sql.push_str(table);

        for join in &self.joins {
            let not_deleted =
                soft.then(|| Node::is_null(Connective::And, format!("{}.deleted_at", join.table)));
            sql.push(' ');
            sql.push_str(&join.compile(not_deleted, &mut params));
        }

        let filters = compile(self.filters.nodes(), &mut params);
        let where_sql = match (soft, filters.is_empty()) {
            (true, true) => format!("{}.deleted_at IS NULL", table),
            (true, false) => format!("({}.deleted_at IS NULL) AND ({})", table, filters),
            (false, _) => filters,
        };
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if self.projection.is_some() && !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));

            if !self.having.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&compile(self.having.nodes(), &mut params));
            }
        }

        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(column, order)| format!("{} {}", column, order.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        let limit = limit.unwrap_or(self.limit);
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }

        BuiltQuery { sql, params }
    }

    // ==================== execute ====================

    async fn rows(&self, conn: &dyn GenericClient, op: &'static str, limit: Option<i64>) -> OrmResult<Vec<Row>> {
        self.validate()?;
        let built = self.compile(limit);
        self.config.before_query(op, T::TABLE, &built);
        conn.query(&built.sql, &built.params.as_refs()).await
    }

    async fn run(&self, conn: &dyn GenericClient, op: &'static str, limit: Option<i64>) -> OrmResult<Vec<T>> {
        let rows = self.rows(conn, op, limit).await?;

        let mut out = Vec::with_capacity(rows.len());
        match &self.projection {
            Some(Projection { decode: Some(decode), .. }) => {
                for row in &rows {
                    out.push(decode(row)?);
                }
            }
            Some(Projection { decode: None, .. }) => {
                return Err(OrmError::validation(
                    "projection has no decoder; use fetch_as",
                ));
            }
            None => {
                let columns = mapper::mapped_columns::<T>(&self.config);
                for row in &rows {
                    out.push(mapper::decode(row, &columns)?);
                }
            }
        }

        for hook in &self.eager {
            hook.load(conn, &self.config, &mut out).await?;
        }
        Ok(out)
    }

    /// All matching rows.
    pub async fn get(&self, conn: &dyn GenericClient) -> OrmResult<Vec<T>> {
        self.run(conn, "get", None).await.op("get")
    }

    /// The first matching row; Not-found when there is none.
    pub async fn first(&self, conn: &dyn GenericClient) -> OrmResult<T> {
        let rows = self.run(conn, "first", Some(1)).await.op("first")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| OrmError::not_found(format!("no row in {}", T::TABLE)).context("first"))
    }

    /// Exactly one matching row; Not-found on zero or several.
    pub async fn find(&self, conn: &dyn GenericClient) -> OrmResult<T> {
        let mut rows = self.run(conn, "find", None).await.op("find")?;
        if rows.len() != 1 {
            return Err(OrmError::not_found(format!(
                "expected exactly one row in {}, got {}",
                T::TABLE,
                rows.len()
            ))
            .context("find"));
        }
        Ok(rows.remove(0))
    }

    /// [`Query::find`] restricted to one identifier.
    pub async fn find_by_id(&self, conn: &dyn GenericClient, id: Uuid) -> OrmResult<T> {
        self.clone()
            .eq(&format!("{}.id", T::TABLE), id)
            .find(conn)
            .await
    }

    /// Run the statement and decode rows with `R::from_row`. Eager loads do not run.
    pub async fn fetch_as<R: FromRow>(&self, conn: &dyn GenericClient) -> OrmResult<Vec<R>> {
        let rows = self.rows(conn, "get", None).await.op("get")?;
        rows.iter()
            .map(R::from_row)
            .collect::<OrmResult<Vec<R>>>()
            .op("get")
    }

    pub async fn must_get(&self, conn: &dyn GenericClient) -> Vec<T> {
        self.get(conn).await.unwrap_or_else(|e| panic!("{}", e))
    }

    pub async fn must_first(&self, conn: &dyn GenericClient) -> T {
        self.first(conn).await.unwrap_or_else(|e| panic!("{}", e))
    }

    pub async fn must_find(&self, conn: &dyn GenericClient) -> T {
        self.find(conn).await.unwrap_or_else(|e| panic!("{}", e))
    }

    pub async fn must_find_by_id(&self, conn: &dyn GenericClient, id: Uuid) -> T {
        self.find_by_id(conn, id)
            .await
            .unwrap_or_else(|e| panic!("{}", e))
    }
}
