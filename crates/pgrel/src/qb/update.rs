//! Bulk UPDATE builder for one entity type.

use crate::client::GenericClient;
use crate::config::{Config, default_config};
use crate::error::{OrmError, OrmResult, ResultExt};
use crate::mapper::Entity;
use crate::qb::BuiltQuery;
use crate::qb::Query;
use crate::qb::expr::{Connective, Filters, compile};
use crate::qb::param::{Param, ParamList};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// SET field value type.
#[derive(Clone, Debug)]
enum SetField {
    /// Parameterized value
    Value(Param),
    /// Raw SQL expression
    Raw(String),
}

/// `UPDATE <table> SET ... WHERE ...` over every row matching the filters.
///
/// ```ignore
/// let n = orm.update::<Album>()
///     .set("title", "Purple Rain (Deluxe)")
///     .set_raw("updated_at", "now()")
///     .eq("title", "Purple Rain")
///     .execute(&client)
///     .await?;
/// ```
pub struct UpdateQuery<T: Entity> {
    config: Arc<Config>,
    set_fields: Vec<(String, SetField)>,
    filters: Filters,
    with_deleted: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for UpdateQuery<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            set_fields: self.set_fields.clone(),
            filters: self.filters.clone(),
            with_deleted: self.with_deleted,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Default for UpdateQuery<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> UpdateQuery<T> {
    pub fn new() -> Self {
        Self {
            config: default_config(),
            set_fields: Vec::new(),
            filters: Filters::new(),
            with_deleted: false,
            _entity: PhantomData,
        }
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }

    /// Set a column value.
    pub fn set<V: ToSql + Send + Sync + 'static>(mut self, column: &str, value: V) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Value(Param::new(value))));
        self
    }

    /// Set a raw SQL expression.
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Raw(expr.to_string())));
        self
    }

    pub fn filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.filters.compare(Connective::And, column, op, value);
        self
    }

    pub fn or_filter<V: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: V) -> Self {
        self.filters.compare(Connective::Or, column, op, value);
        self
    }

    pub fn filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(Query::new()).into_filters();
        self.filters.nest(Connective::And, group);
        self
    }

    pub fn or_filter_group(mut self, f: impl FnOnce(Query<T>) -> Query<T>) -> Self {
        let group = f(Query::new()).into_filters();
        self.filters.nest(Connective::Or, group);
        self
    }

    pub fn filter_in<V: ToSql + Send + Sync + 'static>(mut self, column: &str, values: Vec<V>) -> Self {
        self.filters.in_list(Connective::And, column, values);
        self
    }

    pub fn filter_null(mut self, column: &str) -> Self {
        self.filters.is_null(Connective::And, column);
        self
    }

    /// Add WHERE: column = value
    pub fn eq<V: ToSql + Send + Sync + 'static>(self, column: &str, value: V) -> Self {
        self.filter(column, "=", value)
    }

    /// Also touch soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Compile without executing. Fails when nothing is SET or a filter
    /// cannot be rendered.
    pub fn build(&self) -> OrmResult<BuiltQuery> {
        if self.set_fields.is_empty() {
            return Err(OrmError::validation("UPDATE requires at least one SET"));
        }
        if let Some(err) = self.filters.build_error() {
            return Err(OrmError::Validation(err.to_string()));
        }

        let table = T::TABLE;
        let mut params = ParamList::new();
        let sets: Vec<String> = self
            .set_fields
            .iter()
            .map(|(column, field)| match field {
                SetField::Value(param) => {
                    format!("{} = ${}", column, params.push_param(param.clone()))
                }
                SetField::Raw(expr) => format!("{} = {}", column, expr),
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));

        let filters = compile(self.filters.nodes(), &mut params);
        let soft = self.config.soft_delete && !self.with_deleted;
        let where_sql = match (soft, filters.is_empty()) {
            (true, true) => format!("{}.deleted_at IS NULL", table),
            (true, false) => format!("({}.deleted_at IS NULL) AND ({})", table, filters),
            (false, _) => filters,
        };
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        Ok(BuiltQuery { sql, params })
    }

    /// Run the update and return the number of affected rows.
    pub async fn execute(&self, conn: &dyn GenericClient) -> OrmResult<u64> {
        let built = self.build().op("set")?;
        self.config.before_query("set", T::TABLE, &built);
        conn.execute(&built.sql, &built.params.as_refs())
            .await
            .op("set")
    }

    pub async fn must_execute(&self, conn: &dyn GenericClient) -> u64 {
        self.execute(conn).await.unwrap_or_else(|e| panic!("{}", e))
    }
}
