//! Statement hooks.
//!
//! Every statement compiled by this crate is handed to the configured
//! [`QueryHook`] right before it is sent to the database. The default hook,
//! [`TracingSqlHook`], emits a `tracing` event with target `pgrel.sql`.

use crate::qb::ParamList;
use tracing::Level;

/// What is about to be executed.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Operation name (`get`, `insert`, `update`, `set`, `load`, ...).
    pub op: &'static str,
    /// Table of the entity the statement targets.
    pub table: &'static str,
    /// SQL text with `$n` placeholders.
    pub sql: String,
    /// Debug rendering of each argument, in placeholder order.
    pub params: Vec<String>,
}

impl QueryContext {
    pub(crate) fn new(op: &'static str, table: &'static str, sql: &str, params: &ParamList) -> Self {
        Self {
            op,
            table,
            sql: sql.to_string(),
            params: params.iter().map(|p| format!("{:?}", p.as_ref())).collect(),
        }
    }

    /// Number of bound arguments.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Observer invoked with each compiled statement before execution.
pub trait QueryHook: Send + Sync {
    fn before_query(&self, ctx: &QueryContext);
}

/// Hook that drops every statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl QueryHook for NoopHook {
    fn before_query(&self, _ctx: &QueryContext) {}
}

/// A `tracing`-based debug hook that emits the SQL that will actually be executed.
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingSqlHook {
    /// Create a new hook with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_at_char_boundary(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryHook for TracingSqlHook {
    fn before_query(&self, ctx: &QueryContext) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(&ctx.sql);
        emit_at_level!(
            self.level,
            target: "pgrel.sql",
            op = ctx.op,
            table = ctx.table,
            param_count = ctx.param_count(),
            sql = %sql,
            params = ?ctx.params,
        );
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let hook = TracingSqlHook::new().max_sql_length(8);
        assert_eq!(hook.truncate_sql("SELECT 1"), "SELECT 1");
        assert_eq!(hook.truncate_sql("SELECT 'Björk'"), "SELECT '...");
        assert_eq!(truncate_at_char_boundary("Björk", 3), "Bj");
    }

    #[test]
    fn context_renders_params_in_order() {
        let mut params = ParamList::new();
        params.push("Prince");
        params.push(7i32);
        let ctx = QueryContext::new("get", "artists", "SELECT 1", &params);
        assert_eq!(ctx.params, vec!["\"Prince\"".to_string(), "7".to_string()]);
        assert_eq!(ctx.param_count(), 2);
    }
}
