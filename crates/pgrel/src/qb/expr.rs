//! Predicate trees for WHERE/HAVING/JOIN conditions.
//!
//! A condition is an ordered sequence of [`Node`]s. Each node carries the
//! [`Connective`] that joins it to its predecessor; the connective of the first
//! node in a sequence is never rendered. Nested [`Predicate::Group`]s render in
//! parentheses and are the only way to force precedence.
//!
//! [`compile`] renders a sequence with `$n` placeholders. Parameter indices
//! come from the shared [`ParamList`], so several sequences compiled into one
//! statement (joins, WHERE, HAVING) number their placeholders continuously.

use crate::qb::param::{Param, ParamList};
use tokio_postgres::types::ToSql;

/// Logical join between a node and the node before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn as_sql(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// One comparison or a nested group.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// `column op $n`
    Compare {
        column: String,
        op: String,
        value: Param,
    },

    /// `column IS NULL`
    IsNull { column: String },

    /// `column op <rhs>` with `rhs` rendered verbatim.
    ///
    /// Only for column-to-column comparisons such as join conditions. Never
    /// put user input here: it bypasses parameter binding.
    Raw {
        column: String,
        op: String,
        rhs: String,
    },

    /// `column IN ($n, $n+1, ...)`, one placeholder per value.
    In { column: String, values: Vec<Param> },

    /// Parenthesized child sequence.
    Group(Vec<Node>),
}

/// A predicate tagged with its connective.
#[derive(Clone, Debug)]
pub struct Node {
    pub connective: Connective,
    pub predicate: Predicate,
}

impl Node {
    pub fn new(connective: Connective, predicate: Predicate) -> Self {
        Self {
            connective,
            predicate,
        }
    }

    /// `column op $n`, where an `IS` comparison against SQL NULL should use
    /// [`Node::is_null`] instead.
    pub fn compare<T: ToSql + Send + Sync + 'static>(
        connective: Connective,
        column: impl Into<String>,
        op: impl Into<String>,
        value: T,
    ) -> Self {
        Self::new(
            connective,
            Predicate::Compare {
                column: column.into(),
                op: op.into(),
                value: Param::new(value),
            },
        )
    }

    pub fn is_null(connective: Connective, column: impl Into<String>) -> Self {
        Self::new(
            connective,
            Predicate::IsNull {
                column: column.into(),
            },
        )
    }

    pub fn raw(
        connective: Connective,
        column: impl Into<String>,
        op: impl Into<String>,
        rhs: impl Into<String>,
    ) -> Self {
        Self::new(
            connective,
            Predicate::Raw {
                column: column.into(),
                op: op.into(),
                rhs: rhs.into(),
            },
        )
    }

    pub fn in_list<T: ToSql + Send + Sync + 'static>(
        connective: Connective,
        column: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self::new(
            connective,
            Predicate::In {
                column: column.into(),
                values: values.into_iter().map(Param::new).collect(),
            },
        )
    }

    pub fn group(connective: Connective, nodes: Vec<Node>) -> Self {
        Self::new(connective, Predicate::Group(nodes))
    }
}

/// Compile a node sequence into SQL, pushing bound values onto `params`.
///
/// Nodes are rendered left to right with single spaces between tokens; the
/// result has no leading `WHERE`/`HAVING`/`ON` keyword. An empty sequence
/// renders as an empty string.
pub fn compile(nodes: &[Node], params: &mut ParamList) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(node.connective.as_sql());
            out.push(' ');
        }
        compile_predicate(&node.predicate, params, &mut out);
    }
    out
}

fn compile_predicate(predicate: &Predicate, params: &mut ParamList, out: &mut String) {
    match predicate {
        Predicate::Group(children) => {
            out.push('(');
            out.push_str(&compile(children, params));
            out.push(')');
        }
        Predicate::IsNull { column } => {
            out.push_str(column);
            out.push_str(" IS NULL");
        }
        Predicate::Raw { column, op, rhs } => {
            out.push_str(&format!("{} {} {}", column, op, rhs));
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                // `IN ()` is a syntax error; an empty candidate list matches nothing.
                out.push_str("1=0");
                return;
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| format!("${}", params.push_param(v.clone())))
                .collect();
            out.push_str(&format!("{} IN ({})", column, placeholders.join(",")));
        }
        Predicate::Compare { column, op, .. } if is_null_test(op) => {
            out.push_str(&format!("{} {} NULL", column, op.trim().to_ascii_uppercase()));
        }
        Predicate::Compare { column, op, value } => {
            let idx = params.push_param(value.clone());
            out.push_str(&format!("{} {} ${}", column, op, idx));
        }
    }
}

/// `IS` / `IS NOT` compare against SQL NULL and never bind their value.
fn is_null_test(op: &str) -> bool {
    let op = op.trim();
    op.eq_ignore_ascii_case("IS") || op.eq_ignore_ascii_case("IS NOT")
}

/// `IN` / `NOT IN` need one placeholder per element, which a single bound
/// value cannot provide.
fn is_list_op(op: &str) -> bool {
    let op = op.trim();
    op.eq_ignore_ascii_case("IN") || op.eq_ignore_ascii_case("NOT IN")
}

/// Accumulates a node sequence; shared by every builder that takes filters.
///
/// A filter that cannot be rendered is recorded as `build_error` and
/// reported when the owning builder executes.
#[derive(Clone, Debug, Default)]
pub struct Filters {
    nodes: Vec<Node>,
    build_error: Option<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            build_error: None,
        }
    }

    /// First filter that could not be rendered.
    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn record_error(&mut self, message: String) {
        self.build_error.get_or_insert(message);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn compare<T: ToSql + Send + Sync + 'static>(
        &mut self,
        connective: Connective,
        column: &str,
        op: &str,
        value: T,
    ) {
        if is_list_op(op) {
            self.record_error(format!(
                "`{} {}` needs a value list; use filter_in",
                column,
                op.trim()
            ));
            return;
        }
        self.nodes.push(Node::compare(connective, column, op, value));
    }

    pub fn in_list<T: ToSql + Send + Sync + 'static>(
        &mut self,
        connective: Connective,
        column: &str,
        values: Vec<T>,
    ) {
        self.nodes.push(Node::in_list(connective, column, values));
    }

    pub fn is_null(&mut self, connective: Connective, column: &str) {
        self.nodes.push(Node::is_null(connective, column));
    }

    pub fn raw(&mut self, connective: Connective, column: &str, op: &str, rhs: &str) {
        self.nodes.push(Node::raw(connective, column, op, rhs));
    }

    /// Append `nodes` as one parenthesized group. Empty groups are dropped.
    pub fn group(&mut self, connective: Connective, nodes: Vec<Node>) {
        if !nodes.is_empty() {
            self.nodes.push(Node::group(connective, nodes));
        }
    }

    /// [`Filters::group`] over another accumulator, keeping its error.
    pub fn nest(&mut self, connective: Connective, other: Filters) {
        if let Some(message) = other.build_error {
            self.record_error(message);
        }
        self.group(connective, other.nodes);
    }
}

/// Join flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        }
    }
}

/// A join declaration: `<kind> JOIN <table> ON <condition>`.
#[derive(Clone, Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub condition: Vec<Node>,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            condition: Vec::new(),
        }
    }

    /// AND a column-to-column comparison onto the join condition.
    pub fn on(mut self, column: &str, op: &str, other_column: &str) -> Self {
        self.condition
            .push(Node::raw(Connective::And, column, op, other_column));
        self
    }

    /// AND a bound comparison onto the join condition.
    pub fn on_value<T: ToSql + Send + Sync + 'static>(mut self, column: &str, op: &str, value: T) -> Self {
        self.condition
            .push(Node::compare(Connective::And, column, op, value));
        self
    }

    /// Render the join, appending `extra` (already table-qualified) to its
    /// condition without touching `self`.
    pub(crate) fn compile(&self, extra: Option<Node>, params: &mut ParamList) -> String {
        let condition = match extra {
            Some(node) => {
                let mut nodes = self.condition.clone();
                nodes.push(node);
                compile(&nodes, params)
            }
            None => compile(&self.condition, params),
        };
        format!("{} JOIN {} ON {}", self.kind.as_sql(), self.table, condition)
    }
}
