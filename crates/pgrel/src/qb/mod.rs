//! Statement builders.
//!
//! - [`expr`]: the predicate tree shared by WHERE, HAVING and JOIN conditions
//! - [`Query`]: SELECT for one entity type, with joins, grouping, pagination and eager loads
//! - [`UpdateQuery`]: bulk `UPDATE ... SET` for one entity type
//!
//! Every builder compiles into a [`BuiltQuery`]: SQL text with `$n`
//! placeholders and the matching [`ParamList`]. Placeholder numbers are global
//! to the statement, so JOIN, WHERE, HAVING and IN lists never collide.
//!
//! ```ignore
//! use pgrel::qb::Order;
//!
//! let built = pgrel::query::<Artist>()
//!     .eq("name", "Prince")
//!     .or_filter("name", "=", "Queen")
//!     .order_by("name", Order::Asc)
//!     .build();
//! assert_eq!(built.params.len(), 2);
//! ```

pub mod expr;
mod param;
mod select;
mod update;

pub use expr::{Connective, Join, JoinKind, Node, Predicate};
pub use param::{Param, ParamList};
pub use select::{Decoder, Order, Query};
pub use update::UpdateQuery;

/// A compiled statement and its arguments, in placeholder order.
#[derive(Clone, Debug)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParamList,
}
