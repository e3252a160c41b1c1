//! Statement compiler.
//!
//! A [`Query`] turns structured clause input into a SQL string with named
//! placeholders (`:wh0`, `:up0`, `:ins0`) plus a map of bound values.
//!
//! # Features
//!
//! - **Whitelists**: table and column names can be restricted per query
//! - **Shorthand input**: positional, aliased and per-table column lists
//! - **Eager binding**: values are bound when set, so compiling is pure and repeatable
//! - **Two dialects**: MySQL and PostgreSQL, differing only in a syntax table
//!
//! # Usage
//!
//! ```ignore
//! use blueprint::query::{Query, StatementType, Where, Joiner, Direction};
//!
//! let mut q = Query::postgres();
//! q.set_type(StatementType::Select)
//!     .set_table("users")?
//!     .set_columns(["id", "email"])?
//!     .set_where(Where::new().key("age >", 18), Joiner::And, Joiner::And)?
//!     .set_order_by("created_at", Direction::Desc, false)?
//!     .set_limit(20, 0);
//!
//! let sql = q.compile()?;
//! // SELECT "users"."id", "users"."email" FROM "users" WHERE ("users"."age" > :wh0) ...
//! ```

mod bind;
mod clause;
mod operator;
mod predicate;
mod render;
mod shorthand;
mod statement;
mod whitelist;

pub use bind::{BindRegistry, Bindings, Namespace};
pub use clause::{
    AggregateFunction, AggregateSpec, Bound, ColumnRef, Direction, GroupEntry, InsertRow, JoinKind,
    JoinSpec, Joiner, Limit, OrderEntry, PredicateBlock, PredicateEntry, PredicateGroup,
    StatementType, UpdateAssignment,
};
pub use operator::{Operator, is_list_key, split_key};
pub use predicate::{Condition, ConditionBlock, Where, WhereValue};
pub use shorthand::{Shorthand, ShorthandValue, record_from_json};
pub use statement::{Compiled, Query};
pub use whitelist::{Names, Whitelist};
