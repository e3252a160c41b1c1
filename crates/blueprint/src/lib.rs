//! # blueprint
//!
//! A whitelist-guarded SQL statement compiler for MySQL and PostgreSQL, with
//! async execution adapters and a registry-based builder on top.
//!
//! ## Features
//!
//! - **Structured input**: statements are described clause by clause, never as SQL text
//! - **Whitelists**: optional allow-sets for table and column names, checked as clauses are set
//! - **Named placeholders**: every literal is bound (`:wh0`, `:up0`, `:ins0`); `NULL` is the only inline literal
//! - **Two dialects**: one renderer driven by a small per-dialect syntax table
//! - **Reusable pieces**: named [`Pattern`]s, [`Filter`]s and transformations on a [`Blueprint`]
//!
//! ## Compiler
//!
//! ```ignore
//! use blueprint::query::{Query, StatementType, Where, Joiner};
//!
//! let mut q = Query::mysql();
//! q.set_type(StatementType::Select)
//!     .set_table("users")?
//!     .set_columns(["id", "email"])?
//!     .set_where(Where::new().key("age >", 18).key_in("id in", [1, 2]), Joiner::And, Joiner::And)?;
//! let compiled = q.to_compiled()?;
//! ```
//!
//! ## Builder
//!
//! ```ignore
//! use blueprint::{Blueprint, Pattern};
//! use blueprint::source::PgSource;
//!
//! let mut bp = Blueprint::new(PgSource::new(client));
//! bp.add_pattern("users", Pattern::new().table("users").columns(["id", "email"]));
//! let rows = bp.select().with_pattern("users")?.many().await?;
//! ```

pub mod blueprint;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod ident;
pub mod pattern;
pub mod query;
pub mod source;
pub mod value;

pub use blueprint::{BatchTransformation, Blueprint, Transformation};
pub use dialect::{Dialect, DialectSpec, LimitStyle, PositionalStyle};
pub use error::{BlueprintError, BlueprintResult, ErrorKind, IdentKind};
pub use filter::Filter;
pub use pattern::Pattern;
pub use query::{
    AggregateFunction, Compiled, Direction, JoinKind, Joiner, Names, Operator, Query, Shorthand,
    StatementType, Where, Whitelist,
};
pub use source::{ConnectionConfig, Driver, RecordingSource, Source};
pub use value::{Record, Value};

#[cfg(feature = "pool")]
pub use source::create_pool;

#[cfg(feature = "mysql")]
pub use source::{MySqlSource, MySqlTransaction};

pub use source::{GenericClient, PgSource};
