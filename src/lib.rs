//! # Roster
//!
//! Tenant-scoped dynamic query compiler for artist roster tracking.
//!
//! ## Architecture
//!
//! A browsable grid sends a flat filter model, a sort model and a page. The
//! compiler turns that into tenant-scoped SQL over the artist entity graph:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Grid request (filter items, sort, page)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [service: tenant resolution]
//! ┌─────────────────────────────────────────────────────────┐
//! │   FieldRouter + OperatorEvaluator  →  FilterPlan         │
//! │   (tenant scope, join aliases, predicates)               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile]
//! ┌─────────────────────────────────────────────────────────┐
//! │   page query  │  count query  │  identifiers-only query  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [store]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Executor  →  ids / count  →  hydrated artist views     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod catalog;
pub mod compile;
pub mod config;
pub mod filter;
pub mod scope;
pub mod service;
pub mod sql;
pub mod store;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::PlanCache;
    pub use crate::catalog::Catalog;
    pub use crate::compile::{CompileError, CompileOptions, Mode, QueryCompiler};
    pub use crate::config::Settings;
    pub use crate::filter::{FilterItem, FilterModel, MuteMode, PageRequest, SortItem};
    pub use crate::service::{Caller, ListRequest, RosterService, StaticTenantResolver};
    pub use crate::sql::{Dialect, Statement, Value};
    pub use crate::store::{Executor, SqliteExecutor};
}

pub use compile::{CompileError, CompileOptions, Mode, QueryCompiler};
pub use service::RosterService;
pub use sql::Dialect;
