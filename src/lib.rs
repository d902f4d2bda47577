//! StepLoop - goal journal with daily reflections
//!
//! Users keep a set of goals and attach at most one reflection per goal per
//! day. Resubmitting a day overwrites that day's entry.
//!
//! ## Layers
//!
//! - **auth**: session verification, the request gate, the ownership policy
//! - **db**: SQLite repository functions with soft delete behind `live_*` views
//! - **services**: GoalStore, ReflectionStore and ActivityAggregator, plus
//!   view invalidation events
//! - **server**: hyper HTTP/1 surface in front of the services

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;
pub mod services;

pub use auth::{AuthorizationGate, Caller, SessionContext, SessionVerifier};
pub use config::Args;
pub use db::JournalDb;
pub use error::{JournalError, Result};
pub use server::HttpServer;
pub use services::Services;
