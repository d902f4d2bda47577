//! Service layer for StepLoop
//!
//! Services sit between the HTTP handlers and the repository functions in
//! `db/`. Each one requires a session, applies the ownership policy,
//! validates input and emits a view invalidation after every mutation.
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (session, ownership, validation, events)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod activity_service;
pub mod events;
pub mod goal_service;
pub mod reflection_service;
pub mod response;

pub use activity_service::{ActivityLevel, ActivityService, DashboardStats, DayActivity};
pub use events::{spawn_logging_listener, EventBus, InvalidationEvent, MutationKind};
pub use goal_service::GoalService;
pub use reflection_service::{ReflectionContentInput, ReflectionService};

use std::sync::Arc;

use crate::db::JournalDb;

/// Service container handed to the HTTP server
pub struct Services {
    pub goals: Arc<GoalService>,
    pub reflections: Arc<ReflectionService>,
    pub activity: Arc<ActivityService>,
    pub events: Arc<EventBus>,
    pub db: Arc<JournalDb>,
}

impl Services {
    /// Create all services over one shared database
    pub fn new(db: Arc<JournalDb>) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            goals: Arc::new(GoalService::new(db.clone(), events.clone())),
            reflections: Arc::new(ReflectionService::new(db.clone(), events.clone())),
            activity: Arc::new(ActivityService::new(db.clone())),
            events,
            db,
        }
    }
}
