//! Ownership policy
//!
//! One rule for every goal and reflection operation: the entity must exist
//! and belong to the caller. Both failures look identical to the caller so
//! other users' data cannot be probed.

use crate::auth::session::SessionContext;
use crate::error::{JournalError, Result};

/// Entities with a (direct or transitive) owning user
pub trait Owned {
    /// Kind name used in not-found messages
    const KIND: &'static str;

    fn owner_id(&self) -> &str;
}

/// Return the entity if present and owned by the session's user
pub fn assert_owned<E: Owned>(session: &SessionContext, entity: Option<E>) -> Result<E> {
    match entity {
        Some(e) if e.owner_id() == session.user_id => Ok(e),
        _ => Err(JournalError::NotFound(format!("{} not found", E::KIND))),
    }
}
