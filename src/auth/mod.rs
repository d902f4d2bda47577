//! Authentication and authorization for StepLoop
//!
//! Provides:
//! - Session context and the explicit `Caller` threaded into every operation
//! - Session token verification (HS256, shared with the identity provider)
//! - The path gate applied before routing
//! - The ownership policy applied by every store operation

pub mod gate;
pub mod jwt;
pub mod ownership;
pub mod session;

pub use gate::{AuthorizationGate, GateDecision, PathClass, DASHBOARD_PATH, LOGIN_PATH};
pub use jwt::{extract_bearer_token, extract_cookie, SessionClaims, SessionVerifier};
pub use ownership::{assert_owned, Owned};
pub use session::{Caller, SessionContext};
