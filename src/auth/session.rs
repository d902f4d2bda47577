//! Session context and caller identity
//!
//! The identity provider proves who is calling; this module only carries
//! that proof. Every store operation receives a `Caller` explicitly.

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};

/// Verified identity and profile attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// User identifier issued by the identity provider
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Avatar reference
    pub image: Option<String>,
}

impl SessionContext {
    /// Session with only an identifier
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
            image: None,
        }
    }

    pub fn with_profile(
        mut self,
        email: Option<String>,
        name: Option<String>,
        image: Option<String>,
    ) -> Self {
        self.email = email;
        self.name = name;
        self.image = image;
        self
    }
}

/// Who is making the current request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    Authenticated(SessionContext),
}

impl Caller {
    /// Wrap a session; a blank user id is not a session
    pub fn from_session(session: SessionContext) -> Self {
        if session.user_id.trim().is_empty() {
            Caller::Anonymous
        } else {
            Caller::Authenticated(session)
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated(_))
    }

    pub fn session(&self) -> Option<&SessionContext> {
        match self {
            Caller::Authenticated(session) => Some(session),
            Caller::Anonymous => None,
        }
    }

    /// The session, or `Unauthorized`. Every store operation starts here.
    pub fn require(&self) -> Result<&SessionContext> {
        self.session()
            .ok_or_else(|| JournalError::Unauthorized("sign-in required".into()))
    }
}
