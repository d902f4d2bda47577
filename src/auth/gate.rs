//! Request authorization gate
//!
//! Decides, before any routing, whether a request may proceed:
//!
//! | Caller        | Path                | Decision              |
//! |---------------|---------------------|-----------------------|
//! | anonymous     | protected           | redirect to login     |
//! | authenticated | login page          | redirect to dashboard |
//! | anyone        | anything else       | allow                 |
//!
//! Static assets never reach the gate's state machine.

use serde::Serialize;

use crate::auth::session::Caller;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Paths reachable without a session (matched by prefix)
pub const PUBLIC_PREFIXES: &[&str] = &[LOGIN_PATH, "/privacy", "/api/auth", "/health"];

/// Path prefixes served as static assets
const STATIC_PREFIXES: &[&str] = &["/static/", "/favicon.ico"];

/// How a request path is treated by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    StaticAsset,
    Public,
    Protected,
}

/// Outcome of the gate for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { location: String },
}

/// Stateless path classifier and redirect policy
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    login_path: String,
    dashboard_path: String,
    public_prefixes: Vec<String>,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_string(),
            dashboard_path: DASHBOARD_PATH.to_string(),
            public_prefixes: PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AuthorizationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    /// Classify a request path
    pub fn classify(&self, path: &str) -> PathClass {
        if is_static_asset(path) {
            PathClass::StaticAsset
        } else if self.public_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            PathClass::Public
        } else {
            PathClass::Protected
        }
    }

    /// Decide whether the request may pass
    pub fn decide(&self, path: &str, caller: &Caller) -> GateDecision {
        let class = self.classify(path);
        if class == PathClass::StaticAsset {
            return GateDecision::Allow;
        }

        match (caller.is_authenticated(), class) {
            (false, PathClass::Protected) => GateDecision::Redirect {
                location: self.login_path.clone(),
            },
            (true, _) if path == self.login_path => GateDecision::Redirect {
                location: self.dashboard_path.clone(),
            },
            _ => GateDecision::Allow,
        }
    }
}

/// Static assets: known asset prefixes, or a final segment with an extension
pub fn is_static_asset(path: &str) -> bool {
    if STATIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    path.rsplit('/').next().map(|last| last.contains('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionContext;

    fn signed_in() -> Caller {
        Caller::from_session(SessionContext::new("user-1"))
    }

    fn to_login() -> GateDecision {
        GateDecision::Redirect {
            location: "/login".into(),
        }
    }

    #[test]
    fn test_classify() {
        let gate = AuthorizationGate::new();
        assert_eq!(gate.classify("/login"), PathClass::Public);
        assert_eq!(gate.classify("/privacy"), PathClass::Public);
        assert_eq!(gate.classify("/api/auth/callback/google"), PathClass::Public);
        assert_eq!(gate.classify("/dashboard"), PathClass::Protected);
        assert_eq!(gate.classify("/api/goals"), PathClass::Protected);
        assert_eq!(gate.classify("/"), PathClass::Protected);
        assert_eq!(gate.classify("/favicon.ico"), PathClass::StaticAsset);
        assert_eq!(gate.classify("/static/app.js"), PathClass::StaticAsset);
        assert_eq!(gate.classify("/images/logo.png"), PathClass::StaticAsset);
    }

    #[test]
    fn test_anonymous_protected_redirects_to_login() {
        let gate = AuthorizationGate::new();
        assert_eq!(gate.decide("/dashboard", &Caller::Anonymous), to_login());
        assert_eq!(gate.decide("/api/goals", &Caller::Anonymous), to_login());
    }

    #[test]
    fn test_anonymous_public_allowed() {
        let gate = AuthorizationGate::new();
        assert_eq!(gate.decide("/login", &Caller::Anonymous), GateDecision::Allow);
        assert_eq!(gate.decide("/privacy", &Caller::Anonymous), GateDecision::Allow);
        assert_eq!(
            gate.decide("/api/auth/session", &Caller::Anonymous),
            GateDecision::Allow
        );
    }

    #[test]
    fn test_authenticated_login_redirects_to_dashboard() {
        let gate = AuthorizationGate::new();
        assert_eq!(
            gate.decide("/login", &signed_in()),
            GateDecision::Redirect {
                location: "/dashboard".into()
            }
        );
    }

    #[test]
    fn test_authenticated_passes_through() {
        let gate = AuthorizationGate::new();
        assert_eq!(gate.decide("/dashboard", &signed_in()), GateDecision::Allow);
        assert_eq!(gate.decide("/privacy", &signed_in()), GateDecision::Allow);
        // Only the exact login path bounces signed-in users
        assert_eq!(gate.decide("/login/help", &signed_in()), GateDecision::Allow);
    }

    #[test]
    fn test_static_assets_bypass_gate() {
        let gate = AuthorizationGate::new();
        assert_eq!(gate.decide("/favicon.ico", &Caller::Anonymous), GateDecision::Allow);
        assert_eq!(gate.decide("/static/site.css", &Caller::Anonymous), GateDecision::Allow);
    }
}
