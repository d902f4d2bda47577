//! HTTP server for the journal
//!
//! hyper http1 with TokioIo. Every request runs the same pipeline:
//! resolve the caller from the session token, apply the authorization gate,
//! then route. Handlers are thin; all rules live in the services.
//!
//! ## Routes
//! - `GET /health` - liveness and row counts
//! - `GET /login`, `GET /privacy` - public pages (rendered elsewhere)
//! - `GET /api/auth/session` - current session profile or `null`
//! - `GET /` - redirect to the dashboard
//! - `GET /dashboard` - goals with recent reflections, plus activity
//! - `GET|POST /api/goals` - list / create
//! - `PUT|DELETE /api/goals/{id}`, `POST /api/goals/{id}/archive`
//! - `GET|POST /api/goals/{id}/reflections` - list / record for a day
//! - `PUT|DELETE /api/reflections/{id}`
//! - `GET /api/stats` - activity heatmap

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthorizationGate, Caller, GateDecision, SessionVerifier};
use crate::db::models::parse_submitted_date;
use crate::db::UpsertOutcome;
use crate::error::JournalError;
use crate::services::response::{
    created, error_response, from_create_result, from_delete_result, from_result,
    method_not_allowed, not_found, ok, redirect,
};
use crate::services::{ReflectionContentInput, Services};

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    gate: AuthorizationGate,
    verifier: SessionVerifier,
    cookie_name: String,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(
        services: Arc<Services>,
        verifier: SessionVerifier,
        cookie_name: impl Into<String>,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            services,
            gate: AuthorizationGate::new(),
            verifier,
            cookie_name: cookie_name.into(),
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), JournalError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(self.dispatch(Request::from_parts(parts, body)))
    }

    /// Caller resolution, gate, routing. Bodies are already buffered.
    pub fn dispatch(&self, req: Request<Bytes>) -> Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let caller = self.caller(req.headers());
        debug!(method = %method, path = %path, authenticated = caller.is_authenticated(), "Incoming request");

        if let GateDecision::Redirect { location } = self.gate.decide(&path, &caller) {
            debug!(path = %path, location = %location, "Gate redirect");
            return redirect(&location);
        }

        let response = self.route(&method, &path, &caller, req.headers(), req.body());

        let status = response.status();
        if status.is_server_error() {
            error!(method = %method, path = %path, status = status.as_u16(), "Request failed");
        } else if status.is_client_error() {
            debug!(method = %method, path = %path, status = status.as_u16(), "Request rejected");
        }
        response
    }

    fn caller(&self, headers: &HeaderMap) -> Caller {
        let header_str = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
        self.verifier.caller_from_headers(
            header_str(header::AUTHORIZATION),
            header_str(header::COOKIE),
            &self.cookie_name,
        )
    }

    fn route(
        &self,
        method: &Method,
        path: &str,
        caller: &Caller,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Response<Full<Bytes>> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let svc = &self.services;

        match (method.clone(), segments.as_slice()) {
            (Method::GET, ["health"]) => self.handle_health(),
            (Method::GET, ["login"]) => ok(&serde_json::json!({ "page": "login" })),
            (Method::GET, ["privacy"]) => ok(&serde_json::json!({ "page": "privacy" })),
            (Method::GET, ["api", "auth", "session"]) => ok(&caller.session()),

            (Method::GET, [""]) => redirect(self.gate.dashboard_path()),
            (Method::GET, ["dashboard"]) => self.handle_dashboard(caller),

            (Method::GET, ["api", "goals"]) => from_result(svc.goals.list(caller)),
            (Method::POST, ["api", "goals"]) => from_create_result(
                parse_body::<GoalForm>(headers, body)
                    .and_then(|form| svc.goals.create(caller, &form.title, form.description)),
            ),
            (Method::PUT, ["api", "goals", id]) => from_result(
                parse_body::<GoalForm>(headers, body)
                    .and_then(|form| svc.goals.update(caller, id, &form.title, form.description)),
            ),
            (Method::DELETE, ["api", "goals", id]) => {
                from_delete_result(svc.goals.delete(caller, id))
            }
            (Method::POST, ["api", "goals", id, "archive"]) => {
                from_result(svc.goals.archive(caller, id))
            }

            (Method::GET, ["api", "goals", id, "reflections"]) => {
                from_result(svc.reflections.list(caller, id))
            }
            (Method::POST, ["api", "goals", id, "reflections"]) => {
                self.handle_record_reflection(caller, id, headers, body)
            }
            (Method::PUT, ["api", "reflections", id]) => from_result(
                parse_body::<ReflectionForm>(headers, body)
                    .and_then(|form| svc.reflections.update(caller, id, form.into_content())),
            ),
            (Method::DELETE, ["api", "reflections", id]) => {
                from_delete_result(svc.reflections.delete(caller, id))
            }

            (Method::GET, ["api", "stats"]) => from_result(svc.activity.dashboard_stats(caller)),

            (_, ["api", "goals"])
            | (_, ["api", "goals", _])
            | (_, ["api", "goals", _, "archive"])
            | (_, ["api", "goals", _, "reflections"])
            | (_, ["api", "reflections", _])
            | (_, ["api", "stats"]) => method_not_allowed(),

            _ => not_found("Not Found"),
        }
    }

    fn handle_health(&self) -> Response<Full<Bytes>> {
        match self.services.db.stats() {
            Ok(stats) => ok(&serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "users": stats.user_count,
                "goals": stats.goal_count,
                "reflections": stats.reflection_count,
            })),
            Err(e) => error_response(e),
        }
    }

    fn handle_dashboard(&self, caller: &Caller) -> Response<Full<Bytes>> {
        let result = self.services.goals.list(caller).and_then(|goals| {
            let stats = self.services.activity.dashboard_stats(caller)?;
            Ok(serde_json::json!({ "goals": goals, "stats": stats }))
        });
        from_result(result)
    }

    /// 201 when a new reflection was created, 200 when the day's entry was overwritten
    fn handle_record_reflection(
        &self,
        caller: &Caller,
        goal_id: &str,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Response<Full<Bytes>> {
        let result = parse_body::<ReflectionForm>(headers, body).and_then(|form| {
            let date = form.date()?;
            self.services
                .reflections
                .record_daily(caller, goal_id, date, form.into_content())
        });

        match result {
            Ok((reflection, outcome)) => {
                let body = serde_json::json!({ "reflection": reflection, "outcome": outcome });
                match outcome {
                    UpsertOutcome::Inserted => created(&body),
                    UpsertOutcome::Updated => ok(&body),
                }
            }
            Err(e) => error_response(e),
        }
    }
}

/// Submitted goal fields
#[derive(Debug, Default, Deserialize)]
struct GoalForm {
    #[serde(default)]
    title: String,
    description: Option<String>,
}

/// Submitted reflection fields
#[derive(Debug, Default, Deserialize)]
struct ReflectionForm {
    date: Option<String>,
    #[serde(default)]
    good: String,
    bad: Option<String>,
    analysis: Option<String>,
    #[serde(alias = "next_action")]
    #[serde(rename = "nextAction")]
    next_action: Option<String>,
}

impl ReflectionForm {
    fn date(&self) -> Result<Option<chrono::NaiveDateTime>, JournalError> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_submitted_date(raw).map(Some),
        }
    }

    fn into_content(self) -> ReflectionContentInput {
        ReflectionContentInput {
            good: self.good,
            bad: self.bad,
            analysis: self.analysis,
            next_action: self.next_action,
        }
    }
}

/// Decode a JSON or form-urlencoded body, chosen by `Content-Type`
fn parse_body<T: DeserializeOwned + Default>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<T, JournalError> {
    if body.is_empty() {
        return Ok(T::default());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        Ok(serde_json::from_slice(body)?)
    } else {
        serde_urlencoded::from_bytes(body).map_err(|e| JournalError::Validation {
            field: "body",
            message: format!("Form error: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionContext;
    use crate::db::JournalDb;
    use hyper::StatusCode;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn server() -> HttpServer {
        let db = Arc::new(JournalDb::open_in_memory().unwrap());
        let services = Arc::new(Services::new(db));
        let verifier = SessionVerifier::new(SECRET.into(), 3600).unwrap();
        HttpServer::new(services, verifier, "steploop.session", "127.0.0.1:0".parse().unwrap())
    }

    fn token(server: &HttpServer, user: &str) -> String {
        server.verifier.issue(&SessionContext::new(user)).unwrap()
    }

    fn request(method: Method, path: &str, token: Option<&str>, body: &str) -> Request<Bytes> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("theme=dark; steploop.session={}", token));
        }
        builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from(body.to_string()))
            .unwrap()
    }

    fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = tokio_test::block_on(resp.into_body().collect()).unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_anonymous_protected_path_redirects_to_login() {
        let srv = server();
        let resp = srv.dispatch(request(Method::POST, "/api/goals", None, "title=Run"));
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert_eq!(srv.services.db.stats().unwrap().goal_count, 0);
    }

    #[test]
    fn test_signed_in_login_redirects_to_dashboard() {
        let srv = server();
        let t = token(&srv, "u1");
        let resp = srv.dispatch(request(Method::GET, "/login", Some(&t), ""));
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/dashboard");
    }

    #[test]
    fn test_public_and_static_paths_pass() {
        let srv = server();
        assert_eq!(srv.dispatch(request(Method::GET, "/login", None, "")).status(), StatusCode::OK);
        assert_eq!(srv.dispatch(request(Method::GET, "/health", None, "")).status(), StatusCode::OK);
        // Not served here, but not redirected either
        let resp = srv.dispatch(request(Method::GET, "/static/app.css", None, ""));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_root_redirects_to_dashboard() {
        let srv = server();
        let t = token(&srv, "u1");
        let resp = srv.dispatch(request(Method::GET, "/", Some(&t), ""));
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/dashboard");
    }

    #[test]
    fn test_goal_and_reflection_flow() {
        let srv = server();
        let t = token(&srv, "u1");

        let resp = srv.dispatch(request(Method::POST, "/api/goals", Some(&t), "title=Run+daily&description="));
        assert_eq!(resp.status(), StatusCode::CREATED);
        let goal = body_json(resp);
        assert_eq!(goal["title"], "Run daily");
        assert!(goal["description"].is_null());
        let goal_id = goal["id"].as_str().unwrap().to_string();

        let path = format!("/api/goals/{}/reflections", goal_id);
        let first = srv.dispatch(request(Method::POST, &path, Some(&t), "date=2024-01-01&good=ran+5k"));
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = srv.dispatch(request(
            Method::POST,
            &path,
            Some(&t),
            "date=2024-01-01T19%3A30&good=ran+10k&nextAction=rest",
        ));
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second)["outcome"], "updated");

        let listed = body_json(srv.dispatch(request(Method::GET, &path, Some(&t), "")));
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["good"], "ran 10k");
        assert_eq!(listed[0]["date"], "2024-01-01");
        assert_eq!(listed[0]["next_action"], "rest");

        let dashboard = body_json(srv.dispatch(request(Method::GET, "/dashboard", Some(&t), "")));
        assert_eq!(dashboard["goals"][0]["reflections"][0]["good"], "ran 10k");
        assert_eq!(dashboard["stats"]["activities"][0]["level"], 1);
    }

    #[test]
    fn test_json_body_and_validation_field() {
        let srv = server();
        let t = token(&srv, "u1");
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/goals")
            .header(header::AUTHORIZATION, format!("Bearer {}", t))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Bytes::from(r#"{"title": "   "}"#))
            .unwrap();

        let resp = srv.dispatch(req);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp)["field"], "title");
    }

    #[test]
    fn test_foreign_goal_is_not_found() {
        let srv = server();
        let owner = token(&srv, "a");
        let other = token(&srv, "b");

        let goal = body_json(srv.dispatch(request(Method::POST, "/api/goals", Some(&owner), "title=Mine")));
        let path = format!("/api/goals/{}/archive", goal["id"].as_str().unwrap());

        let resp = srv.dispatch(request(Method::POST, &path, Some(&other), ""));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let srv = server();
        let t = token(&srv, "u1");
        let goal = body_json(srv.dispatch(request(Method::POST, "/api/goals", Some(&t), "title=x")));
        let path = format!("/api/goals/{}/reflections", goal["id"].as_str().unwrap());

        let resp = srv.dispatch(request(Method::POST, &path, Some(&t), "date=someday&good=ok"));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp)["field"], "date");
    }

    #[test]
    fn test_wrong_method_on_known_route() {
        let srv = server();
        let t = token(&srv, "u1");
        let resp = srv.dispatch(request(Method::PATCH, "/api/goals", Some(&t), ""));
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_session_endpoint_reports_profile() {
        let srv = server();
        let anon = body_json(srv.dispatch(request(Method::GET, "/api/auth/session", None, "")));
        assert!(anon.is_null());

        let t = token(&srv, "u1");
        let me = body_json(srv.dispatch(request(Method::GET, "/api/auth/session", Some(&t), "")));
        assert_eq!(me["user_id"], "u1");
    }
}
