// apitoken: HTTP surface
//
// Two ways to put the gate in front of HTTP traffic:
//   - `require_service_token`, an axum middleware guarding a group of routes
//     with a fixed acceptable-service set;
//   - the forward-auth router served by `apitoken serve`, which answers
//     `/authorize/{route}` with 204 or 401 for a reverse proxy.
// Gate checks hit SQLite and Argon2, so they run on the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use zeroize::Zeroizing;

use crate::config::RouteTable;
use crate::error::ApiTokenError;

use super::bearer::extract_credential;
use super::gate::{Decision, Gate};

/// Body message of every 401. Says nothing about which services exist.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// `401 Unauthorized` with `{"message":"Unauthorized"}`.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": UNAUTHORIZED_MESSAGE })),
    )
        .into_response()
}

/// Run the gate off the async executor. A panicked or cancelled check denies.
async fn authorize_blocking(
    gate: Arc<Gate>,
    credential: Option<Zeroizing<String>>,
    services: Arc<[String]>,
) -> Decision {
    tokio::task::spawn_blocking(move || {
        gate.authorize(credential.as_ref().map(|c| c.as_str()), &services)
    })
    .await
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Authorization task failed, denying request");
        Decision::Deny
    })
}

// ─── Route Guard Middleware ──────────────────────────────────────────────────

/// Middleware state: the gate plus one route group's acceptable services.
#[derive(Clone)]
pub struct RouteGuard {
    gate: Arc<Gate>,
    services: Arc<[String]>,
    allow_query_token: bool,
}

impl RouteGuard {
    pub fn new<I, S>(gate: Arc<Gate>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            gate,
            services: services.into_iter().map(Into::into).collect(),
            allow_query_token: false,
        }
    }

    /// Also accept the token from the `api_token` query parameter.
    pub fn allow_query_token(mut self, allow: bool) -> Self {
        self.allow_query_token = allow;
        self
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub async fn check(&self, credential: Option<Zeroizing<String>>) -> Decision {
        authorize_blocking(self.gate.clone(), credential, self.services.clone()).await
    }
}

/// axum middleware: pass the request on if the gate allows it, else 401.
///
/// ```ignore
/// let guard = RouteGuard::new(gate, ["billing"]);
/// let app = Router::new()
///     .route("/invoices", get(list_invoices))
///     .route_layer(axum::middleware::from_fn_with_state(guard, require_service_token));
/// ```
pub async fn require_service_token(
    State(guard): State<RouteGuard>,
    req: Request,
    next: Next,
) -> Response {
    let credential = extract_credential(req.headers(), req.uri(), guard.allow_query_token);

    match guard.check(credential).await {
        Decision::Allow => next.run(req).await,
        Decision::Deny => unauthorized(),
    }
}

// ─── Forward-Auth Server ─────────────────────────────────────────────────────

#[derive(Clone)]
struct ForwardAuthState {
    gate: Arc<Gate>,
    routes: Arc<RouteTable>,
    allow_query_token: bool,
}

/// Router for `apitoken serve`.
pub fn forward_auth_router(gate: Arc<Gate>, routes: RouteTable, allow_query_token: bool) -> Router {
    let state = ForwardAuthState {
        gate,
        routes: Arc::new(routes),
        allow_query_token,
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/authorize/{route}", any(authorize_route))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn authorize_route(
    State(state): State<ForwardAuthState>,
    Path(route): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let services: Arc<[String]> = state.routes.services(&route).into();
    if services.is_empty() {
        tracing::debug!(route = %route, "No services configured for route");
    }

    let credential = extract_credential(&headers, &uri, state.allow_query_token);

    match authorize_blocking(state.gate.clone(), credential, services).await {
        Decision::Allow => StatusCode::NO_CONTENT.into_response(),
        Decision::Deny => unauthorized(),
    }
}

/// Bind and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<(), ApiTokenError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiTokenError::Server(format!("failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "apitoken forward-auth server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware;
    use tower::ServiceExt;

    use crate::codec::{Argon2Codec, HashParams};
    use crate::manager::CredentialManager;
    use crate::store::{Database, SqliteCredentialStore};

    fn setup() -> (Arc<Gate>, CredentialManager) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteCredentialStore::new(db));
        let codec = Arc::new(
            Argon2Codec::new(HashParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let gate = Arc::new(Gate::new(store.clone(), codec.clone()));
        (gate, CredentialManager::new(store, codec))
    }

    fn guarded_app(gate: Arc<Gate>, services: &[&str], allow_query: bool) -> Router {
        let guard = RouteGuard::new(gate, services.iter().copied()).allow_query_token(allow_query);
        Router::new()
            .route("/_test", any(|| async { "OK" }))
            .route_layer(middleware::from_fn_with_state(guard, require_service_token))
    }

    fn bearer_request(uri: &str, token: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn plain_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn status_of(app: Router, req: Request) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_valid_bearer_token_returns_ok() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();
        let app = guarded_app(gate, &["test"], false);

        let resp = app.oneshot(bearer_request("/_test", &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_invalid_token_returns_unauthorized_body() {
        let (gate, manager) = setup();
        manager.create("test").unwrap();
        let app = guarded_app(gate, &["test"], false);

        let resp = app
            .oneshot(bearer_request("/_test", "invalidtoken"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "Unauthorized" }));
    }

    #[tokio::test]
    async fn test_no_token_returns_unauthorized() {
        let (gate, manager) = setup();
        manager.create("test").unwrap();
        let app = guarded_app(gate, &["test"], false);

        assert_eq!(
            status_of(app, plain_request("/_test")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_query_token_requires_opt_in() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();
        let uri = format!("/_test?api_token={}", token.as_str());

        let closed = guarded_app(gate.clone(), &["test"], false);
        assert_eq!(
            status_of(closed, plain_request(&uri)).await,
            StatusCode::UNAUTHORIZED
        );

        let open = guarded_app(gate, &["test"], true);
        assert_eq!(status_of(open, plain_request(&uri)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_multiple_service_tokens() {
        let (gate, manager) = setup();
        let token1 = manager.create("test1").unwrap();
        let token2 = manager.create("test2").unwrap();
        let token3 = manager.create("test3").unwrap();
        let app = guarded_app(gate, &["test1", "test2"], false);

        assert_eq!(
            status_of(app.clone(), bearer_request("/_test", &token1)).await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(app.clone(), bearer_request("/_test", &token2)).await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(app, bearer_request("/_test", &token3)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_nonexistent_service_name_returns_unauthorized() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();
        let app = guarded_app(gate, &["nottest"], false);

        assert_eq!(
            status_of(app, bearer_request("/_test", &token)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_no_service_name_returns_unauthorized() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();
        let app = guarded_app(gate, &[], false);

        assert_eq!(
            status_of(app, bearer_request("/_test", &token)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_route_guard_check() {
        let (gate, manager) = setup();
        let token = manager.create("billing").unwrap();
        let guard = RouteGuard::new(gate, ["billing"]);

        assert_eq!(guard.services(), ["billing"]);
        assert_eq!(guard.check(Some(token)).await, Decision::Allow);
        assert_eq!(guard.check(None).await, Decision::Deny);
    }

    #[tokio::test]
    async fn test_forward_auth_allows_configured_route() {
        let (gate, manager) = setup();
        let token = manager.create("billing").unwrap();
        let routes = RouteTable::from_entries(vec!["invoices=billing,reports".parse().unwrap()]).unwrap();
        let app = forward_auth_router(gate, routes, false);

        assert_eq!(
            status_of(app.clone(), bearer_request("/authorize/invoices", &token)).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_of(app, bearer_request("/authorize/invoices", "wrong")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_forward_auth_unknown_route_denied() {
        let (gate, manager) = setup();
        let token = manager.create("billing").unwrap();
        let routes = RouteTable::from_entries(vec!["invoices=billing".parse().unwrap()]).unwrap();
        let app = forward_auth_router(gate, routes, false);

        assert_eq!(
            status_of(app, bearer_request("/authorize/elsewhere", &token)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_healthz() {
        let (gate, _) = setup();
        let app = forward_auth_router(gate, RouteTable::default(), false);

        let resp = app.oneshot(plain_request("/healthz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
