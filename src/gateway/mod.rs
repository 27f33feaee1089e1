// apitoken: Gateway Module
//
// Request authorization: the gate itself, credential extraction from HTTP
// requests, and the axum middleware and forward-auth server built on them.

mod bearer;
mod gate;
pub mod http;

pub use bearer::{bearer_token, extract_credential, query_token, QUERY_TOKEN_PARAM};
pub use gate::{Decision, Gate, MatchMode};
pub use http::{forward_auth_router, require_service_token, RouteGuard};
