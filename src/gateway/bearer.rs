// apitoken: Credential extraction
//
// Pulls the presented token out of an HTTP request. The `Authorization:
// Bearer` header is always honoured; the `api_token` query parameter only
// when a route opts in.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{header, HeaderMap, Uri};
use zeroize::Zeroizing;

/// Query parameter accepted when a route allows query tokens.
pub const QUERY_TOKEN_PARAM: &str = "api_token";

/// Token from `Authorization: Bearer <token>`. The scheme is matched
/// case-insensitively; an empty token counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Token from the `api_token` query parameter, percent-decoded.
pub fn query_token(uri: &Uri) -> Option<Zeroizing<String>> {
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params
        .remove(QUERY_TOKEN_PARAM)
        .filter(|token| !token.is_empty())
        .map(Zeroizing::new)
}

/// The credential a request presents, header first. The copy is wiped on drop.
pub fn extract_credential(
    headers: &HeaderMap,
    uri: &Uri,
    allow_query: bool,
) -> Option<Zeroizing<String>> {
    if let Some(token) = bearer_token(headers) {
        return Some(Zeroizing::new(token.to_string()));
    }

    if allow_query {
        return query_token(uri);
    }

    None
}

// ─── Tests ───────────────────────────────────────────────────────────────────
