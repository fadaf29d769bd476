//! Bearer-token capability check, run before any handler touches the queue.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::errors::json_error;

/// Capability required by every queue route.
pub const EDIT_SETTINGS: &str = "edit_settings";

/// Known tokens and the capabilities they carry.
#[derive(Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, HashSet<String>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, token: impl Into<String>, capabilities: &[&str]) -> Self {
        self.tokens
            .entry(token.into())
            .or_default()
            .extend(capabilities.iter().map(|c| c.to_string()));
        self
    }

    pub fn is_known(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn has_capability(&self, token: &str, capability: &str) -> bool {
        self.tokens.get(token).is_some_and(|caps| caps.contains(capability))
    }
}

// never print the tokens themselves
impl fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenTable").field("tokens", &self.tokens.len()).finish()
    }
}

#[derive(Clone)]
pub struct AuthState {
    tokens: Arc<TokenTable>,
    capability: &'static str,
}

impl AuthState {
    pub fn new(tokens: TokenTable, capability: &'static str) -> Self {
        Self {
            tokens: Arc::new(tokens),
            capability,
        }
    }
}

pub async fn require_capability(State(state): State<AuthState>, req: Request<Body>, next: Next) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token");
    };
    if !state.tokens.is_known(token) {
        return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unknown token");
    }
    if !state.tokens.has_capability(token, state.capability) {
        tracing::debug!(capability = state.capability, "token lacks capability");
        return json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("the {} capability is required", state.capability),
        );
    }

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("Bearer abc"), Some("abc"))]
    #[case(Some("Bearer   abc  "), Some("abc"))]
    #[case(Some("Bearer "), None)]
    #[case(Some("Basic abc"), None)]
    #[case(None, None)]
    fn bearer_extraction(#[case] header: Option<&str>, #[case] expected: Option<&str>) {
        let mut headers = HeaderMap::new();
        if let Some(value) = header {
            headers.insert(AUTHORIZATION, value.parse().unwrap());
        }
        assert_eq!(extract_bearer(&headers), expected);
    }

    #[test]
    fn capabilities_are_per_token() {
        let tokens = TokenTable::new().grant("admin", &[EDIT_SETTINGS]).grant("viewer", &[]);

        assert!(tokens.has_capability("admin", EDIT_SETTINGS));
        assert!(tokens.is_known("viewer"));
        assert!(!tokens.has_capability("viewer", EDIT_SETTINGS));
        assert!(!tokens.is_known("stranger"));
        assert_eq!(format!("{tokens:?}"), "TokenTable { tokens: 2 }");
    }
}
