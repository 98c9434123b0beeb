//! Request metadata captured alongside each recorded visit

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use std::convert::Infallible;

/// Best-effort client metadata recorded with a visit.
///
/// Extraction never fails: a missing or unreadable header leaves the slot
/// empty (`"unknown"` for the address) instead of blocking the redirect.
#[derive(Debug, Clone)]
pub struct VisitContext {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl Default for VisitContext {
    fn default() -> Self {
        Self {
            ip_address: "unknown".to_string(),
            user_agent: None,
            referer: None,
        }
    }
}

impl VisitContext {
    /// Reads the client address from `x-forwarded-for`, then `x-real-ip`,
    /// falling back to `"unknown"`. User agent and referer are kept as the
    /// raw header strings.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .or_else(|| headers.get("x-real-ip"))
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let user_agent = headers
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        let referer = headers
            .get("referer")
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        Self {
            ip_address,
            user_agent,
            referer,
        }
    }
}

impl<S> FromRequestParts<S> for VisitContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
