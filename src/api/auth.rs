use axum::{async_trait, extract::FromRequestParts, http::{header::AUTHORIZATION, request::Parts}};

use super::AppState;
use crate::GalleryError;

/// Admin bearer token check for back-office routes.
#[derive(Debug)]
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = GalleryError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));
        match token {
            Some(t) if !state.admin_token.is_empty() && constant_time_eq(t.trim(), &state.admin_token) => Ok(AdminGuard),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "Rejected admin request");
                Err(GalleryError::Unauthorized)
            }
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() { return false; }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
