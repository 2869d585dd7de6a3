//! Authentication middleware
//!
//! Resolves `Authorization: Bearer` into an [`AuthenticatedPrincipal`]
//! extension. Requests without a valid token continue anonymously unless
//! access control is enforced.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use syllabus::security::{bearer_token, check_access};
use syllabus::AuthenticatedPrincipal;
use tracing::{debug, warn};

use super::service::AuthService;
use crate::state::AppState;

/// Bearer token carried by a request, if any
pub fn request_token<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match request_token(&request) {
        Some(token) => match authenticate(&state, &token).await {
            Ok(principal) => principal,
            Err(response) => return response,
        },
        None => None,
    };

    if state.config.enforce_auth {
        let path = request.uri().path().to_string();
        if let Err(e) = check_access(request.method(), &path, principal.as_ref()) {
            warn!("Rejected {} {}: {}", request.method(), path, e);
            return e.into_response();
        }
    }

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

async fn authenticate(
    state: &AppState,
    token: &str,
) -> Result<Option<AuthenticatedPrincipal>, Response> {
    let auth = AuthService::new(state.db.clone(), state.config.session_ttl_hours);
    let resolved = auth.resolve(token).await.map_err(|e| {
        warn!("Session lookup failed: {}", e);
        e.into_response()
    })?;

    let Some((session, principal)) = resolved else {
        debug!("Bearer token did not match a live session");
        return Ok(None);
    };

    // Sliding window renewal in background
    let sessions = auth.sessions().clone();
    let window = state.config.session_sliding_window_hours;
    tokio::spawn(async move {
        if let Err(e) = sessions.try_extend(&session, window).await {
            warn!("Session sliding renewal failed: {}", e);
        }
    });

    debug!("Authenticated {:?} {}", principal.kind, principal.id);
    Ok(Some(principal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_token() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer mock-token-abc")
            .body(())
            .unwrap();
        assert_eq!(request_token(&request).as_deref(), Some("mock-token-abc"));

        let basic = Request::builder()
            .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(())
            .unwrap();
        assert!(request_token(&basic).is_none());

        let bare = Request::builder().body(()).unwrap();
        assert!(request_token(&bare).is_none());
    }
}
