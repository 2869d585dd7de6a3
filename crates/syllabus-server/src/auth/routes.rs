//! Authentication API routes

use axum::{
    extract::{Request, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use syllabus::routes::ApiJson;
use syllabus::{AuthenticatedPrincipal, CatalogError, CatalogResult};
use tracing::info;

use super::middleware::request_token;
use super::service::{
    AuthService, LoginRequest, MeResponse, UserLoginResponse, WebmasterLoginResponse,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Auth routes, mounted under `/api` alongside the catalogue
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/webmaster-login", post(webmaster_login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.config.session_ttl_hours)
}

async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> CatalogResult<Json<UserLoginResponse>> {
    Ok(Json(service(&state).login(&request).await?))
}

async fn webmaster_login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> CatalogResult<Json<WebmasterLoginResponse>> {
    Ok(Json(service(&state).webmaster_login(&request).await?))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> CatalogResult<Json<LogoutResponse>> {
    let token = request_token(&request).ok_or(CatalogError::Unauthorized)?;
    if !service(&state).sessions().delete(&token).await? {
        return Err(CatalogError::Unauthorized);
    }
    info!("Session closed");
    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}

async fn me(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<AuthenticatedPrincipal>>,
) -> CatalogResult<Json<MeResponse>> {
    let Extension(principal) = principal.ok_or(CatalogError::Unauthorized)?;
    Ok(Json(service(&state).me(&principal).await?))
}
