//! User routes - account CRUD, profile and password

use axum::{
    extract::{Path, State},
    Extension,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery};
use super::AppState;
use crate::error::CatalogResult;
use crate::models::UserInfo;
use crate::AuthenticatedPrincipal;
use crate::services::user_service::{
    ChangePasswordRequest, CreateUserRequest, UpdateProfileRequest, UpdateUserRequest,
};
use crate::services::UserService;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/profile", get(get_user).put(update_profile))
        .route("/users/{id}/password", put(change_password))
}

fn service(state: &AppState) -> UserService {
    UserService::new((*state.db).clone())
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> CatalogResult<Json<Vec<UserInfo>>> {
    let users = service(&state).list(q.role.as_deref()).await?;
    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<UserInfo>> {
    Ok(Json(service(&state).get(&id).await?.into()))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> CatalogResult<(StatusCode, Json<UserInfo>)> {
    let user = service(&state).create(req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> CatalogResult<Json<UserInfo>> {
    Ok(Json(service(&state).update(&id, req).await?.into()))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> CatalogResult<Json<UserInfo>> {
    Ok(Json(service(&state).update_profile(&id, req).await?.into()))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    principal: Option<Extension<AuthenticatedPrincipal>>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> CatalogResult<Json<MessageResponse>> {
    let caller_is_admin = principal.is_some_and(|Extension(p)| p.is_administrator());
    service(&state)
        .change_password(&id, req, caller_is_admin)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<MessageResponse>> {
    service(&state).delete(&id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}
