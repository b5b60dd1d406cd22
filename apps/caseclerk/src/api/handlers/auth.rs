//! Registration, login and session handling.

use axum::extract::State;
use axum::http::StatusCode;
use caseclerk_core::model::{NewUser, check_password};
use caseclerk_core::{UserProfile, UserRole};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::response::{Envelope, created, ok};
use crate::api::tokens::TokenPair;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub firm_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Envelope<AuthPayload>)> {
    check_password(&req.password)?;
    let password_hash = hash_password(&state, req.password).await?;
    let user = state.db.write().await.create_user(
        NewUser {
            email: req.email,
            full_name: req.full_name,
            password_hash,
            role: UserRole::Attorney,
            firm_name: req.firm_name,
        },
        Utc::now(),
    )?;
    tracing::info!(user_id = %user.id, "user registered");
    let tokens = state.tokens.issue(&user)?;
    Ok(created(AuthPayload {
        user: user.profile(),
        tokens,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Envelope<AuthPayload>> {
    let rejected = || ApiError::unauthorized("invalid email or password");
    let user = state
        .db
        .read()
        .await
        .find_user_by_email(&req.email)
        .cloned()
        .ok_or_else(rejected)?;
    if !user.active {
        return Err(ApiError::unauthorized("account is disabled"));
    }
    if !verify_password(&state, req.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(rejected());
    }
    let user = state.db.write().await.record_login(user.id, Utc::now())?;
    tracing::info!(user_id = %user.id, "user logged in");
    let tokens = state.tokens.issue(&user)?;
    Ok(ok(AuthPayload {
        user: user.profile(),
        tokens,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<Envelope<TokenPair>> {
    let claims = state.tokens.verify_refresh(req.refresh_token.trim())?;
    let user = state
        .db
        .read()
        .await
        .get_user(claims.user_id()?)
        .cloned()
        .map_err(|_| ApiError::unauthorized("account no longer exists"))?;
    if !user.active {
        state.tokens.revoke(&claims.sid);
        tracing::info!(user_id = %user.id, "refresh refused for disabled account");
        return Err(ApiError::unauthorized("account is disabled"));
    }
    let pair = state.tokens.rotate(&claims, &user, Utc::now())?;
    Ok(ok(pair))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Envelope<Value> {
    state.tokens.revoke(&auth.session);
    tracing::info!(user_id = %auth.id, "user logged out");
    ok(json!({ "logged_out": true }))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Envelope<UserProfile>> {
    let db = state.db.read().await;
    Ok(ok(db.get_user(auth.id)?.profile()))
}

async fn hash_password(state: &AppState, password: String) -> ApiResult<String> {
    let hasher = state.hasher.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(ApiError::internal)??;
    Ok(hash)
}

async fn verify_password(state: &AppState, password: String, hash: String) -> ApiResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(ApiError::internal)
}
