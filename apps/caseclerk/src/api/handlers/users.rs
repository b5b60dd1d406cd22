use axum::extract::State;
use caseclerk_core::model::{OnboardingStep, ProfileUpdate};
use caseclerk_core::{UserId, UserProfile};
use chrono::Utc;
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AuthUser, ListQuery, PathId, ValidJson, ValidQuery};
use crate::api::response::{Envelope, ok, paged};

/// Every account. Administrators only.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(list): ValidQuery<ListQuery>,
) -> ApiResult<Envelope<Vec<UserProfile>>> {
    auth.require_admin()?;
    let params = list.params()?;
    let page = state.db.read().await.list_users(&params);
    Ok(paged(page.map(|u| u.profile())))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    PathId(id): PathId<UserId>,
) -> ApiResult<Envelope<UserProfile>> {
    auth.require_self_or_admin(id)?;
    let db = state.db.read().await;
    Ok(ok(db.get_user(id)?.profile()))
}

#[derive(Debug, Deserialize)]
pub struct AccountStatus {
    pub active: bool,
}

/// Enables or disables an account. Administrators only, and never their own.
pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthUser,
    PathId(id): PathId<UserId>,
    ValidJson(status): ValidJson<AccountStatus>,
) -> ApiResult<Envelope<UserProfile>> {
    auth.require_admin()?;
    if id == auth.id {
        return Err(ApiError::forbidden("cannot change the status of your own account"));
    }
    let user = state
        .db
        .write()
        .await
        .set_user_active(id, status.active, Utc::now())?;
    tracing::info!(user_id = %id, active = user.active, "account status changed");
    Ok(ok(user.profile()))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Envelope<UserProfile>> {
    let db = state.db.read().await;
    Ok(ok(db.get_user(auth.id)?.profile()))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(update): ValidJson<ProfileUpdate>,
) -> ApiResult<Envelope<UserProfile>> {
    let user = state
        .db
        .write()
        .await
        .update_profile(auth.id, update, Utc::now())?;
    tracing::info!(user_id = %auth.id, "profile updated");
    Ok(ok(user.profile()))
}

pub async fn onboarding(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(step): ValidJson<OnboardingStep>,
) -> ApiResult<Envelope<UserProfile>> {
    let user = state
        .db
        .write()
        .await
        .advance_onboarding(auth.id, step, Utc::now())?;
    tracing::info!(
        user_id = %auth.id,
        step = user.onboarding.step,
        completed = user.onboarding.completed,
        "onboarding advanced"
    );
    Ok(ok(user.profile()))
}
