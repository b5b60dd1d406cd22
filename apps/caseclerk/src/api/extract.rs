//! Request extractors that reject with [`ApiError`] instead of axum's
//! plain-text rejections.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use caseclerk_core::{CoreError, ListParams, UserId, UserRole};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;

use super::AppState;
use super::error::{ApiError, ApiResult};

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
    /// Session the token belongs to.
    pub session: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if !self.is_admin() {
            return Err(ApiError::forbidden("administrator role required"));
        }
        Ok(())
    }

    /// Allows the account owner and administrators.
    pub fn require_self_or_admin(&self, id: UserId) -> ApiResult<()> {
        if self.id != id && !self.is_admin() {
            return Err(ApiError::forbidden("cannot access another user's account"));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
        let claims = state.tokens.verify_access(token)?;
        let id = claims.user_id()?;

        let db = state.db.read().await;
        let user = db
            .get_user(id)
            .map_err(|_| ApiError::unauthorized("account no longer exists"))?;
        if !user.active {
            return Err(ApiError::unauthorized("account is disabled"));
        }
        Ok(Self {
            id,
            email: user.email.clone(),
            role: user.role,
            session: claims.sid,
        })
    }
}

// =============================================================================
// BODIES AND QUERIES
// =============================================================================

/// `Json<T>` whose failures are `VALIDATION_ERROR` (or `PAYLOAD_TOO_LARGE`).
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(rejection.body_text())
    } else {
        ApiError::validation(rejection.body_text())
    }
}

/// `Query<T>` whose failures are `VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| ApiError::validation(rejection.body_text()))
    }
}

/// A numeric record id from the path. Anything else is `INVALID_ID`.
#[derive(Debug, Clone, Copy)]
pub struct PathId<I>(pub I);

impl<I, S> FromRequestParts<S> for PathId<I>
where
    I: From<u64> + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        raw.trim()
            .parse::<u64>()
            .map(|id| Self(I::from(id)))
            .map_err(|_| ApiError::InvalidId(raw))
    }
}

/// Paging and sorting, shared by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListQuery {
    pub fn params(self) -> ApiResult<ListParams> {
        Ok(ListParams::new(
            self.page,
            self.limit,
            self.sort_by.filter(|s| !s.trim().is_empty()),
            self.order.as_deref(),
        )?)
    }
}

/// Parses an optional enum filter such as `?status=active`.
pub fn parse_filter<T>(raw: Option<String>) -> ApiResult<Option<T>>
where
    T: FromStr<Err = CoreError>,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(value.parse()?)),
    }
}

/// Parses an optional RFC 3339 timestamp filter.
pub fn parse_timestamp(field: &'static str, raw: Option<String>) -> ApiResult<Option<DateTime<Utc>>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| {
                CoreError::validation(field, format!("'{}' is not an RFC 3339 timestamp", value))
                    .into()
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseclerk_core::CaseStatus;

    #[test]
    fn empty_filter_is_none() {
        assert_eq!(parse_filter::<CaseStatus>(None).unwrap(), None);
        assert_eq!(parse_filter::<CaseStatus>(Some(" ".into())).unwrap(), None);
    }

    #[test]
    fn unknown_filter_value_is_rejected() {
        let err = parse_filter::<CaseStatus>(Some("archived".into())).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timestamps_accept_offsets() {
        let t = parse_timestamp("from", Some("2024-03-01T10:00:00+01:00".into()))
            .unwrap()
            .unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert!(parse_timestamp("from", Some("yesterday".into())).is_err());
    }

    #[test]
    fn list_query_validates_limit() {
        let query = ListQuery {
            limit: Some(1000),
            ..ListQuery::default()
        };
        assert!(query.params().is_err());
    }
}
