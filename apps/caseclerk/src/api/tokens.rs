//! # Tokens
//!
//! HS256 access and refresh tokens bound to an in-memory session.
//!
//! A session remembers the id (`jti`) of the one refresh token that may
//! still be exchanged. Exchanging it rotates the id; presenting an older
//! refresh token revokes the whole session, which also invalidates every
//! access token issued under it.

use caseclerk_core::credentials::random_id;
use caseclerk_core::{User, UserId, UserRole};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use subtle::ConstantTimeEq;

use super::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    /// Session id.
    pub sid: String,
    pub jti: String,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> ApiResult<UserId> {
        self.sub
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| ApiError::InvalidToken)
    }
}

/// Returned by login, register and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    refresh_jti: String,
    revoked: bool,
    expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a new session for `user`.
    pub fn issue(&self, user: &User) -> ApiResult<TokenPair> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> ApiResult<TokenPair> {
        let sid = random_id();
        let refresh_jti = random_id();
        let pair = self.sign_pair(user, &sid, &refresh_jti, now)?;
        self.sessions().insert(
            sid,
            Session {
                user_id: user.id,
                refresh_jti,
                revoked: false,
                expires_at: expiry(now, self.refresh_ttl),
            },
        );
        Ok(pair)
    }

    /// Checks an access token and the session behind it.
    pub fn verify_access(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.decode(token, TokenType::Access)?;
        self.ensure_live_session(&claims)?;
        Ok(claims)
    }

    /// Checks a refresh token without consuming it.
    pub fn verify_refresh(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.decode(token, TokenType::Refresh)?;
        self.ensure_live_session(&claims)?;
        Ok(claims)
    }

    /// Exchanges a verified refresh token for a new pair in the same session.
    ///
    /// A token whose id is no longer current revokes the session.
    pub fn rotate(&self, claims: &Claims, user: &User, now: DateTime<Utc>) -> ApiResult<TokenPair> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(&claims.sid)
            .ok_or_else(|| ApiError::unauthorized("session not found"))?;
        if session.revoked {
            return Err(ApiError::unauthorized("session has been revoked"));
        }
        let current: bool = session
            .refresh_jti
            .as_bytes()
            .ct_eq(claims.jti.as_bytes())
            .into();
        if !current {
            session.revoked = true;
            tracing::warn!(sid = %claims.sid, user_id = %session.user_id, "refresh token reuse, session revoked");
            return Err(ApiError::InvalidToken);
        }
        let refresh_jti = random_id();
        let pair = self.sign_pair(user, &claims.sid, &refresh_jti, now)?;
        session.refresh_jti = refresh_jti;
        session.expires_at = expiry(now, self.refresh_ttl);
        Ok(pair)
    }

    /// Logs a session out. Unknown ids are ignored.
    pub fn revoke(&self, sid: &str) {
        if let Some(session) = self.sessions().get_mut(sid) {
            session.revoked = true;
        }
    }

    /// Drops sessions whose refresh token has expired. Returns how many.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    fn ensure_live_session(&self, claims: &Claims) -> ApiResult<()> {
        match self.sessions().get(&claims.sid) {
            Some(session) if !session.revoked => Ok(()),
            Some(_) => Err(ApiError::unauthorized("session has been revoked")),
            None => Err(ApiError::unauthorized("session not found")),
        }
    }

    fn decode(&self, token: &str, expected: TokenType) -> ApiResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::InvalidToken,
            }
        })?;
        if data.claims.typ != expected {
            return Err(ApiError::InvalidToken);
        }
        Ok(data.claims)
    }

    fn sign_pair(
        &self,
        user: &User,
        sid: &str,
        refresh_jti: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<TokenPair> {
        let access = self.sign(user, sid, &random_id(), TokenType::Access, now, self.access_ttl)?;
        let refresh = self.sign(user, sid, refresh_jti, TokenType::Refresh, now, self.refresh_ttl)?;
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            token_type: "Bearer",
            expires_in: self.access_ttl.as_secs(),
        })
    }

    fn sign(
        &self,
        user: &User,
        sid: &str,
        jti: &str,
        typ: TokenType,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> ApiResult<String> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            sid: sid.to_string(),
            jti: jti.to_string(),
            typ,
            iat: now.timestamp(),
            exp: expiry(now, ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(ApiError::internal)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
