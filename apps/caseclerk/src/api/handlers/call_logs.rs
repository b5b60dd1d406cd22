//! Call logs and the live call lifecycle: initiate, end, process.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use caseclerk_core::ai::{call_insights, transcribe_call};
use caseclerk_core::model::{CallLogFilter, CallLogUpdate, InitiateCall, NewCallLog};
use caseclerk_core::{CallLog, CallLogId, CallStatus, CaseId};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AuthUser, ListQuery, PathId, ValidJson, ValidQuery, parse_filter};
use crate::api::response::{Envelope, created, deleted, ok, paged};

#[derive(Debug, Default, Deserialize)]
pub struct CallLogQuery {
    pub case_id: Option<u64>,
    pub status: Option<String>,
    pub direction: Option<String>,
    pub search: Option<String>,
}

impl CallLogQuery {
    fn filter(self) -> ApiResult<CallLogFilter> {
        Ok(CallLogFilter {
            case_id: self.case_id.map(CaseId),
            status: parse_filter(self.status)?,
            direction: parse_filter(self.direction)?,
            search: self.search,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EndCallRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(list): ValidQuery<ListQuery>,
    ValidQuery(query): ValidQuery<CallLogQuery>,
) -> ApiResult<Envelope<Vec<CallLog>>> {
    let (filter, params) = (query.filter()?, list.params()?);
    let page = state.db.read().await.list_call_logs(&filter, &params)?;
    Ok(paged(page))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<NewCallLog>,
) -> ApiResult<(StatusCode, Envelope<CallLog>)> {
    let call = state
        .db
        .write()
        .await
        .create_call_log(form, Some(auth.id), Utc::now())?;
    tracing::info!(call_log_id = %call.id, "call log created");
    Ok(created(call))
}

pub async fn initiate(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<InitiateCall>,
) -> ApiResult<(StatusCode, Envelope<CallLog>)> {
    let call = state
        .db
        .write()
        .await
        .initiate_call(request, Some(auth.id), Utc::now())?;
    tracing::info!(call_log_id = %call.id, "call initiated");
    Ok(created(call))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CallLogId>,
) -> ApiResult<Envelope<CallLog>> {
    let db = state.db.read().await;
    Ok(ok(db.get_call_log(id)?.clone()))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CallLogId>,
    ValidJson(update): ValidJson<CallLogUpdate>,
) -> ApiResult<Envelope<CallLog>> {
    let call = state
        .db
        .write()
        .await
        .update_call_log(id, update, Utc::now())?;
    tracing::info!(call_log_id = %id, "call log updated");
    Ok(ok(call))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CallLogId>,
) -> ApiResult<Envelope<Value>> {
    state.db.write().await.delete_call_log(id)?;
    tracing::info!(call_log_id = %id, "call log deleted");
    Ok(deleted(id))
}

/// Ends an in-progress call. The body (`{"notes": ...}`) is optional.
pub async fn end(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CallLogId>,
    body: Bytes,
) -> ApiResult<Envelope<CallLog>> {
    let request: EndCallRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EndCallRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::validation(e.to_string()))?
    };
    let call = state
        .db
        .write()
        .await
        .end_call(id, request.notes, Utc::now())?;
    tracing::info!(call_log_id = %id, duration = ?call.duration_seconds, "call ended");
    Ok(ok(call))
}

/// Attaches a transcript and insights to a completed call.
pub async fn process(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CallLogId>,
) -> ApiResult<Envelope<CallLog>> {
    let call = state.db.read().await.get_call_log(id)?.clone();
    if call.status != CallStatus::Completed {
        return Err(ApiError::InvalidState(format!(
            "call {} is {}, only completed calls can be processed",
            call.id, call.status
        )));
    }
    state.simulate_ai_latency().await;
    let transcript = match call.transcript {
        Some(existing) => existing,
        None => transcribe_call(id, call.duration_seconds.unwrap_or_default()).text,
    };
    let insights = call_insights(&transcript);
    let call = state
        .db
        .write()
        .await
        .apply_call_processing(id, transcript, insights, Utc::now())?;
    tracing::info!(call_log_id = %id, sentiment = %call_sentiment(&call), "call processed");
    Ok(ok(call))
}

fn call_sentiment(call: &CallLog) -> &'static str {
    call.ai_insights
        .as_ref()
        .map(|i| i.sentiment.as_str())
        .unwrap_or("none")
}
