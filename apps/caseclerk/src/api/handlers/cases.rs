use axum::extract::State;
use axum::http::StatusCode;
use caseclerk_core::ai::{CaseAnalysis, analyze_case};
use caseclerk_core::database::CaseStats;
use caseclerk_core::model::{CaseFilter, CaseUpdate, NewCase};
use caseclerk_core::{Case, CaseId};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::extract::{AuthUser, ListQuery, PathId, ValidJson, ValidQuery, parse_filter};
use crate::api::response::{Envelope, created, deleted, ok, paged};

#[derive(Debug, Default, Deserialize)]
pub struct CaseQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub case_type: Option<String>,
    pub assigned_attorney: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl CaseQuery {
    fn filter(self) -> ApiResult<CaseFilter> {
        Ok(CaseFilter {
            status: parse_filter(self.status)?,
            priority: parse_filter(self.priority)?,
            case_type: parse_filter(self.case_type)?,
            assigned_attorney: self.assigned_attorney,
            tag: self.tag,
            search: self.search,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(list): ValidQuery<ListQuery>,
    ValidQuery(query): ValidQuery<CaseQuery>,
) -> ApiResult<Envelope<Vec<Case>>> {
    let (filter, params) = (query.filter()?, list.params()?);
    let page = state.db.read().await.list_cases(&filter, &params)?;
    Ok(paged(page))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<NewCase>,
) -> ApiResult<(StatusCode, Envelope<Case>)> {
    let case = state
        .db
        .write()
        .await
        .create_case(form, Some(auth.id), Utc::now())?;
    tracing::info!(case_id = %case.id, case_number = %case.case_number, "case created");
    Ok(created(case))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CaseId>,
) -> ApiResult<Envelope<Case>> {
    let db = state.db.read().await;
    Ok(ok(db.get_case(id)?.clone()))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CaseId>,
    ValidJson(update): ValidJson<CaseUpdate>,
) -> ApiResult<Envelope<Case>> {
    let case = state.db.write().await.update_case(id, update, Utc::now())?;
    tracing::info!(case_id = %id, "case updated");
    Ok(ok(case))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CaseId>,
) -> ApiResult<Envelope<Value>> {
    state.db.write().await.delete_case(id)?;
    tracing::info!(case_id = %id, "case deleted");
    Ok(deleted(id))
}

pub async fn stats(State(state): State<AppState>, _auth: AuthUser) -> Envelope<CaseStats> {
    ok(state.db.read().await.case_stats(Utc::now()))
}

pub async fn analysis(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<CaseId>,
) -> ApiResult<Envelope<CaseAnalysis>> {
    let (case, documents, events) = {
        let db = state.db.read().await;
        let case = db.get_case(id)?.clone();
        let (documents, events) = db.case_records(id)?;
        (case, documents, events)
    };
    state.simulate_ai_latency().await;
    Ok(ok(analyze_case(&case, &documents, &events, Utc::now())))
}
