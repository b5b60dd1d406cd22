use axum::extract::State;
use axum::http::StatusCode;
use caseclerk_core::model::{EventFilter, EventUpdate, NewEvent};
use caseclerk_core::{CalendarEvent, CaseId, EventId};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::api::extract::{
    AuthUser, ListQuery, PathId, ValidJson, ValidQuery, parse_filter, parse_timestamp,
};
use crate::api::response::{Envelope, created, deleted, ok, paged};

const DEFAULT_UPCOMING_DAYS: u32 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub case_id: Option<u64>,
    pub event_type: Option<String>,
    pub status: Option<String>,
    /// RFC 3339.
    pub from: Option<String>,
    /// RFC 3339.
    pub to: Option<String>,
    pub search: Option<String>,
}

impl EventQuery {
    fn filter(self) -> ApiResult<EventFilter> {
        Ok(EventFilter {
            case_id: self.case_id.map(CaseId),
            event_type: parse_filter(self.event_type)?,
            status: parse_filter(self.status)?,
            from: parse_timestamp("from", self.from)?,
            to: parse_timestamp("to", self.to)?,
            search: self.search,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(list): ValidQuery<ListQuery>,
    ValidQuery(query): ValidQuery<EventQuery>,
) -> ApiResult<Envelope<Vec<CalendarEvent>>> {
    let (filter, params) = (query.filter()?, list.params()?);
    let page = state.db.read().await.list_events(&filter, &params)?;
    Ok(paged(page))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<NewEvent>,
) -> ApiResult<(StatusCode, Envelope<CalendarEvent>)> {
    let event = state
        .db
        .write()
        .await
        .create_event(form, Some(auth.id), Utc::now())?;
    tracing::info!(event_id = %event.id, start = %event.start_time, "calendar event created");
    Ok(created(event))
}

pub async fn upcoming(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(query): ValidQuery<UpcomingQuery>,
) -> ApiResult<Envelope<Vec<CalendarEvent>>> {
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    let events = state.db.read().await.upcoming_events(Utc::now(), days)?;
    Ok(ok(events))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<EventId>,
) -> ApiResult<Envelope<CalendarEvent>> {
    let db = state.db.read().await;
    Ok(ok(db.get_event(id)?.clone()))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<EventId>,
    ValidJson(update): ValidJson<EventUpdate>,
) -> ApiResult<Envelope<CalendarEvent>> {
    let event = state.db.write().await.update_event(id, update, Utc::now())?;
    tracing::info!(event_id = %id, "calendar event updated");
    Ok(ok(event))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<EventId>,
) -> ApiResult<Envelope<Value>> {
    state.db.write().await.delete_event(id)?;
    tracing::info!(event_id = %id, "calendar event deleted");
    Ok(deleted(id))
}
