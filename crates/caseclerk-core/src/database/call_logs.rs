use chrono::{DateTime, Utc};

use super::{Database, list_sorted};
use crate::error::{CoreError, CoreResult};
use crate::model::{
    CallInsights, CallLogFilter, CallLogSortKey, CallLogUpdate, InitiateCall, NewCallLog,
};
use crate::query::{ListParams, Page, SortOrder};
use crate::{CallLog, CallLogId, CallStatus, UserId};

impl Database {
    pub fn create_call_log(
        &mut self,
        form: NewCallLog,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CoreResult<CallLog> {
        let form = form.normalized()?;
        self.ensure_case(form.case_id)?;
        Ok(self
            .call_logs
            .insert(CallLog::from_form(form, created_by, now)))
    }

    pub fn get_call_log(&self, id: CallLogId) -> CoreResult<&CallLog> {
        self.call_logs.get(id)
    }

    pub fn update_call_log(
        &mut self,
        id: CallLogId,
        update: CallLogUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<CallLog> {
        let update = update.normalized()?;
        let current = self.call_logs.get(id)?;
        if let Some(status) = update.status {
            current.check_status_change(status)?;
        }
        if let Some(case_id) = update.case_id {
            self.ensure_case(case_id)?;
        }
        let call = self.call_logs.get_mut(id)?;
        call.apply(update, now);
        Ok(call.clone())
    }

    pub fn delete_call_log(&mut self, id: CallLogId) -> CoreResult<CallLog> {
        self.call_logs.remove(id)
    }

    pub fn list_call_logs(
        &self,
        filter: &CallLogFilter,
        params: &ListParams,
    ) -> CoreResult<Page<CallLog>> {
        let key = CallLogSortKey::parse(params.sort_by.as_deref())?;
        Ok(list_sorted(
            &self.call_logs,
            params,
            |c| filter.matches(c),
            |a, b, order| key.compare(a, b, order),
            params.order_or(SortOrder::Desc),
        ))
    }

    /// Opens a call that starts now.
    pub fn initiate_call(
        &mut self,
        request: InitiateCall,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CoreResult<CallLog> {
        self.create_call_log(request.into_form(now), created_by, now)
    }

    pub fn end_call(
        &mut self,
        id: CallLogId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<CallLog> {
        let call = self.call_logs.get_mut(id)?;
        call.finish(notes, now)?;
        Ok(call.clone())
    }

    /// Attaches a transcript and its insights to a finished call.
    pub fn apply_call_processing(
        &mut self,
        id: CallLogId,
        transcript: String,
        insights: CallInsights,
        now: DateTime<Utc>,
    ) -> CoreResult<CallLog> {
        let call = self.call_logs.get_mut(id)?;
        if call.status != CallStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "call {} is {}, only completed calls can be processed",
                call.id, call.status
            )));
        }
        call.transcript = Some(transcript);
        call.ai_insights = Some(insights);
        call.updated_at = now;
        Ok(call.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ai;
    use crate::CallDirection;
    use chrono::Duration;

    fn initiate() -> InitiateCall {
        InitiateCall {
            case_id: None,
            contact_name: "Jane Smith".to_string(),
            phone_number: "+1 (555) 010-0199".to_string(),
            direction: CallDirection::Inbound,
            participants: Vec::new(),
        }
    }

    #[test]
    fn call_lifecycle() {
        let mut db = Database::new();
        let call = db.initiate_call(initiate(), None, t0()).unwrap();
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.started_at, Some(t0()));

        let err = db
            .apply_call_processing(call.id, String::new(), ai::call_insights(""), t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let later = t0() + Duration::seconds(95);
        let ended = db
            .end_call(call.id, Some("Client agreed to settle".to_string()), later)
            .unwrap();
        assert_eq!(ended.status, CallStatus::Completed);
        assert_eq!(ended.duration_seconds, Some(95));
        assert_eq!(ended.notes.as_deref(), Some("Client agreed to settle"));

        let transcript = ai::transcribe_audio("call.wav", 160_000);
        let insights = ai::call_insights(&transcript.text);
        let processed = db
            .apply_call_processing(call.id, transcript.text, insights, later)
            .unwrap();
        assert!(processed.transcript.is_some());
        assert!(processed.ai_insights.is_some());
    }

    #[test]
    fn ending_twice_is_an_invalid_state() {
        let mut db = Database::new();
        let call = db.initiate_call(initiate(), None, t0()).unwrap();
        db.end_call(call.id, None, t0()).unwrap();
        assert!(matches!(
            db.end_call(call.id, None, t0()),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn bad_phone_number_is_rejected() {
        let mut db = Database::new();
        let mut request = initiate();
        request.phone_number = "call me".to_string();
        assert!(db.initiate_call(request, None, t0()).is_err());
    }

    #[test]
    fn update_checks_case_reference() {
        let (mut db, case) = with_case("CV-1");
        let call = db.initiate_call(initiate(), None, t0()).unwrap();
        let link = CallLogUpdate {
            case_id: Some(Some(case.id)),
            ..CallLogUpdate::default()
        };
        assert_eq!(
            db.update_call_log(call.id, link, t0()).unwrap().case_id,
            Some(case.id)
        );
        let dangling = CallLogUpdate {
            case_id: Some(Some(crate::CaseId(99))),
            ..CallLogUpdate::default()
        };
        assert!(db.update_call_log(call.id, dangling, t0()).is_err());
    }

    #[test]
    fn update_cannot_complete_or_reopen_a_call() {
        let mut db = Database::new();
        let call = db.initiate_call(initiate(), None, t0()).unwrap();
        let complete = CallLogUpdate {
            status: Some(CallStatus::Completed),
            ..CallLogUpdate::default()
        };
        let err = db.update_call_log(call.id, complete, t0()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert_eq!(db.get_call_log(call.id).unwrap().status, CallStatus::InProgress);

        db.end_call(call.id, None, t0()).unwrap();
        let reopen = CallLogUpdate {
            status: Some(CallStatus::InProgress),
            notes: Some(Some("reopened".to_string())),
            ..CallLogUpdate::default()
        };
        assert!(db.update_call_log(call.id, reopen, t0()).is_err());
        assert_eq!(db.get_call_log(call.id).unwrap().notes, None);
    }

    #[test]
    fn list_filters_by_status() {
        let mut db = Database::new();
        let open = db.initiate_call(initiate(), None, t0()).unwrap();
        let closed = db.initiate_call(initiate(), None, t0()).unwrap();
        db.end_call(closed.id, None, t0()).unwrap();

        let filter = CallLogFilter {
            status: Some(CallStatus::InProgress),
            ..CallLogFilter::default()
        };
        let page = db.list_call_logs(&filter, &ListParams::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, open.id);
    }
}
