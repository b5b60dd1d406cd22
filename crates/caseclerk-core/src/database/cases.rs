use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Database, list_sorted};
use crate::error::{CoreError, CoreResult};
use crate::model::{CaseFilter, CaseSortKey, CaseUpdate, NewCase};
use crate::query::{ListParams, Page, SortOrder};
use crate::{CalendarEvent, Case, CaseId, CasePriority, CaseStatus, Document, UserId};

/// Hearings and events count as upcoming inside this window.
const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStats {
    pub total: u64,
    pub by_status: BTreeMap<CaseStatus, u64>,
    pub by_priority: BTreeMap<CasePriority, u64>,
    pub upcoming_hearings: u64,
    pub upcoming_events: u64,
    pub documents: u64,
    pub call_logs: u64,
}

impl Database {
    pub fn create_case(
        &mut self,
        form: NewCase,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CoreResult<Case> {
        let form = form.normalized()?;
        self.ensure_unique_case_number(&form.case_number, None)?;
        Ok(self.cases.insert(Case::from_form(form, created_by, now)))
    }

    pub fn get_case(&self, id: CaseId) -> CoreResult<&Case> {
        self.cases.get(id)
    }

    pub fn update_case(
        &mut self,
        id: CaseId,
        update: CaseUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<Case> {
        let update = update.normalized()?;
        self.cases.get(id)?;
        if let Some(case_number) = &update.case_number {
            self.ensure_unique_case_number(case_number, Some(id))?;
        }
        let case = self.cases.get_mut(id)?;
        case.apply(update, now);
        Ok(case.clone())
    }

    /// Removes a case with its documents and events. Call logs stay on
    /// record but lose the link.
    pub fn delete_case(&mut self, id: CaseId) -> CoreResult<Case> {
        let case = self.cases.remove(id)?;
        let removed_documents = self.documents.retain(|d| d.case_id != Some(id));
        for document_id in removed_documents {
            self.blobs.remove(&document_id);
        }
        self.events.retain(|e| e.case_id != Some(id));
        for call in self.call_logs.iter_mut().filter(|c| c.case_id == Some(id)) {
            call.case_id = None;
        }
        Ok(case)
    }

    pub fn list_cases(&self, filter: &CaseFilter, params: &ListParams) -> CoreResult<Page<Case>> {
        let key = CaseSortKey::parse(params.sort_by.as_deref())?;
        Ok(list_sorted(
            &self.cases,
            params,
            |c| filter.matches(c),
            |a, b, order| key.compare(a, b, order),
            params.order_or(SortOrder::Desc),
        ))
    }

    /// Documents and events linked to a case, in id order.
    pub fn case_records(&self, id: CaseId) -> CoreResult<(Vec<Document>, Vec<CalendarEvent>)> {
        self.cases.get(id)?;
        let documents = self
            .documents
            .iter()
            .filter(|d| d.case_id == Some(id))
            .cloned()
            .collect();
        let events = self
            .events
            .iter()
            .filter(|e| e.case_id == Some(id))
            .cloned()
            .collect();
        Ok((documents, events))
    }

    pub fn case_stats(&self, now: DateTime<Utc>) -> CaseStats {
        let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
        let mut by_status: BTreeMap<CaseStatus, u64> =
            CaseStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_priority: BTreeMap<CasePriority, u64> =
            CasePriority::ALL.iter().map(|p| (*p, 0)).collect();
        let mut upcoming_hearings = 0;
        for case in self.cases.iter() {
            *by_status.entry(case.status).or_default() += 1;
            *by_priority.entry(case.priority).or_default() += 1;
            if case.next_hearing.is_some_and(|h| h >= now && h <= horizon) {
                upcoming_hearings += 1;
            }
        }
        let upcoming_events = self
            .events
            .iter()
            .filter(|e| e.is_pending())
            .filter(|e| e.starts_within(Some(now), Some(horizon)))
            .count() as u64;
        CaseStats {
            total: self.cases.len() as u64,
            by_status,
            by_priority,
            upcoming_hearings,
            upcoming_events,
            documents: self.documents.len() as u64,
            call_logs: self.call_logs.len() as u64,
        }
    }

    fn ensure_unique_case_number(&self, case_number: &str, except: Option<CaseId>) -> CoreResult<()> {
        let taken = self
            .cases
            .iter()
            .any(|c| Some(c.id) != except && c.case_number.eq_ignore_ascii_case(case_number));
        if taken {
            return Err(CoreError::duplicate("case", "case_number", case_number));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::model::{NewCallLog, NewDocument, NewEvent};
    use crate::{CallStatus, EventStatus};

    #[test]
    fn duplicate_case_number_is_rejected() {
        let (mut db, _) = with_case("CV-1");
        let err = db
            .create_case(new_case("cv-1", CaseStatus::Pending), None, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::Duplicate { field: "case_number", .. }));
    }

    #[test]
    fn update_cannot_steal_a_case_number() {
        let (mut db, first) = with_case("CV-1");
        let second = db
            .create_case(new_case("CV-2", CaseStatus::Active), None, t0())
            .unwrap();
        let steal = CaseUpdate {
            case_number: Some("CV-1".to_string()),
            ..CaseUpdate::default()
        };
        assert!(db.update_case(second.id, steal, t0()).is_err());

        let keep = CaseUpdate {
            case_number: Some("CV-1".to_string()),
            title: Some("Renamed".to_string()),
            ..CaseUpdate::default()
        };
        let updated = db.update_case(first.id, keep, t0()).unwrap();
        assert_eq!(updated.title, "Renamed");
    }

    #[test]
    fn list_filters_by_status() {
        let mut db = Database::new();
        for (n, status) in [
            ("A", CaseStatus::Active),
            ("B", CaseStatus::Pending),
            ("C", CaseStatus::Active),
            ("D", CaseStatus::Closed),
        ] {
            db.create_case(new_case(n, status), None, t0()).unwrap();
        }
        let filter = CaseFilter {
            status: Some(CaseStatus::Active),
            ..CaseFilter::default()
        };
        let page = db.list_cases(&filter, &ListParams::default()).unwrap();
        assert_eq!(page.pagination.total, 2);
        assert!(page.items.iter().all(|c| c.status == CaseStatus::Active));
    }

    #[test]
    fn list_sorts_by_case_number() {
        let mut db = Database::new();
        for n in ["B", "C", "A"] {
            db.create_case(new_case(n, CaseStatus::Active), None, t0())
                .unwrap();
        }
        let params =
            ListParams::new(None, None, Some("case_number".to_string()), Some("asc")).unwrap();
        let page = db.list_cases(&CaseFilter::default(), &params).unwrap();
        let numbers: Vec<_> = page.items.iter().map(|c| c.case_number.as_str()).collect();
        assert_eq!(numbers, vec!["A", "B", "C"]);
    }

    #[test]
    fn delete_cascades_to_documents_and_events() {
        let (mut db, case) = with_case("CV-1");
        let doc = NewDocument {
            case_id: Some(case.id),
            file_name: "brief.txt".to_string(),
            mime_type: "text/plain".to_string(),
            ..NewDocument::default()
        };
        let doc = db.create_document(doc, b"brief".to_vec(), None, t0()).unwrap();
        let mut event = NewEvent::new("Hearing", t0());
        event.case_id = Some(case.id);
        db.create_event(event, None, t0()).unwrap();
        let call = NewCallLog {
            case_id: Some(case.id),
            contact_name: "Opposing counsel".to_string(),
            phone_number: "555-0100".to_string(),
            status: CallStatus::Completed,
            ..NewCallLog::default()
        };
        let call = db.create_call_log(call, None, t0()).unwrap();

        let (documents, events) = db.case_records(case.id).unwrap();
        assert_eq!((documents.len(), events.len()), (1, 1));

        db.delete_case(case.id).unwrap();

        let counts = db.counts();
        assert_eq!((counts.cases, counts.documents, counts.calendar_events), (0, 0, 0));
        assert!(db.document_content(doc.id).is_err());
        assert_eq!(db.get_call_log(call.id).unwrap().case_id, None);
    }

    #[test]
    fn stats_count_every_status() {
        let mut db = Database::new();
        let mut form = new_case("A", CaseStatus::Active);
        form.next_hearing = Some(t0() + Duration::days(2));
        db.create_case(form, None, t0()).unwrap();
        let mut late = new_case("B", CaseStatus::Closed);
        late.next_hearing = Some(t0() + Duration::days(30));
        db.create_case(late, None, t0()).unwrap();

        let stats = db.case_stats(t0());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status[&CaseStatus::Active], 1);
        assert_eq!(stats.by_status[&CaseStatus::Settled], 0);
        assert_eq!(stats.by_priority[&CasePriority::Medium], 2);
        assert_eq!(stats.upcoming_hearings, 1);
    }

    #[test]
    fn stats_and_upcoming_agree_on_pending_events() {
        let mut db = Database::new();
        for (title, status) in [
            ("Hearing", EventStatus::Scheduled),
            ("Moved deposition", EventStatus::Rescheduled),
            ("Dropped mediation", EventStatus::Cancelled),
        ] {
            let mut event = NewEvent::new(title, t0() + Duration::days(1));
            event.status = status;
            db.create_event(event, None, t0()).unwrap();
        }

        let upcoming = db.upcoming_events(t0(), 7).unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(db.case_stats(t0()).upcoming_events, upcoming.len() as u64);
    }
}
