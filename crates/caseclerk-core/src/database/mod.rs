//! # Database
//!
//! The in-memory store behind every endpoint: five [`Collection`]s and the
//! raw bytes of uploaded documents.
//!
//! Operations take `now` from the caller instead of reading the clock, which
//! keeps this module deterministic and lets tests pin time.
//!
//! Relationships are plain foreign keys (`case_id`). They are checked on
//! write; deleting a case removes its documents and events and detaches its
//! call logs.

mod calendar;
mod call_logs;
mod cases;
mod documents;
mod users;

pub use calendar::MAX_UPCOMING_DAYS;
pub use cases::CaseStats;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::query::{ListParams, Page, SortOrder};
use crate::store::{Collection, Record};
use crate::{CalendarEvent, CallLog, Case, CaseId, Document, DocumentId, User};

/// The whole data set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    cases: Collection<Case>,
    documents: Collection<Document>,
    call_logs: Collection<CallLog>,
    events: Collection<CalendarEvent>,
    users: Collection<User>,
    blobs: BTreeMap<DocumentId, Vec<u8>>,
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCounts {
    pub cases: usize,
    pub documents: usize,
    pub call_logs: usize,
    pub calendar_events: usize,
    pub users: usize,
}

/// Flat, serializable form of a [`Database`].
///
/// Used by both snapshot backends and by JSON export. Records are listed in
/// id order, so equal databases produce equal snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cases: Vec<Case>,
    pub next_case_id: u64,
    pub documents: Vec<Document>,
    pub next_document_id: u64,
    pub call_logs: Vec<CallLog>,
    pub next_call_log_id: u64,
    pub calendar_events: Vec<CalendarEvent>,
    pub next_event_id: u64,
    pub users: Vec<User>,
    pub next_user_id: u64,
    pub blobs: Vec<(DocumentId, Vec<u8>)>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> DatabaseCounts {
        DatabaseCounts {
            cases: self.cases.len(),
            documents: self.documents.len(),
            call_logs: self.call_logs.len(),
            calendar_events: self.events.len(),
            users: self.users.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts() == DatabaseCounts::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cases: self.cases.iter().cloned().collect(),
            next_case_id: self.cases.next_id(),
            documents: self.documents.iter().cloned().collect(),
            next_document_id: self.documents.next_id(),
            call_logs: self.call_logs.iter().cloned().collect(),
            next_call_log_id: self.call_logs.next_id(),
            calendar_events: self.events.iter().cloned().collect(),
            next_event_id: self.events.next_id(),
            users: self.users.iter().cloned().collect(),
            next_user_id: self.users.next_id(),
            blobs: self
                .blobs
                .iter()
                .map(|(id, bytes)| (*id, bytes.clone()))
                .collect(),
        }
    }

    /// Rebuilds a database, refusing snapshots whose references dangle.
    pub fn from_snapshot(snapshot: Snapshot) -> CoreResult<Self> {
        let db = Self {
            cases: Collection::from_parts(snapshot.cases, snapshot.next_case_id),
            documents: Collection::from_parts(snapshot.documents, snapshot.next_document_id),
            call_logs: Collection::from_parts(snapshot.call_logs, snapshot.next_call_log_id),
            events: Collection::from_parts(snapshot.calendar_events, snapshot.next_event_id),
            users: Collection::from_parts(snapshot.users, snapshot.next_user_id),
            blobs: snapshot.blobs.into_iter().collect(),
        };
        db.check_references()?;
        Ok(db)
    }

    fn check_references(&self) -> CoreResult<()> {
        let dangling = self
            .documents
            .iter()
            .filter_map(|d| d.case_id)
            .chain(self.call_logs.iter().filter_map(|c| c.case_id))
            .chain(self.events.iter().filter_map(|e| e.case_id))
            .find(|id| !self.cases.contains(*id));
        if let Some(id) = dangling {
            return Err(CoreError::Format(format!(
                "snapshot references missing case {}",
                id
            )));
        }
        if let Some(id) = self.blobs.keys().find(|id| !self.documents.contains(**id)) {
            return Err(CoreError::Format(format!(
                "snapshot holds content for missing document {}",
                id
            )));
        }
        Ok(())
    }

    /// Fails with a validation error when `case_id` points nowhere.
    fn ensure_case(&self, case_id: Option<CaseId>) -> CoreResult<()> {
        match case_id {
            Some(id) if !self.cases.contains(id) => Err(CoreError::validation(
                "case_id",
                format!("case {} does not exist", id),
            )),
            _ => Ok(()),
        }
    }
}

/// Filters, sorts and pages a collection.
fn list_sorted<T: Record>(
    collection: &Collection<T>,
    params: &ListParams,
    keep: impl Fn(&T) -> bool,
    compare: impl Fn(&T, &T, SortOrder) -> std::cmp::Ordering,
    order: SortOrder,
) -> Page<T> {
    let mut items: Vec<T> = collection.iter().filter(|r| keep(r)).cloned().collect();
    items.sort_by(|a, b| compare(a, b, order));
    params.paginate(items)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};

    use super::Database;
    use crate::model::NewCase;
    use crate::{Case, CaseStatus};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn new_case(number: &str, status: CaseStatus) -> NewCase {
        NewCase {
            case_number: number.to_string(),
            title: format!("Matter {}", number),
            client_name: "Acme Corp".to_string(),
            status,
            ..NewCase::default()
        }
    }

    pub fn with_case(number: &str) -> (Database, Case) {
        let mut db = Database::new();
        let case = db
            .create_case(new_case(number, CaseStatus::Active), None, t0())
            .unwrap();
        (db, case)
    }
}
