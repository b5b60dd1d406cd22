//! Telephone calls with clients, courts and opposing counsel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{
    double_option, matches_search, normalize_tags, optional_text, patch_optional_text,
    required_text,
};
use crate::error::{CoreError, CoreResult};
use crate::query::SortOrder;
use crate::{CallLogId, CaseId, UserId};

const MAX_NAME_LEN: usize = 256;

string_enum! {
    pub enum CallDirection {
        Inbound => "inbound",
        Outbound => "outbound",
    }
    default = Outbound
}

string_enum! {
    pub enum CallStatus {
        Scheduled => "scheduled",
        InProgress => "in_progress",
        Completed => "completed",
        Missed => "missed",
        Cancelled => "cancelled",
    }
    default = Completed
}

string_enum! {
    pub enum Sentiment {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
    default = Neutral
}

/// Output of call processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInsights {
    pub summary: String,
    pub action_items: Vec<String>,
    pub key_topics: Vec<String>,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: CallLogId,
    pub case_id: Option<CaseId>,
    pub contact_name: String,
    pub phone_number: String,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    pub participants: Vec<String>,
    pub notes: Option<String>,
    pub transcript: Option<String>,
    pub ai_insights: Option<CallInsights>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallLog {
    pub fn from_form(form: NewCallLog, created_by: Option<UserId>, now: DateTime<Utc>) -> Self {
        let duration_seconds = form
            .duration_seconds
            .or_else(|| span_seconds(form.started_at, form.ended_at));
        Self {
            id: CallLogId(0),
            case_id: form.case_id,
            contact_name: form.contact_name,
            phone_number: form.phone_number,
            direction: form.direction,
            status: form.status,
            started_at: form.started_at,
            ended_at: form.ended_at,
            duration_seconds,
            participants: form.participants,
            notes: form.notes,
            transcript: None,
            ai_insights: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: CallLogUpdate, now: DateTime<Utc>) {
        if let Some(contact_name) = update.contact_name {
            self.contact_name = contact_name;
        }
        if let Some(phone_number) = update.phone_number {
            self.phone_number = phone_number;
        }
        if let Some(case_id) = update.case_id {
            self.case_id = case_id;
        }
        if let Some(direction) = update.direction {
            self.direction = direction;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(participants) = update.participants {
            self.participants = participants;
        }
        patch_optional_text(&mut self.notes, update.notes);
        self.updated_at = now;
    }

    /// Checks a status change requested through an update. Calls start
    /// through `initiate` and end through `finish`; an update may only
    /// cancel, mark missed or reschedule a call that has not started.
    pub fn check_status_change(&self, to: CallStatus) -> CoreResult<()> {
        use CallStatus::{Cancelled, Missed, Scheduled};
        match (self.status, to) {
            (from, to) if from == to => Ok(()),
            (Scheduled, Missed | Cancelled) | (Missed | Cancelled, Scheduled) => Ok(()),
            (from, to) => Err(CoreError::InvalidState(format!(
                "call {} cannot move from {} to {} by update",
                self.id, from, to
            ))),
        }
    }

    /// Marks an in-progress call as finished.
    pub fn finish(&mut self, notes: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != CallStatus::InProgress {
            return Err(CoreError::InvalidState(format!(
                "call {} is {}, only in_progress calls can be ended",
                self.id, self.status
            )));
        }
        if let Some(started) = self.started_at
            && now < started
        {
            return Err(CoreError::InvalidState(format!(
                "call {} starts at {}, it cannot end before then",
                self.id,
                started.to_rfc3339()
            )));
        }
        let started = self.started_at.unwrap_or(now);
        self.ended_at = Some(now);
        self.duration_seconds = span_seconds(Some(started), Some(now));
        self.status = CallStatus::Completed;
        if let Some(notes) = optional_text(notes) {
            self.notes = Some(match self.notes.take() {
                Some(existing) => format!("{}\n{}", existing, notes),
                None => notes,
            });
        }
        self.updated_at = now;
        Ok(())
    }
}

fn span_seconds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<u64> {
    let (start, end) = (start?, end?);
    u64::try_from((end - start).num_seconds()).ok()
}

/// Phone numbers: 7 to 20 characters of digits and common separators.
pub fn validate_phone(raw: &str) -> CoreResult<String> {
    let phone = raw.trim();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !allowed || !(7..=20).contains(&phone.len()) || digits < 7 {
        return Err(CoreError::validation(
            "phone_number",
            format!("'{}' is not a phone number", phone),
        ));
    }
    Ok(phone.to_string())
}

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCallLog {
    #[serde(default)]
    pub case_id: Option<CaseId>,
    pub contact_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub direction: CallDirection,
    #[serde(default)]
    pub status: CallStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewCallLog {
    pub fn normalized(self) -> CoreResult<Self> {
        if let (Some(start), Some(end)) = (self.started_at, self.ended_at)
            && end < start
        {
            return Err(CoreError::validation(
                "ended_at",
                "must not be before started_at",
            ));
        }
        Ok(Self {
            case_id: self.case_id,
            contact_name: required_text("contact_name", &self.contact_name, MAX_NAME_LEN)?,
            phone_number: validate_phone(&self.phone_number)?,
            direction: self.direction,
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_seconds: self.duration_seconds,
            participants: normalize_tags(self.participants),
            notes: optional_text(self.notes),
        })
    }
}

/// Payload of `initiate`: a call that starts now.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiateCall {
    #[serde(default)]
    pub case_id: Option<CaseId>,
    pub contact_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub direction: CallDirection,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl InitiateCall {
    pub fn into_form(self, now: DateTime<Utc>) -> NewCallLog {
        NewCallLog {
            case_id: self.case_id,
            contact_name: self.contact_name,
            phone_number: self.phone_number,
            direction: self.direction,
            status: CallStatus::InProgress,
            started_at: Some(now),
            ended_at: None,
            duration_seconds: None,
            participants: self.participants,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallLogUpdate {
    pub contact_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub case_id: Option<Option<CaseId>>,
    pub direction: Option<CallDirection>,
    pub status: Option<CallStatus>,
    pub participants: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub notes: Option<Option<String>>,
}

impl CallLogUpdate {
    pub fn normalized(mut self) -> CoreResult<Self> {
        if let Some(name) = &self.contact_name {
            self.contact_name = Some(required_text("contact_name", name, MAX_NAME_LEN)?);
        }
        if let Some(phone) = &self.phone_number {
            self.phone_number = Some(validate_phone(phone)?);
        }
        self.participants = self.participants.map(normalize_tags);
        Ok(self)
    }
}

// =============================================================================
// LISTING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLogFilter {
    pub case_id: Option<CaseId>,
    pub status: Option<CallStatus>,
    pub direction: Option<CallDirection>,
    pub search: Option<String>,
}

impl CallLogFilter {
    pub fn matches(&self, call: &CallLog) -> bool {
        if self.case_id.is_some() && self.case_id != call.case_id {
            return false;
        }
        if self.status.is_some_and(|s| s != call.status) {
            return false;
        }
        if self.direction.is_some_and(|d| d != call.direction) {
            return false;
        }
        match &self.search {
            Some(search) => matches_search(
                search,
                &[
                    Some(call.contact_name.as_str()),
                    Some(call.phone_number.as_str()),
                    call.notes.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallLogSortKey {
    #[default]
    CreatedAt,
    StartedAt,
    Duration,
    ContactName,
}

impl CallLogSortKey {
    pub fn parse(raw: Option<&str>) -> CoreResult<Self> {
        Ok(match raw.map(str::trim) {
            None | Some("") | Some("created_at") => Self::CreatedAt,
            Some("started_at") => Self::StartedAt,
            Some("duration_seconds") | Some("duration") => Self::Duration,
            Some("contact_name") => Self::ContactName,
            Some(other) => {
                return Err(CoreError::validation(
                    "sort_by",
                    format!("cannot sort call logs by '{}'", other),
                ));
            }
        })
    }

    pub fn compare(&self, a: &CallLog, b: &CallLog, order: SortOrder) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::StartedAt => a.started_at.cmp(&b.started_at),
            Self::Duration => a.duration_seconds.cmp(&b.duration_seconds),
            Self::ContactName => a
                .contact_name
                .to_lowercase()
                .cmp(&b.contact_name.to_lowercase()),
        };
        order.apply(primary.then(a.id.cmp(&b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn initiated(now: DateTime<Utc>) -> CallLog {
        let form = InitiateCall {
            contact_name: "Jane Smith".to_string(),
            phone_number: "+1 (555) 010-2000".to_string(),
            ..InitiateCall::default()
        }
        .into_form(now)
        .normalized()
        .unwrap();
        CallLog::from_form(form, None, now)
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("+1 (555) 010-2000").is_ok());
        assert!(validate_phone("555-0100").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("12").is_err());
    }

    #[test]
    fn finishing_records_duration() {
        let start = Utc::now();
        let mut call = initiated(start);
        assert_eq!(call.status, CallStatus::InProgress);

        call.finish(Some("discussed settlement".to_string()), start + Duration::seconds(95))
            .unwrap();
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(call.duration_seconds, Some(95));
        assert_eq!(call.notes.as_deref(), Some("discussed settlement"));
    }

    #[test]
    fn finishing_twice_is_invalid() {
        let now = Utc::now();
        let mut call = initiated(now);
        call.finish(None, now).unwrap();
        assert!(matches!(call.finish(None, now), Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let now = Utc::now();
        let form = NewCallLog {
            contact_name: "Court clerk".to_string(),
            phone_number: "555-0100".to_string(),
            started_at: Some(now),
            ended_at: Some(now - Duration::minutes(1)),
            ..NewCallLog::default()
        };
        assert!(form.normalized().is_err());
    }

    #[test]
    fn ending_before_the_start_is_invalid() {
        let now = Utc::now();
        let form = NewCallLog {
            contact_name: "Court clerk".to_string(),
            phone_number: "555-0100".to_string(),
            status: CallStatus::InProgress,
            started_at: Some(now + Duration::days(1)),
            ..NewCallLog::default()
        }
        .normalized()
        .unwrap();
        let mut call = CallLog::from_form(form, None, now);
        assert!(matches!(call.finish(None, now), Err(CoreError::InvalidState(_))));
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.ended_at, None);

        call.finish(None, now + Duration::days(1) + Duration::seconds(30))
            .unwrap();
        assert_eq!(call.duration_seconds, Some(30));
    }

    #[test]
    fn updates_cannot_skip_the_call_lifecycle() {
        let now = Utc::now();
        let mut call = initiated(now);
        assert!(call.check_status_change(CallStatus::Completed).is_err());
        assert!(call.check_status_change(CallStatus::Cancelled).is_err());
        assert!(call.check_status_change(CallStatus::InProgress).is_ok());

        call.finish(None, now).unwrap();
        assert!(matches!(
            call.check_status_change(CallStatus::InProgress),
            Err(CoreError::InvalidState(_))
        ));

        call.status = CallStatus::Scheduled;
        assert!(call.check_status_change(CallStatus::Cancelled).is_ok());
        assert!(call.check_status_change(CallStatus::Missed).is_ok());
    }

    #[test]
    fn duration_is_derived_from_timestamps() {
        let now = Utc::now();
        let form = NewCallLog {
            contact_name: "Court clerk".to_string(),
            phone_number: "555-0100".to_string(),
            started_at: Some(now),
            ended_at: Some(now + Duration::minutes(2)),
            ..NewCallLog::default()
        }
        .normalized()
        .unwrap();
        let call = CallLog::from_form(form, None, now);
        assert_eq!(call.duration_seconds, Some(120));
    }
}
