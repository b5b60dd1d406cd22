//! Hearings, deadlines and meetings on the practice calendar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{
    double_option, matches_search, normalize_tags, optional_text, patch_optional_text,
    required_text,
};
use crate::error::{CoreError, CoreResult};
use crate::query::SortOrder;
use crate::{CaseId, EventId, UserId};

const MAX_TITLE_LEN: usize = 256;

/// Four weeks.
pub const MAX_REMINDER_MINUTES: u32 = 40_320;

string_enum! {
    pub enum EventType {
        Hearing => "hearing",
        Deadline => "deadline",
        Consultation => "consultation",
        Meeting => "meeting",
        Deposition => "deposition",
        Filing => "filing",
        Reminder => "reminder",
        Other => "other",
    }
    default = Other
}

string_enum! {
    pub enum EventStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        Rescheduled => "rescheduled",
    }
    default = Scheduled
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub case_id: Option<CaseId>,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub reminder_minutes: Option<u32>,
    pub status: EventStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn from_form(form: NewEvent, created_by: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: EventId(0),
            case_id: form.case_id,
            title: form.title,
            description: form.description,
            event_type: form.event_type,
            start_time: form.start_time,
            end_time: form.end_time,
            all_day: form.all_day,
            location: form.location,
            attendees: form.attendees,
            reminder_minutes: form.reminder_minutes,
            status: form.status,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an update, then re-checks the time window.
    pub fn apply(&mut self, update: EventUpdate, now: DateTime<Utc>) -> CoreResult<()> {
        let mut next = self.clone();
        if let Some(title) = update.title {
            next.title = title;
        }
        patch_optional_text(&mut next.description, update.description);
        patch_optional_text(&mut next.location, update.location);
        if let Some(case_id) = update.case_id {
            next.case_id = case_id;
        }
        if let Some(event_type) = update.event_type {
            next.event_type = event_type;
        }
        if let Some(start_time) = update.start_time {
            next.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            next.end_time = end_time;
        }
        if let Some(all_day) = update.all_day {
            next.all_day = all_day;
        }
        if let Some(attendees) = update.attendees {
            next.attendees = attendees;
        }
        if let Some(reminder) = update.reminder_minutes {
            next.reminder_minutes = reminder;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        check_window(next.start_time, next.end_time)?;
        check_reminder(next.reminder_minutes)?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    /// Scheduled or rescheduled; still expected to happen.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, EventStatus::Scheduled | EventStatus::Rescheduled)
    }

    /// True when the event starts inside `[from, to]` (either bound optional).
    pub fn starts_within(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
        from.is_none_or(|f| self.start_time >= f) && to.is_none_or(|t| self.start_time <= t)
    }
}

fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> CoreResult<()> {
    match end {
        Some(end) if end < start => Err(CoreError::validation(
            "end_time",
            "must not be before start_time",
        )),
        _ => Ok(()),
    }
}

fn check_reminder(reminder: Option<u32>) -> CoreResult<()> {
    match reminder {
        Some(minutes) if minutes > MAX_REMINDER_MINUTES => Err(CoreError::validation(
            "reminder_minutes",
            format!("must be at most {}", MAX_REMINDER_MINUTES),
        )),
        _ => Ok(()),
    }
}

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    #[serde(default)]
    pub case_id: Option<CaseId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub reminder_minutes: Option<u32>,
    #[serde(default)]
    pub status: EventStatus,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            case_id: None,
            title: title.into(),
            description: None,
            event_type: EventType::default(),
            start_time,
            end_time: None,
            all_day: false,
            location: None,
            attendees: Vec::new(),
            reminder_minutes: None,
            status: EventStatus::default(),
        }
    }

    pub fn normalized(self) -> CoreResult<Self> {
        check_window(self.start_time, self.end_time)?;
        check_reminder(self.reminder_minutes)?;
        Ok(Self {
            title: required_text("title", &self.title, MAX_TITLE_LEN)?,
            description: optional_text(self.description),
            location: optional_text(self.location),
            attendees: normalize_tags(self.attendees),
            ..self
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub case_id: Option<Option<CaseId>>,
    pub event_type: Option<EventType>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub all_day: Option<bool>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub location: Option<Option<String>>,
    pub attendees: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub reminder_minutes: Option<Option<u32>>,
    pub status: Option<EventStatus>,
}

impl EventUpdate {
    pub fn normalized(mut self) -> CoreResult<Self> {
        if let Some(title) = &self.title {
            self.title = Some(required_text("title", title, MAX_TITLE_LEN)?);
        }
        self.attendees = self.attendees.map(normalize_tags);
        Ok(self)
    }
}

// =============================================================================
// LISTING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub case_id: Option<CaseId>,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl EventFilter {
    pub fn validate(&self) -> CoreResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && to < from
        {
            return Err(CoreError::validation("to", "must not be before from"));
        }
        Ok(())
    }

    pub fn matches(&self, event: &CalendarEvent) -> bool {
        if self.case_id.is_some() && self.case_id != event.case_id {
            return false;
        }
        if self.event_type.is_some_and(|t| t != event.event_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != event.status) {
            return false;
        }
        if !event.starts_within(self.from, self.to) {
            return false;
        }
        match &self.search {
            Some(search) => matches_search(
                search,
                &[
                    Some(event.title.as_str()),
                    event.description.as_deref(),
                    event.location.as_deref(),
                ],
            ),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSortKey {
    #[default]
    StartTime,
    CreatedAt,
    Title,
}

impl EventSortKey {
    pub fn parse(raw: Option<&str>) -> CoreResult<Self> {
        Ok(match raw.map(str::trim) {
            None | Some("") | Some("start_time") => Self::StartTime,
            Some("created_at") => Self::CreatedAt,
            Some("title") => Self::Title,
            Some(other) => {
                return Err(CoreError::validation(
                    "sort_by",
                    format!("cannot sort events by '{}'", other),
                ));
            }
        })
    }

    /// Calendars read forward in time, so the natural order is ascending.
    pub fn default_order(&self) -> SortOrder {
        match self {
            Self::StartTime | Self::Title => SortOrder::Asc,
            Self::CreatedAt => SortOrder::Desc,
        }
    }

    pub fn compare(&self, a: &CalendarEvent, b: &CalendarEvent, order: SortOrder) -> Ordering {
        let primary = match self {
            Self::StartTime => a.start_time.cmp(&b.start_time),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        order.apply(primary.then(a.id.cmp(&b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn end_before_start_is_rejected() {
        let now = Utc::now();
        let mut form = NewEvent::new("Hearing", now);
        form.end_time = Some(now - Duration::hours(1));
        assert!(form.normalized().is_err());
    }

    #[test]
    fn oversized_reminder_is_rejected() {
        let mut form = NewEvent::new("Deadline", Utc::now());
        form.reminder_minutes = Some(MAX_REMINDER_MINUTES + 1);
        assert!(form.normalized().is_err());
    }

    #[test]
    fn update_keeps_window_consistent() {
        let now = Utc::now();
        let form = NewEvent::new("Deposition", now).normalized().unwrap();
        let mut event = CalendarEvent::from_form(form, None, now);

        let bad = EventUpdate {
            end_time: Some(Some(now - Duration::hours(2))),
            ..EventUpdate::default()
        };
        assert!(event.apply(bad, now).is_err());
        assert_eq!(event.end_time, None, "failed update must not leak");

        let good = EventUpdate {
            end_time: Some(Some(now + Duration::hours(2))),
            status: Some(EventStatus::Rescheduled),
            ..EventUpdate::default()
        };
        event.apply(good, now).unwrap();
        assert_eq!(event.status, EventStatus::Rescheduled);
    }

    #[test]
    fn window_filter() {
        let now = Utc::now();
        let event = CalendarEvent::from_form(
            NewEvent::new("Hearing", now + Duration::days(3)),
            None,
            now,
        );
        let inside = EventFilter {
            from: Some(now),
            to: Some(now + Duration::days(7)),
            ..EventFilter::default()
        };
        let outside = EventFilter {
            to: Some(now + Duration::days(1)),
            ..EventFilter::default()
        };
        assert!(inside.matches(&event));
        assert!(!outside.matches(&event));
    }
}
