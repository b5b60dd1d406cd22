use chrono::{DateTime, Duration, Utc};

use super::{Database, list_sorted};
use crate::error::{CoreError, CoreResult};
use crate::model::{EventFilter, EventSortKey, EventUpdate, NewEvent};
use crate::query::{ListParams, Page};
use crate::{CalendarEvent, EventId, UserId};

/// Widest window accepted by [`Database::upcoming_events`].
pub const MAX_UPCOMING_DAYS: u32 = 90;

impl Database {
    pub fn create_event(
        &mut self,
        form: NewEvent,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CoreResult<CalendarEvent> {
        let form = form.normalized()?;
        self.ensure_case(form.case_id)?;
        Ok(self
            .events
            .insert(CalendarEvent::from_form(form, created_by, now)))
    }

    pub fn get_event(&self, id: EventId) -> CoreResult<&CalendarEvent> {
        self.events.get(id)
    }

    pub fn update_event(
        &mut self,
        id: EventId,
        update: EventUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<CalendarEvent> {
        let update = update.normalized()?;
        self.events.get(id)?;
        if let Some(case_id) = update.case_id {
            self.ensure_case(case_id)?;
        }
        let event = self.events.get_mut(id)?;
        event.apply(update, now)?;
        Ok(event.clone())
    }

    pub fn delete_event(&mut self, id: EventId) -> CoreResult<CalendarEvent> {
        self.events.remove(id)
    }

    pub fn list_events(
        &self,
        filter: &EventFilter,
        params: &ListParams,
    ) -> CoreResult<Page<CalendarEvent>> {
        filter.validate()?;
        let key = EventSortKey::parse(params.sort_by.as_deref())?;
        Ok(list_sorted(
            &self.events,
            params,
            |e| filter.matches(e),
            |a, b, order| key.compare(a, b, order),
            params.order_or(key.default_order()),
        ))
    }

    /// Scheduled events starting in the next `days` days, soonest first.
    pub fn upcoming_events(&self, now: DateTime<Utc>, days: u32) -> CoreResult<Vec<CalendarEvent>> {
        if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
            return Err(CoreError::validation(
                "days",
                format!("must be between 1 and {}", MAX_UPCOMING_DAYS),
            ));
        }
        let horizon = now + Duration::days(i64::from(days));
        let mut events: Vec<CalendarEvent> = self
            .events
            .iter()
            .filter(|e| e.is_pending())
            .filter(|e| e.starts_within(Some(now), Some(horizon)))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::{CaseId, EventStatus, EventType};

    fn event(title: &str, start: DateTime<Utc>) -> NewEvent {
        let mut form = NewEvent::new(title, start);
        form.event_type = EventType::Hearing;
        form
    }

    #[test]
    fn list_defaults_to_start_time_ascending() {
        let mut db = Database::new();
        db.create_event(event("Later", t0() + Duration::days(3)), None, t0())
            .unwrap();
        db.create_event(event("Sooner", t0() + Duration::days(1)), None, t0())
            .unwrap();
        let page = db
            .list_events(&EventFilter::default(), &ListParams::default())
            .unwrap();
        let titles: Vec<_> = page.items.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let db = Database::new();
        let filter = EventFilter {
            from: Some(t0()),
            to: Some(t0() - Duration::days(1)),
            ..EventFilter::default()
        };
        assert!(db.list_events(&filter, &ListParams::default()).is_err());
    }

    #[test]
    fn upcoming_skips_past_cancelled_and_distant_events() {
        let mut db = Database::new();
        db.create_event(event("Yesterday", t0() - Duration::days(1)), None, t0())
            .unwrap();
        db.create_event(event("Next month", t0() + Duration::days(30)), None, t0())
            .unwrap();
        let mut cancelled = event("Cancelled", t0() + Duration::days(2));
        cancelled.status = EventStatus::Cancelled;
        db.create_event(cancelled, None, t0()).unwrap();
        db.create_event(event("Thursday", t0() + Duration::days(3)), None, t0())
            .unwrap();
        db.create_event(event("Tomorrow", t0() + Duration::days(1)), None, t0())
            .unwrap();

        let upcoming = db.upcoming_events(t0(), 7).unwrap();
        let titles: Vec<_> = upcoming.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Tomorrow", "Thursday"]);
        assert!(db.upcoming_events(t0(), 0).is_err());
        assert!(db.upcoming_events(t0(), MAX_UPCOMING_DAYS + 1).is_err());
    }

    #[test]
    fn event_for_missing_case_is_rejected() {
        let mut db = Database::new();
        let mut form = event("Hearing", t0());
        form.case_id = Some(CaseId(3));
        assert!(matches!(
            db.create_event(form, None, t0()),
            Err(CoreError::Validation { field: "case_id", .. })
        ));
    }
}
