//! # Seed Module
//!
//! Demo data for a fresh install: two accounts and a small practice to
//! click through. Timestamps are relative to `now`.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::credentials::PasswordHasher;
use crate::database::Database;
use crate::error::CoreResult;
use crate::model::{NewCallLog, NewCase, NewDocument, NewEvent, NewUser, OnboardingStep};
use crate::{
    CallDirection, CallStatus, CasePriority, CaseStatus, CaseType, DocumentType, EventType,
    UserRole, ONBOARDING_LAST_STEP,
};

pub const DEMO_EMAIL: &str = "demo@caseclerk.ai";
pub const DEMO_PASSWORD: &str = "demo123";
pub const ADMIN_EMAIL: &str = "admin@caseclerk.ai";
pub const ADMIN_PASSWORD: &str = "admin123";

const ENGAGEMENT_LETTER: &str = "This engagement letter confirms that the firm will represent \
Harbor Logistics LLC in its contract dispute with Meridian Freight Inc. \
The client alleges breach of the master services agreement and seeks damages for lost shipments. \
The firm will prepare the complaint and respond to any motion to dismiss. \
Fees are billed hourly and invoiced monthly.";

/// Fills an empty database. Returns `false` and does nothing otherwise.
pub fn seed_demo_data(
    db: &mut Database,
    hasher: &PasswordHasher,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    if !db.is_empty() {
        return Ok(false);
    }

    let demo = db.create_user(
        NewUser {
            email: DEMO_EMAIL.to_string(),
            full_name: "Alex Morgan".to_string(),
            password_hash: hasher.hash(DEMO_PASSWORD)?,
            role: UserRole::Attorney,
            firm_name: Some("Morgan & Reyes LLP".to_string()),
        },
        now,
    )?;
    db.advance_onboarding(
        demo.id,
        OnboardingStep {
            step: ONBOARDING_LAST_STEP,
            bar_number: Some("CA-284913".to_string()),
            practice_areas: Some(vec![
                "Civil Litigation".to_string(),
                "Corporate".to_string(),
            ]),
            complete: true,
            ..OnboardingStep::default()
        },
        now,
    )?;
    db.create_user(
        NewUser {
            email: ADMIN_EMAIL.to_string(),
            full_name: "Site Administrator".to_string(),
            password_hash: hasher.hash(ADMIN_PASSWORD)?,
            role: UserRole::Admin,
            firm_name: Some("Morgan & Reyes LLP".to_string()),
        },
        now,
    )?;

    let owner = Some(demo.id);
    let harbor = db.create_case(
        NewCase {
            case_number: "CV-2024-0142".to_string(),
            title: "Harbor Logistics v. Meridian Freight".to_string(),
            description: Some("Breach of a master services agreement.".to_string()),
            client_name: "Harbor Logistics LLC".to_string(),
            opposing_party: Some("Meridian Freight Inc.".to_string()),
            court: Some("Superior Court of California, County of Los Angeles".to_string()),
            judge: Some("Hon. Maria Delgado".to_string()),
            case_type: CaseType::Corporate,
            status: CaseStatus::Active,
            priority: CasePriority::High,
            filing_date: NaiveDate::from_ymd_opt(2024, 2, 12),
            next_hearing: Some(now + Duration::days(3)),
            assigned_attorney: Some("Alex Morgan".to_string()),
            tags: vec!["contract".to_string(), "commercial".to_string()],
            notes: None,
        },
        owner,
        now,
    )?;
    let chen = db.create_case(
        NewCase {
            case_number: "FL-2024-0077".to_string(),
            title: "In re Marriage of Chen".to_string(),
            client_name: "Linda Chen".to_string(),
            case_type: CaseType::Family,
            status: CaseStatus::Pending,
            priority: CasePriority::Medium,
            assigned_attorney: Some("Alex Morgan".to_string()),
            tags: vec!["custody".to_string()],
            ..NewCase::default()
        },
        owner,
        now,
    )?;
    db.create_case(
        NewCase {
            case_number: "PI-2023-0311".to_string(),
            title: "Okafor v. Swift Rideshare".to_string(),
            client_name: "Daniel Okafor".to_string(),
            opposing_party: Some("Swift Rideshare Inc.".to_string()),
            case_type: CaseType::PersonalInjury,
            status: CaseStatus::Closed,
            priority: CasePriority::Low,
            filing_date: NaiveDate::from_ymd_opt(2023, 6, 1),
            notes: Some("Settled at mediation.".to_string()),
            ..NewCase::default()
        },
        owner,
        now,
    )?;

    db.create_document(
        NewDocument {
            case_id: Some(harbor.id),
            title: "Engagement letter".to_string(),
            file_name: "engagement-letter.txt".to_string(),
            mime_type: "text/plain".to_string(),
            document_type: DocumentType::Correspondence,
            tags: vec!["engagement".to_string()],
        },
        ENGAGEMENT_LETTER.as_bytes().to_vec(),
        owner,
        now,
    )?;

    db.create_call_log(
        NewCallLog {
            case_id: Some(harbor.id),
            contact_name: "Priya Shah (Harbor Logistics)".to_string(),
            phone_number: "+1 213 555 0142".to_string(),
            direction: CallDirection::Inbound,
            status: CallStatus::Completed,
            started_at: Some(now - Duration::days(1)),
            ended_at: Some(now - Duration::days(1) + Duration::minutes(18)),
            duration_seconds: None,
            participants: vec!["Alex Morgan".to_string(), "Priya Shah".to_string()],
            notes: Some("Reviewed shipment records; client will send invoices.".to_string()),
        },
        owner,
        now,
    )?;

    let mut hearing = NewEvent::new("Case management conference", now + Duration::days(3));
    hearing.case_id = Some(harbor.id);
    hearing.event_type = EventType::Hearing;
    hearing.end_time = Some(now + Duration::days(3) + Duration::hours(1));
    hearing.location = Some("Department 14".to_string());
    hearing.reminder_minutes = Some(24 * 60);
    db.create_event(hearing, owner, now)?;

    let mut deadline = NewEvent::new("Financial disclosures due", now + Duration::days(10));
    deadline.case_id = Some(chen.id);
    deadline.event_type = EventType::Deadline;
    deadline.all_day = true;
    db.create_event(deadline, owner, now)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaseFilter;
    use crate::query::ListParams;

    fn seeded() -> Database {
        let mut db = Database::new();
        assert!(seed_demo_data(&mut db, &PasswordHasher::fast(), Utc::now()).unwrap());
        db
    }

    #[test]
    fn seeds_every_collection() {
        let counts = seeded().counts();
        assert_eq!(counts.users, 2);
        assert_eq!(counts.cases, 3);
        assert_eq!(counts.documents, 1);
        assert_eq!(counts.call_logs, 1);
        assert_eq!(counts.calendar_events, 2);
    }

    #[test]
    fn demo_account_can_log_in() {
        let db = seeded();
        let demo = db.find_user_by_email(DEMO_EMAIL).unwrap();
        assert!(PasswordHasher::fast().verify(DEMO_PASSWORD, &demo.password_hash));
        assert!(demo.onboarding.completed);
        assert_eq!(demo.role, UserRole::Attorney);
        let admin = db.find_user_by_email(ADMIN_EMAIL).unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[test]
    fn one_case_per_status() {
        let db = seeded();
        for status in [CaseStatus::Active, CaseStatus::Pending, CaseStatus::Closed] {
            let filter = CaseFilter {
                status: Some(status),
                ..CaseFilter::default()
            };
            let page = db.list_cases(&filter, &ListParams::default()).unwrap();
            assert_eq!(page.pagination.total, 1, "{}", status);
        }
    }

    #[test]
    fn seeding_twice_is_a_no_op() {
        let mut db = seeded();
        let before = db.counts();
        assert!(!seed_demo_data(&mut db, &PasswordHasher::fast(), Utc::now()).unwrap());
        assert_eq!(db.counts(), before);
    }

    #[test]
    fn seeded_call_has_duration() {
        let db = seeded();
        let call = db.snapshot().call_logs.remove(0);
        assert_eq!(call.duration_seconds, Some(18 * 60));
    }
}
