//! Legal matters tracked by the practice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{
    double_option, matches_search, normalize_tags, optional_text, patch_optional_text,
    required_text,
};
use crate::error::{CoreError, CoreResult};
use crate::query::SortOrder;
use crate::{CaseId, UserId};

pub const MAX_CASE_NUMBER_LEN: usize = 64;
pub const MAX_CASE_TITLE_LEN: usize = 256;
const MAX_NAME_LEN: usize = 256;

string_enum! {
    /// Lifecycle state of a case.
    pub enum CaseStatus {
        Active => "active",
        Pending => "pending",
        Closed => "closed",
        Appealed => "appealed",
        Settled => "settled",
    }
    default = Active
}

string_enum! {
    /// Ordered from least to most pressing, so `Ord` sorts by urgency.
    pub enum CasePriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
    default = Medium
}

string_enum! {
    pub enum CaseType {
        Civil => "civil",
        Criminal => "criminal",
        Family => "family",
        Corporate => "corporate",
        Immigration => "immigration",
        PersonalInjury => "personal_injury",
        RealEstate => "real_estate",
        IntellectualProperty => "intellectual_property",
        Employment => "employment",
        Other => "other",
    }
    default = Other
}

/// A legal matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub case_number: String,
    pub title: String,
    pub description: Option<String>,
    pub client_name: String,
    pub opposing_party: Option<String>,
    pub court: Option<String>,
    pub judge: Option<String>,
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub filing_date: Option<NaiveDate>,
    pub next_hearing: Option<DateTime<Utc>>,
    pub assigned_attorney: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Builds a case from a validated form. The id is assigned by the store.
    pub fn from_form(form: NewCase, created_by: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: CaseId(0),
            case_number: form.case_number,
            title: form.title,
            description: form.description,
            client_name: form.client_name,
            opposing_party: form.opposing_party,
            court: form.court,
            judge: form.judge,
            case_type: form.case_type,
            status: form.status,
            priority: form.priority,
            filing_date: form.filing_date,
            next_hearing: form.next_hearing,
            assigned_attorney: form.assigned_attorney,
            tags: form.tags,
            notes: form.notes,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a validated update.
    pub fn apply(&mut self, update: CaseUpdate, now: DateTime<Utc>) {
        if let Some(case_number) = update.case_number {
            self.case_number = case_number;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(client_name) = update.client_name {
            self.client_name = client_name;
        }
        patch_optional_text(&mut self.description, update.description);
        patch_optional_text(&mut self.opposing_party, update.opposing_party);
        patch_optional_text(&mut self.court, update.court);
        patch_optional_text(&mut self.judge, update.judge);
        patch_optional_text(&mut self.assigned_attorney, update.assigned_attorney);
        patch_optional_text(&mut self.notes, update.notes);
        if let Some(case_type) = update.case_type {
            self.case_type = case_type;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(filing_date) = update.filing_date {
            self.filing_date = filing_date;
        }
        if let Some(next_hearing) = update.next_hearing {
            self.next_hearing = next_hearing;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        self.updated_at = now;
    }
}

// =============================================================================
// FORMS
// =============================================================================

/// Payload for creating a case.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewCase {
    pub case_number: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub client_name: String,
    #[serde(default)]
    pub opposing_party: Option<String>,
    #[serde(default)]
    pub court: Option<String>,
    #[serde(default)]
    pub judge: Option<String>,
    #[serde(default)]
    pub case_type: CaseType,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub priority: CasePriority,
    #[serde(default)]
    pub filing_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_hearing: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_attorney: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewCase {
    /// Trims and checks every field.
    pub fn normalized(self) -> CoreResult<Self> {
        Ok(Self {
            case_number: required_text("case_number", &self.case_number, MAX_CASE_NUMBER_LEN)?,
            title: required_text("title", &self.title, MAX_CASE_TITLE_LEN)?,
            description: optional_text(self.description),
            client_name: required_text("client_name", &self.client_name, MAX_NAME_LEN)?,
            opposing_party: optional_text(self.opposing_party),
            court: optional_text(self.court),
            judge: optional_text(self.judge),
            case_type: self.case_type,
            status: self.status,
            priority: self.priority,
            filing_date: self.filing_date,
            next_hearing: self.next_hearing,
            assigned_attorney: optional_text(self.assigned_attorney),
            tags: normalize_tags(self.tags),
            notes: optional_text(self.notes),
        })
    }
}

/// Partial update of a case. Absent fields are left untouched; an explicit
/// `null` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseUpdate {
    pub case_number: Option<String>,
    pub title: Option<String>,
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub opposing_party: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub court: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub judge: Option<Option<String>>,
    pub case_type: Option<CaseType>,
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub filing_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub next_hearing: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub assigned_attorney: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub notes: Option<Option<String>>,
}

impl CaseUpdate {
    pub fn normalized(mut self) -> CoreResult<Self> {
        if let Some(case_number) = &self.case_number {
            self.case_number = Some(required_text(
                "case_number",
                case_number,
                MAX_CASE_NUMBER_LEN,
            )?);
        }
        if let Some(title) = &self.title {
            self.title = Some(required_text("title", title, MAX_CASE_TITLE_LEN)?);
        }
        if let Some(client_name) = &self.client_name {
            self.client_name = Some(required_text("client_name", client_name, MAX_NAME_LEN)?);
        }
        self.tags = self.tags.map(normalize_tags);
        Ok(self)
    }
}

// =============================================================================
// LISTING
// =============================================================================

/// Filters accepted by the case list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub case_type: Option<CaseType>,
    pub assigned_attorney: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        if self.status.is_some_and(|s| s != case.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != case.priority) {
            return false;
        }
        if self.case_type.is_some_and(|t| t != case.case_type) {
            return false;
        }
        if let Some(attorney) = &self.assigned_attorney
            && !case
                .assigned_attorney
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(attorney.trim()))
        {
            return false;
        }
        if let Some(tag) = &self.tag
            && !case.tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim()))
        {
            return false;
        }
        if let Some(search) = &self.search {
            return matches_search(
                search,
                &[
                    Some(case.case_number.as_str()),
                    Some(case.title.as_str()),
                    Some(case.client_name.as_str()),
                    case.opposing_party.as_deref(),
                ],
            );
        }
        true
    }
}

/// Sort keys of the case list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseSortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    CaseNumber,
    FilingDate,
    Priority,
    Status,
}

impl CaseSortKey {
    pub fn parse(raw: Option<&str>) -> CoreResult<Self> {
        Ok(match raw.map(str::trim) {
            None | Some("") | Some("created_at") => Self::CreatedAt,
            Some("updated_at") => Self::UpdatedAt,
            Some("title") => Self::Title,
            Some("case_number") => Self::CaseNumber,
            Some("filing_date") => Self::FilingDate,
            Some("priority") => Self::Priority,
            Some("status") => Self::Status,
            Some(other) => {
                return Err(CoreError::validation(
                    "sort_by",
                    format!("cannot sort cases by '{}'", other),
                ));
            }
        })
    }

    /// Compares two cases; ties fall back to the id so ordering is total.
    pub fn compare(&self, a: &Case, b: &Case, order: SortOrder) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            Self::CaseNumber => a.case_number.cmp(&b.case_number),
            Self::FilingDate => a.filing_date.cmp(&b.filing_date),
            Self::Priority => a.priority.cmp(&b.priority),
            Self::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        order.apply(primary.then(a.id.cmp(&b.id)))
    }
}
