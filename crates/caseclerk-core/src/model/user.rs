//! Practice members and their onboarding progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{double_option, normalize_tags, optional_text, patch_optional_text, required_text};
use crate::UserId;
use crate::error::{CoreError, CoreResult};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Number of the final onboarding step.
pub const ONBOARDING_LAST_STEP: u8 = 4;

const MAX_NAME_LEN: usize = 128;
const MAX_EMAIL_LEN: usize = 254;

string_enum! {
    pub enum UserRole {
        Admin => "admin",
        Attorney => "attorney",
        Paralegal => "paralegal",
        Assistant => "assistant",
    }
    default = Attorney
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Onboarding {
    pub completed: bool,
    pub step: u8,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A stored account. `password_hash` never leaves the server; clients see
/// [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub firm_name: Option<String>,
    pub phone: Option<String>,
    pub bar_number: Option<String>,
    pub practice_areas: Vec<String>,
    pub onboarding: Onboarding,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            firm_name: self.firm_name.clone(),
            phone: self.phone.clone(),
            bar_number: self.bar_number.clone(),
            practice_areas: self.practice_areas.clone(),
            onboarding: self.onboarding.clone(),
            active: self.active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        patch_optional_text(&mut self.firm_name, update.firm_name);
        patch_optional_text(&mut self.phone, update.phone);
        patch_optional_text(&mut self.bar_number, update.bar_number);
        if let Some(areas) = update.practice_areas {
            self.practice_areas = areas;
        }
        self.updated_at = now;
    }

    /// Records an onboarding step. Steps never go backwards; completing
    /// jumps to the last step.
    pub fn advance_onboarding(&mut self, step: OnboardingStep, now: DateTime<Utc>) -> CoreResult<()> {
        if step.step > ONBOARDING_LAST_STEP {
            return Err(CoreError::validation(
                "step",
                format!("must be between 0 and {}", ONBOARDING_LAST_STEP),
            ));
        }
        self.apply(
            ProfileUpdate {
                full_name: None,
                firm_name: step.firm_name.map(Some),
                phone: step.phone.map(Some),
                bar_number: step.bar_number.map(Some),
                practice_areas: step.practice_areas.map(normalize_tags),
            },
            now,
        );
        self.onboarding.step = self.onboarding.step.max(step.step);
        if step.complete || self.onboarding.step == ONBOARDING_LAST_STEP {
            self.onboarding.step = ONBOARDING_LAST_STEP;
            if !self.onboarding.completed {
                self.onboarding.completed = true;
                self.onboarding.completed_at = Some(now);
            }
        }
        Ok(())
    }
}

/// Public view of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub firm_name: Option<String>,
    pub phone: Option<String>,
    pub bar_number: Option<String>,
    pub practice_areas: Vec<String>,
    pub onboarding: Onboarding,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercases and sanity-checks an email address.
pub fn normalize_email(raw: &str) -> CoreResult<String> {
    let email = required_text("email", raw, MAX_EMAIL_LEN)?.to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(CoreError::validation(
            "email",
            format!("'{}' is not an email address", raw.trim()),
        ));
    }
    Ok(email)
}

pub fn check_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::validation(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

// =============================================================================
// FORMS
// =============================================================================

/// A new account. The password is hashed by the caller before storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub firm_name: Option<String>,
}

impl NewUser {
    pub fn normalized(self) -> CoreResult<Self> {
        Ok(Self {
            email: normalize_email(&self.email)?,
            full_name: required_text("full_name", &self.full_name, MAX_NAME_LEN)?,
            password_hash: self.password_hash,
            role: self.role,
            firm_name: optional_text(self.firm_name),
        })
    }

    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: UserId(0),
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            role: self.role,
            firm_name: self.firm_name,
            phone: None,
            bar_number: None,
            practice_areas: Vec::new(),
            onboarding: Onboarding::default(),
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub firm_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub bar_number: Option<Option<String>>,
    pub practice_areas: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn normalized(mut self) -> CoreResult<Self> {
        if let Some(name) = &self.full_name {
            self.full_name = Some(required_text("full_name", name, MAX_NAME_LEN)?);
        }
        self.practice_areas = self.practice_areas.map(normalize_tags);
        Ok(self)
    }
}

/// One step of the onboarding wizard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardingStep {
    pub step: u8,
    #[serde(default)]
    pub firm_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bar_number: Option<String>,
    #[serde(default)]
    pub practice_areas: Option<Vec<String>>,
    #[serde(default)]
    pub complete: bool,
}
