use chrono::{DateTime, Utc};

use super::Database;
use crate::error::{CoreError, CoreResult};
use crate::model::{NewUser, OnboardingStep, ProfileUpdate, normalize_email};
use crate::query::{ListParams, Page};
use crate::{User, UserId};

impl Database {
    /// Registers an account. Emails are unique regardless of case.
    pub fn create_user(&mut self, form: NewUser, now: DateTime<Utc>) -> CoreResult<User> {
        let form = form.normalized()?;
        if self.users.iter().any(|u| u.email == form.email) {
            return Err(CoreError::duplicate("user", "email", form.email));
        }
        Ok(self.users.insert(form.into_user(now)))
    }

    pub fn get_user(&self, id: UserId) -> CoreResult<&User> {
        self.users.get(id)
    }

    /// Looks an account up by email. Malformed input simply finds nothing.
    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email).ok()?;
        self.users.iter().find(|u| u.email == email)
    }

    pub fn update_profile(
        &mut self,
        id: UserId,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<User> {
        let update = update.normalized()?;
        let user = self.users.get_mut(id)?;
        user.apply(update, now);
        Ok(user.clone())
    }

    pub fn advance_onboarding(
        &mut self,
        id: UserId,
        step: OnboardingStep,
        now: DateTime<Utc>,
    ) -> CoreResult<User> {
        let user = self.users.get_mut(id)?;
        user.advance_onboarding(step, now)?;
        Ok(user.clone())
    }

    pub fn record_login(&mut self, id: UserId, now: DateTime<Utc>) -> CoreResult<User> {
        let user = self.users.get_mut(id)?;
        user.last_login_at = Some(now);
        Ok(user.clone())
    }

    /// Enables or disables an account. Disabled accounts cannot sign in.
    pub fn set_user_active(
        &mut self,
        id: UserId,
        active: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<User> {
        let user = self.users.get_mut(id)?;
        user.active = active;
        user.updated_at = now;
        Ok(user.clone())
    }

    /// Accounts in registration order.
    pub fn list_users(&self, params: &ListParams) -> Page<User> {
        params.paginate(self.users.iter().cloned().collect())
    }
}
