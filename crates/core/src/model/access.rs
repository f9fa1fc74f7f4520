use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Admin,
}

/// Payment and role information supplied by the account service.
///
/// Read-only to the engine; it is replaced wholesale when refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStatus {
    pub role: UserRole,
    pub has_paid: bool,
    pub payment_expiry: Option<DateTime<Utc>>,
    pub free_question_limit: u32,
}

impl AccessStatus {
    /// Unpaid student status. Used whenever the real status cannot be fetched.
    #[must_use]
    pub fn free(free_question_limit: u32) -> Self {
        Self {
            role: UserRole::Student,
            has_paid: false,
            payment_expiry: None,
            free_question_limit,
        }
    }

    /// Paid student status with an optional expiry.
    #[must_use]
    pub fn paid(payment_expiry: Option<DateTime<Utc>>, free_question_limit: u32) -> Self {
        Self {
            role: UserRole::Student,
            has_paid: true,
            payment_expiry,
            free_question_limit,
        }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self {
            role: UserRole::Admin,
            has_paid: false,
            payment_expiry: None,
            free_question_limit: 0,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Paid and not past the expiry. A missing expiry means the payment does not lapse.
    #[must_use]
    pub fn has_active_payment(&self, now: DateTime<Utc>) -> bool {
        self.has_paid && self.payment_expiry.is_none_or(|expiry| expiry > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::pinned_now;
    use chrono::Duration;

    #[test]
    fn payment_without_expiry_stays_active() {
        assert!(AccessStatus::paid(None, 5).has_active_payment(pinned_now()));
    }

    #[test]
    fn payment_lapses_at_expiry() {
        let now = pinned_now();
        let status = AccessStatus::paid(Some(now), 5);
        assert!(!status.has_active_payment(now));
        assert!(status.has_active_payment(now - Duration::seconds(1)));
    }

    #[test]
    fn free_status_is_never_active() {
        assert!(!AccessStatus::free(5).has_active_payment(pinned_now()));
    }
}
