//! Free-tier access rule.
//!
//! This is the only place the monetization rule is encoded. Navigation and
//! submission both ask the gate; neither re-derives the rule.

use chrono::{DateTime, Utc};

use crate::model::AccessStatus;

/// Stateless predicate over access status and a requested question index.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    /// Returns true if the user may view the question at `requested_index` (0-based).
    ///
    /// Admins and users with an active payment see everything; everyone else sees
    /// indices strictly below `free_question_limit`.
    #[must_use]
    pub fn allows(
        status: &AccessStatus,
        requested_index: usize,
        free_question_limit: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if status.is_admin() || status.has_active_payment(now) {
            return true;
        }
        let limit = usize::try_from(free_question_limit).unwrap_or(usize::MAX);
        requested_index < limit
    }

    /// Returns true if a session of `question_count` questions may be submitted.
    ///
    /// A submission covers every question, so it is allowed exactly when the last
    /// question is reachable.
    #[must_use]
    pub fn allows_submission(
        status: &AccessStatus,
        question_count: usize,
        free_question_limit: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let last = question_count.saturating_sub(1);
        Self::allows(status, last, free_question_limit, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::pinned_now;
    use chrono::Duration;

    #[test]
    fn free_user_is_limited_to_first_questions() {
        let status = AccessStatus::free(5);
        let now = pinned_now();
        assert!(AccessGate::allows(&status, 4, 5, now));
        assert!(!AccessGate::allows(&status, 5, 5, now));
    }

    #[test]
    fn admin_bypasses_limit() {
        assert!(AccessGate::allows(&AccessStatus::admin(), 99, 0, pinned_now()));
    }

    #[test]
    fn expired_payment_falls_back_to_free_limit() {
        let now = pinned_now();
        let status = AccessStatus::paid(Some(now - Duration::days(1)), 5);
        assert!(!AccessGate::allows(&status, 5, 5, now));
        assert!(AccessGate::allows(&status, 0, 5, now));
    }

    #[test]
    fn denial_is_monotonic_in_index() {
        let now = pinned_now();
        for limit in 0..8_u32 {
            let status = AccessStatus::free(limit);
            let first_denied = (0..20).find(|i| !AccessGate::allows(&status, *i, limit, now));
            if let Some(k) = first_denied {
                assert!((k..40).all(|i| !AccessGate::allows(&status, i, limit, now)));
            }
        }
    }

    #[test]
    fn submission_follows_last_question() {
        let now = pinned_now();
        let status = AccessStatus::free(5);
        assert!(AccessGate::allows_submission(&status, 5, 5, now));
        assert!(!AccessGate::allows_submission(&status, 6, 5, now));
        assert!(AccessGate::allows_submission(&AccessStatus::paid(None, 5), 50, 5, now));
    }
}
