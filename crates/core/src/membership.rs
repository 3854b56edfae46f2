//! Membership program access rules.
//!
//! Lessons are unlocked either because they are marked as a free preview or
//! because the customer holds an active subscription. Subscriptions are
//! granted (or extended) when an order containing a membership product is
//! paid, and can be granted or revoked manually from the back-office.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SubscriptionStatus;

/// The part of a subscription that decides access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWindow {
    pub status: SubscriptionStatus,
    /// `None` means lifetime access.
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionWindow {
    /// Whether the subscription grants access at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.current_period_end.is_none_or(|end| end > now)
    }
}

/// Outcome of an access check for a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The lesson body may be shown.
    Granted,
    /// The customer never had (or no longer has) a subscription.
    RequiresMembership,
    /// The subscription ran out at `ended_at`.
    Expired { ended_at: DateTime<Utc> },
}

impl AccessDecision {
    /// Decide access to a lesson.
    #[must_use]
    pub fn for_lesson(
        is_preview: bool,
        subscription: Option<&SubscriptionWindow>,
        now: DateTime<Utc>,
    ) -> Self {
        if is_preview {
            return Self::Granted;
        }
        match subscription {
            Some(window) if window.is_active_at(now) => Self::Granted,
            Some(SubscriptionWindow {
                current_period_end: Some(end),
                status: SubscriptionStatus::Active | SubscriptionStatus::Expired,
            }) => Self::Expired { ended_at: *end },
            _ => Self::RequiresMembership,
        }
    }

    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Longest grant, in days, that one product or one manual grant may carry.
pub const MAX_GRANT_DAYS: u32 = 3650;

/// New period end after adding `days` of access.
///
/// Extends from whichever is later, `now` or the existing end, so a renewal
/// bought before expiry keeps the remaining time. Lifetime access (`None`
/// with an active subscription) is handled by the caller and never passed
/// here. Saturates at the latest representable instant.
#[must_use]
pub fn extend_period(
    existing_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    days: u32,
) -> DateTime<Utc> {
    let base = existing_end.filter(|end| *end > now).unwrap_or(now);
    base.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Days left until `end`, rounded up; zero once passed.
#[must_use]
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (end - now).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 86_399) / 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn window(status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> SubscriptionWindow {
        SubscriptionWindow {
            status,
            current_period_end: end,
        }
    }

    #[test]
    fn test_preview_always_granted() {
        assert_eq!(
            AccessDecision::for_lesson(true, None, at(1)),
            AccessDecision::Granted
        );
    }

    #[test]
    fn test_no_subscription_requires_membership() {
        assert_eq!(
            AccessDecision::for_lesson(false, None, at(1)),
            AccessDecision::RequiresMembership
        );
    }

    #[test]
    fn test_active_window_granted() {
        let w = window(SubscriptionStatus::Active, Some(at(20)));
        assert!(AccessDecision::for_lesson(false, Some(&w), at(10)).is_granted());
    }

    #[test]
    fn test_lifetime_granted() {
        let w = window(SubscriptionStatus::Active, None);
        assert!(AccessDecision::for_lesson(false, Some(&w), at(10)).is_granted());
    }

    #[test]
    fn test_lapsed_window_is_expired() {
        let w = window(SubscriptionStatus::Active, Some(at(5)));
        assert_eq!(
            AccessDecision::for_lesson(false, Some(&w), at(10)),
            AccessDecision::Expired { ended_at: at(5) }
        );
    }

    #[test]
    fn test_cancelled_requires_membership() {
        let w = window(SubscriptionStatus::Cancelled, Some(at(20)));
        assert_eq!(
            AccessDecision::for_lesson(false, Some(&w), at(10)),
            AccessDecision::RequiresMembership
        );
    }

    #[test]
    fn test_extend_period_from_now_when_expired() {
        assert_eq!(extend_period(Some(at(1)), at(10), 5), at(15));
        assert_eq!(extend_period(None, at(10), 5), at(15));
    }

    #[test]
    fn test_extend_period_keeps_remaining_time() {
        assert_eq!(extend_period(Some(at(20)), at(10), 5), at(25));
    }

    #[test]
    fn test_extend_period_saturates() {
        assert_eq!(
            extend_period(None, at(10), 100_000_000),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(
            extend_period(Some(DateTime::<Utc>::MAX_UTC), at(10), u32::MAX),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_days_remaining() {
        assert_eq!(days_remaining(at(12), at(10)), 2);
        assert_eq!(days_remaining(at(10) + Duration::hours(1), at(10)), 1);
        assert_eq!(days_remaining(at(9), at(10)), 0);
    }
}
