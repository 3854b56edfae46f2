//! Status enums and the order-status workflow.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidStatus {
    kind: &'static str,
    value: String,
}

impl InvalidStatus {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// =============================================================================
// OrderStatus
// =============================================================================

/// Lifecycle of a storefront order.
///
/// ```text
/// pending ──► paid ──► processing ──► shipped ──► delivered
///    │          │           │            │            │
///    ▼          ▼           ▼            └────────────┴──► refunded
/// cancelled  cancelled   cancelled
///            refunded    refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Every status, in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Statuses this one may move to.
    #[must_use]
    pub const fn next_actions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid, Self::Cancelled],
            Self::Paid => &[Self::Processing, Self::Cancelled, Self::Refunded],
            Self::Processing => &[Self::Shipped, Self::Cancelled, Self::Refunded],
            Self::Shipped => &[Self::Delivered, Self::Refunded],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    /// Whether moving from `self` to `target` is allowed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next_actions().contains(&target)
    }

    /// Stock has been committed for the order in this state.
    #[must_use]
    pub const fn is_paid_state(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Moving from `self` to `target` returns committed stock to inventory.
    #[must_use]
    pub const fn restocks_on(self, target: Self) -> bool {
        self.is_paid_state() && matches!(target, Self::Cancelled | Self::Refunded)
    }

    /// Moving to this status should notify the customer by email.
    #[must_use]
    pub const fn notifies_customer(self) -> bool {
        matches!(
            self,
            Self::Shipped | Self::Delivered | Self::Cancelled | Self::Refunded
        )
    }

    /// Database/form representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Human label for templates and emails.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting payment",
            Self::Paid => "Paid",
            Self::Processing => "Preparing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus::new("order status", s))
    }
}

// =============================================================================
// PaymentStatus
// =============================================================================

/// Payment state as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
}

impl PaymentStatus {
    const ALL: [Self; 9] = [
        Self::Pending,
        Self::Approved,
        Self::Authorized,
        Self::InProcess,
        Self::InMediation,
        Self::Rejected,
        Self::Cancelled,
        Self::Refunded,
        Self::ChargedBack,
    ];

    /// Gateway representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Authorized => "authorized",
            Self::InProcess => "in_process",
            Self::InMediation => "in_mediation",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::ChargedBack => "charged_back",
        }
    }

    /// The order status an order in `current` should move to after the
    /// gateway reports this payment status, if any.
    ///
    /// Notifications can arrive late or repeatedly, so anything that does
    /// not describe a legal forward move yields `None`.
    #[must_use]
    pub fn order_transition(self, current: OrderStatus) -> Option<OrderStatus> {
        let target = match self {
            Self::Approved if current == OrderStatus::Pending => OrderStatus::Paid,
            Self::Rejected | Self::Cancelled if current == OrderStatus::Pending => {
                OrderStatus::Cancelled
            }
            Self::Refunded | Self::ChargedBack if current.is_paid_state() => {
                OrderStatus::Refunded
            }
            _ => return None,
        };
        current.can_transition_to(target).then_some(target)
    }

    /// The gateway captured or held money for an order that was already
    /// cancelled. No transition applies; the charge has to be returned by
    /// hand.
    #[must_use]
    pub const fn charges_cancelled_order(self, current: OrderStatus) -> bool {
        matches!(self, Self::Approved | Self::Authorized)
            && matches!(current, OrderStatus::Cancelled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus::new("payment status", s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PaymentStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

// =============================================================================
// SubscriptionStatus
// =============================================================================

/// Membership subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::PastDue => "Past due",
            Self::Cancelled => "Cancelled",
            Self::Expired => "Expired",
        }
    }
}

// =============================================================================
// AdminRole
// =============================================================================

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin.admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Everything, including managing other admins.
    SuperAdmin,
    /// Day-to-day store management.
    Admin,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    /// May create, edit or delete store records.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// May manage admin accounts.
    #[must_use]
    pub const fn can_manage_admins(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(InvalidStatus::new("admin role", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_workflow_forward_path() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Refunded));
    }

    #[test]
    fn test_order_workflow_rejects_illegal_moves() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_actions() {
        assert!(OrderStatus::Cancelled.next_actions().is_empty());
        assert!(OrderStatus::Refunded.next_actions().is_empty());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn test_restocks_on() {
        use OrderStatus::*;
        assert!(Paid.restocks_on(Cancelled));
        assert!(Shipped.restocks_on(Refunded));
        assert!(!Pending.restocks_on(Cancelled));
        assert!(!Paid.restocks_on(Processing));
    }

    #[test]
    fn test_order_status_roundtrip_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_approved_marks_pending_order_paid() {
        assert_eq!(
            PaymentStatus::Approved.order_transition(OrderStatus::Pending),
            Some(OrderStatus::Paid)
        );
        // Repeated notification after the order already moved on.
        assert_eq!(
            PaymentStatus::Approved.order_transition(OrderStatus::Shipped),
            None
        );
    }

    #[test]
    fn test_payment_rejected_cancels_only_pending() {
        assert_eq!(
            PaymentStatus::Rejected.order_transition(OrderStatus::Pending),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(
            PaymentStatus::Cancelled.order_transition(OrderStatus::Paid),
            None
        );
    }

    #[test]
    fn test_payment_refund_and_chargeback() {
        assert_eq!(
            PaymentStatus::Refunded.order_transition(OrderStatus::Delivered),
            Some(OrderStatus::Refunded)
        );
        assert_eq!(
            PaymentStatus::ChargedBack.order_transition(OrderStatus::Paid),
            Some(OrderStatus::Refunded)
        );
        assert_eq!(
            PaymentStatus::Refunded.order_transition(OrderStatus::Pending),
            None
        );
    }

    #[test]
    fn test_in_flight_payment_statuses_do_nothing() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::InProcess,
            PaymentStatus::InMediation,
            PaymentStatus::Authorized,
        ] {
            assert_eq!(status.order_transition(OrderStatus::Pending), None);
        }
    }

    #[test]
    fn test_charge_on_cancelled_order_detected() {
        assert!(PaymentStatus::Approved.charges_cancelled_order(OrderStatus::Cancelled));
        assert!(PaymentStatus::Authorized.charges_cancelled_order(OrderStatus::Cancelled));
        assert_eq!(
            PaymentStatus::Approved.order_transition(OrderStatus::Cancelled),
            None
        );

        assert!(!PaymentStatus::Approved.charges_cancelled_order(OrderStatus::Pending));
        assert!(!PaymentStatus::Approved.charges_cancelled_order(OrderStatus::Paid));
        assert!(!PaymentStatus::Rejected.charges_cancelled_order(OrderStatus::Cancelled));
        assert!(!PaymentStatus::Refunded.charges_cancelled_order(OrderStatus::Cancelled));
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!(
            "in_process".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::InProcess
        );
        assert_eq!(
            "charged_back".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::ChargedBack
        );
        assert!("weird".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_admin_role_permissions() {
        assert!(AdminRole::SuperAdmin.can_manage_admins());
        assert!(!AdminRole::Admin.can_manage_admins());
        assert!(AdminRole::Admin.can_write());
        assert!(!AdminRole::Viewer.can_write());
        assert_eq!("viewer".parse::<AdminRole>().unwrap(), AdminRole::Viewer);
        assert!("owner".parse::<AdminRole>().is_err());
    }
}
