//! Payment gateway notifications.
//!
//! The gateway notifies `POST /api/webhooks/payments` either with query
//! parameters (`?type=payment&data.id=123`) or a JSON body
//! (`{"type":"payment","data":{"id":"123"}}`). The notification only says
//! *which* payment changed; the payment itself is always fetched from the
//! gateway before anything is written.
//!
//! Status codes tell the gateway whether to retry: 2xx stops retries, 5xx
//! asks for another attempt. Notifications that can never succeed (unknown
//! order, unknown status) are acknowledged with 200 and logged.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use solenne_core::OrderStatus;

use crate::db::OrderRepository;
use crate::db::orders::{PaymentOutcome, PaymentUpdate};
use crate::models::Order;
use crate::payments::GatewayPayment;
use crate::payments::signature;
use crate::state::AppState;

/// Topic of payment notifications.
const PAYMENT_TOPIC: &str = "payment";

/// Query-string form of a notification.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Older notifications use `topic` and `id` instead of `type` and `data.id`.
    pub topic: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    pub id: Option<String>,
}

/// JSON form of a notification.
#[derive(Debug, Default, Deserialize)]
struct NotificationBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    /// Sent as a string or a number depending on the notification version.
    id: serde_json::Value,
}

/// A notification reduced to what the handler needs.
#[derive(Debug, PartialEq, Eq)]
struct Notification {
    topic: Option<String>,
    data_id: Option<String>,
}

impl Notification {
    fn from_parts(query: NotificationQuery, body: &[u8]) -> Self {
        let body: NotificationBody = if body.is_empty() {
            NotificationBody::default()
        } else {
            serde_json::from_slice(body).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Notification body is not JSON");
                NotificationBody::default()
            })
        };

        let body_id = body.data.and_then(|d| match d.id {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Self {
            topic: query.kind.or(query.topic).or(body.kind),
            data_id: query.data_id.or(body_id).or(query.id),
        }
    }

    fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some(PAYMENT_TOPIC)
    }
}

/// Handle a payment notification.
#[instrument(skip(state, headers, query, body))]
pub async fn payment_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
    body: Bytes,
) -> StatusCode {
    let notification = Notification::from_parts(query, &body);
    if !notification.is_payment() {
        tracing::debug!(topic = ?notification.topic, "Ignoring non-payment notification");
        return StatusCode::OK;
    }
    let Some(data_id) = notification.data_id else {
        tracing::warn!("Payment notification without a payment id");
        return StatusCode::BAD_REQUEST;
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(
        &state.config().payments.webhook_secret,
        header("x-signature"),
        header("x-request-id").unwrap_or_default(),
        &data_id,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(payment_id = %data_id, error = %e, "Rejected payment notification signature");
        return StatusCode::UNAUTHORIZED;
    }

    let payment = match state.payments().get_payment(&data_id).await {
        Ok(payment) => payment,
        Err(e) => {
            tracing::error!(payment_id = %data_id, error = %e, "Failed to fetch payment from gateway");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let update = match payment_update(&payment) {
        Ok(update) => update,
        Err(reason) => {
            tracing::warn!(payment_id = %data_id, reason, "Payment cannot be applied to an order");
            return StatusCode::OK;
        }
    };

    let outcome = match OrderRepository::new(state.pool()).apply_payment(&update).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(payment_id = %data_id, error = %e, "Failed to apply payment");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match outcome {
        PaymentOutcome::UnknownOrder => {
            tracing::warn!(
                payment_id = %data_id,
                order_number = %update.order_number,
                "Payment references an unknown order"
            );
        }
        PaymentOutcome::Recorded { .. } => {}
        PaymentOutcome::Transitioned {
            order, membership, ..
        } => {
            if order.status == OrderStatus::Paid {
                notify_paid(&state, &order, membership).await;
            }
        }
    }

    StatusCode::OK
}

/// Translate a gateway payment into an update, or say why it cannot be used.
fn payment_update(payment: &GatewayPayment) -> Result<PaymentUpdate, &'static str> {
    let order_number = payment
        .external_reference
        .clone()
        .filter(|r| !r.is_empty())
        .ok_or("missing external reference")?;
    let status = payment
        .payment_status()
        .map_err(|_| "unknown payment status")?;
    let currency = payment.currency().map_err(|_| "unsupported currency")?;

    Ok(PaymentUpdate {
        gateway_payment_id: payment.id.to_string(),
        order_number,
        status,
        status_detail: payment.status_detail.clone(),
        amount: payment.transaction_amount,
        currency,
        approved_at: payment.date_approved,
    })
}

/// Emails sent once an order is paid. Failures are logged, never retried.
async fn notify_paid(
    state: &AppState,
    order: &Order,
    membership: Option<Option<chrono::DateTime<Utc>>>,
) {
    match OrderRepository::new(state.pool()).items(order.id).await {
        Ok(items) => {
            if let Err(e) = state.email().send_order_confirmation(order, &items).await {
                tracing::error!(order_number = %order.order_number, error = %e, "Failed to send order confirmation");
            }
        }
        Err(e) => {
            tracing::error!(order_number = %order.order_number, error = %e, "Failed to load items for confirmation email");
        }
    }

    if let Some(until) = membership
        && let Err(e) = state
            .email()
            .send_membership_granted(&order.contact_email, &order.contact_name, until)
            .await
    {
        tracing::error!(order_number = %order.order_number, error = %e, "Failed to send membership email");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use solenne_core::{CurrencyCode, PaymentStatus};

    use super::*;

    fn gateway_payment(status: &str, reference: Option<&str>) -> GatewayPayment {
        GatewayPayment {
            id: 987_654,
            status: status.to_owned(),
            status_detail: Some("accredited".to_owned()),
            external_reference: reference.map(str::to_owned),
            transaction_amount: Decimal::new(11970, 2),
            currency_id: "BRL".to_owned(),
            date_approved: None,
        }
    }

    #[test]
    fn test_notification_from_query() {
        let query = NotificationQuery {
            kind: Some("payment".into()),
            data_id: Some("123".into()),
            ..NotificationQuery::default()
        };
        let n = Notification::from_parts(query, b"");
        assert!(n.is_payment());
        assert_eq!(n.data_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_notification_from_json_body_with_numeric_id() {
        let n = Notification::from_parts(
            NotificationQuery::default(),
            br#"{"type":"payment","action":"payment.updated","data":{"id":456}}"#,
        );
        assert!(n.is_payment());
        assert_eq!(n.data_id.as_deref(), Some("456"));
    }

    #[test]
    fn test_legacy_topic_notification() {
        let query = NotificationQuery {
            topic: Some("payment".into()),
            id: Some("789".into()),
            ..NotificationQuery::default()
        };
        let n = Notification::from_parts(query, b"not json");
        assert!(n.is_payment());
        assert_eq!(n.data_id.as_deref(), Some("789"));
    }

    #[test]
    fn test_other_topics_are_not_payments() {
        let n = Notification::from_parts(
            NotificationQuery::default(),
            br#"{"type":"merchant_order","data":{"id":"1"}}"#,
        );
        assert!(!n.is_payment());
    }

    #[test]
    fn test_payment_update_from_gateway_payment() {
        let update =
            payment_update(&gateway_payment("approved", Some("SOL-20261018-7KQ2XM"))).unwrap();
        assert_eq!(update.gateway_payment_id, "987654");
        assert_eq!(update.order_number, "SOL-20261018-7KQ2XM");
        assert_eq!(update.status, PaymentStatus::Approved);
        assert_eq!(update.currency, CurrencyCode::BRL);
    }

    #[test]
    fn test_payment_update_rejects_unusable_payments() {
        assert_eq!(
            payment_update(&gateway_payment("approved", None)).unwrap_err(),
            "missing external reference"
        );
        assert_eq!(
            payment_update(&gateway_payment("teleported", Some("SOL-20261018-7KQ2XM")))
                .unwrap_err(),
            "unknown payment status"
        );
    }
}
