//! Customer notifications sent from the back-office.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.
//! When SMTP is not configured, messages are logged and skipped.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use solenne_core::OrderStatus;

use crate::config::EmailConfig;
use crate::models::Order;

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    name: &'a str,
    headline: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    tracking_code: Option<&'a str>,
    note: Option<&'a str>,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    name: &'a str,
    headline: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    tracking_code: Option<&'a str>,
    note: Option<&'a str>,
    order_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

fn headline(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Shipped => "Good news: your order is on its way.",
        OrderStatus::Delivered => "Your order has been delivered. We hope you love it.",
        OrderStatus::Cancelled => "Your order has been cancelled.",
        OrderStatus::Refunded => "Your order has been refunded.",
        _ => "There is an update on your order.",
    }
}

#[derive(Clone)]
struct Smtp {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for order status notifications.
#[derive(Clone)]
pub struct EmailService {
    smtp: Option<Smtp>,
    storefront_url: String,
}

impl EmailService {
    /// Create an email service. `None` config disables delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, storefront_url: &str) -> Result<Self, SmtpError> {
        let smtp = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );
                let mailer =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                Some(Smtp {
                    mailer,
                    from_address: config.from_address.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            smtp,
            storefront_url: storefront_url.to_owned(),
        })
    }

    /// Tell the customer their order moved to a new status.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_status(
        &self,
        order: &Order,
        note: Option<&str>,
    ) -> Result<(), EmailError> {
        let (text, html) = self.render_order_status(order, note)?;
        let subject = format!(
            "Order {}: {}",
            order.order_number,
            order.status.label().to_lowercase()
        );
        self.send_multipart_email(&order.contact_email, &subject, &text, &html)
            .await
    }

    fn render_order_status(
        &self,
        order: &Order,
        note: Option<&str>,
    ) -> Result<(String, String), EmailError> {
        let order_url = format!(
            "{}/account/orders/{}",
            self.storefront_url, order.order_number
        );
        let tracking_code = if order.status == OrderStatus::Shipped {
            order.tracking_code.as_deref()
        } else {
            None
        };

        let html = OrderStatusHtml {
            name: &order.contact_name,
            headline: headline(order.status),
            order_number: &order.order_number,
            status_label: order.status.label(),
            tracking_code,
            note,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderStatusText {
            name: &order.contact_name,
            headline: headline(order.status),
            order_number: &order.order_number,
            status_label: order.status.label(),
            tracking_code,
            note,
            order_url: &order_url,
        }
        .render()?;
        Ok((text, html))
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(smtp) = &self.smtp else {
            tracing::info!(to = %to, subject = %subject, "Email delivery not configured, skipping");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                smtp.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(smtp.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        smtp.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use solenne_core::order::ShippingAddress;
    use solenne_core::{CurrencyCode, CustomerId, OrderId};
    use sqlx::types::Json;

    fn order(status: OrderStatus, tracking: Option<&str>) -> Order {
        Order {
            id: OrderId::new(7),
            order_number: "SOL-000007".into(),
            customer_id: CustomerId::new(3),
            status,
            currency: CurrencyCode::default(),
            subtotal: Decimal::from(40),
            shipping: Decimal::from(5),
            total: Decimal::from(45),
            contact_name: "Ana Souza".into(),
            contact_email: "ana@example.com".into(),
            contact_phone: String::new(),
            shipping_address: Json(ShippingAddress {
                street: "Rua Augusta".into(),
                number: "100".into(),
                complement: None,
                district: "Consolação".into(),
                city: "São Paulo".into(),
                state: "SP".into(),
                postal_code: "01305-000".into(),
            }),
            notes: None,
            payment_preference_id: None,
            tracking_code: tracking.map(str::to_owned),
            paid_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn service() -> EmailService {
        EmailService::new(None, "https://solenne.test").unwrap()
    }

    #[test]
    fn test_shipped_email_includes_tracking_code() {
        let (text, html) = service()
            .render_order_status(&order(OrderStatus::Shipped, Some("BR123456789")), None)
            .unwrap();
        assert!(text.contains("BR123456789"));
        assert!(html.contains("BR123456789"));
        assert!(text.contains("https://solenne.test/account/orders/SOL-000007"));
    }

    #[test]
    fn test_cancelled_email_omits_tracking_and_keeps_note() {
        let (text, _) = service()
            .render_order_status(
                &order(OrderStatus::Cancelled, Some("BR123456789")),
                Some("Out of stock, sorry"),
            )
            .unwrap();
        assert!(!text.contains("BR123456789"));
        assert!(text.contains("Out of stock, sorry"));
        assert!(text.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_skips() {
        service()
            .send_order_status(&order(OrderStatus::Delivered, None), None)
            .await
            .unwrap();
    }
}
