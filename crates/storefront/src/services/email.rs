//! Transactional email for customers.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.
//! When SMTP is not configured, messages are logged and skipped.

use askama::Template;
use chrono::{DateTime, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{Order, OrderItem};

/// A line in the order confirmation.
#[derive(Debug, Clone)]
pub struct EmailLine {
    pub name: String,
    pub quantity: i32,
    pub total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping: &'a str,
    total: &'a str,
    address: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping: &'a str,
    total: &'a str,
    address: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    account_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/membership_granted.html")]
struct MembershipEmailHtml<'a> {
    name: &'a str,
    until: Option<&'a str>,
    membership_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/membership_granted.txt")]
struct MembershipEmailText<'a> {
    name: &'a str,
    until: Option<&'a str>,
    membership_url: &'a str,
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

#[derive(Clone)]
struct Smtp {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for customer notifications.
#[derive(Clone)]
pub struct EmailService {
    smtp: Option<Smtp>,
    base_url: String,
}

impl EmailService {
    /// Create an email service. `None` config disables delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, SmtpError> {
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
            base_url: base_url.to_owned(),
        })
    }

    /// Send the order confirmation after payment.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let lines: Vec<EmailLine> = items
            .iter()
            .map(|item| EmailLine {
                name: item.product_name.clone(),
                quantity: item.quantity,
                total: order.money(item.line_total).display(),
            })
            .collect();
        let subtotal = order.money(order.subtotal).display();
        let shipping = order.money(order.shipping).display();
        let total = order.money(order.total).display();
        let address = order.shipping_address.one_line();
        let order_url = format!("{}/account/orders/{}", self.base_url, order.order_number);

        let html = OrderConfirmationHtml {
            name: &order.contact_name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            shipping: &shipping,
            total: &total,
            address: &address,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            name: &order.contact_name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            shipping: &shipping,
            total: &total,
            address: &address,
            order_url: &order_url,
        }
        .render()?;

        let subject = format!("Order {} confirmed", order.order_number);
        self.send_multipart_email(&order.contact_email, &subject, &text, &html)
            .await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let account_url = format!("{}/account", self.base_url);
        let html = WelcomeEmailHtml {
            name,
            account_url: &account_url,
        }
        .render()?;
        let text = WelcomeEmailText {
            name,
            account_url: &account_url,
        }
        .render()?;

        self.send_multipart_email(to, "Welcome to Solenne", &text, &html)
            .await
    }

    /// Tell a customer their membership is active.
    ///
    /// `until` of `None` means lifetime access.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_membership_granted(
        &self,
        to: &str,
        name: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), EmailError> {
        let until = until.map(|d| d.format("%B %-d, %Y").to_string());
        let membership_url = format!("{}/membership", self.base_url);
        let html = MembershipEmailHtml {
            name,
            until: until.as_deref(),
            membership_url: &membership_url,
        }
        .render()?;
        let text = MembershipEmailText {
            name,
            until: until.as_deref(),
            membership_url: &membership_url,
        }
        .render()?;

        self.send_multipart_email(to, "Your Solenne membership is active", &text, &html)
            .await
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

    #[test]
    fn test_welcome_templates_render() {
        let html = WelcomeEmailHtml {
            name: "Ana",
            account_url: "https://solenne.test/account",
        }
        .render()
        .unwrap();
        assert!(html.contains("Ana"));
        assert!(html.contains("https://solenne.test/account"));

        let text = WelcomeEmailText {
            name: "Ana",
            account_url: "https://solenne.test/account",
        }
        .render()
        .unwrap();
        assert!(text.contains("https://solenne.test/account"));
    }

    #[test]
    fn test_membership_template_lifetime() {
        let text = MembershipEmailText {
            name: "Ana",
            until: None,
            membership_url: "https://solenne.test/membership",
        }
        .render()
        .unwrap();
        assert!(text.contains("lifetime"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_skips() {
        let service = EmailService::new(None, "https://solenne.test").unwrap();
        service
            .send_welcome_email("ana@example.com", "Ana")
            .await
            .unwrap();
    }
}
