//! Email service for one-time codes.
//!
//! Uses SMTP via lettre with Askama templates. Without SMTP settings the
//! service runs in development mode and writes codes to the log instead.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use senmarket_core::OtpPurpose;

use crate::config::EmailConfig;

/// HTML template for a one-time code email.
#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    heading: &'a str,
    name: &'a str,
    intro: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

/// Plain text template for a one-time code email.
#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    heading: &'a str,
    name: &'a str,
    intro: &'a str,
    code: &'a str,
    ttl_minutes: i64,
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
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<Mailer>,
}

impl EmailService {
    /// Create an email service. `None` selects development mode.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            tracing::warn!("SMTP not configured, one-time codes will be logged");
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Some(Mailer {
                transport,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// A service that only logs.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { mailer: None }
    }

    /// Send a one-time code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(
        &self,
        to: &str,
        name: &str,
        code: &str,
        purpose: OtpPurpose,
        ttl_minutes: i64,
    ) -> Result<(), EmailError> {
        let (subject, heading, intro) = otp_copy(purpose);

        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, purpose = %purpose, code = %code, "Development mode: one-time code");
            return Ok(());
        };

        let html = OtpEmailHtml {
            heading,
            name,
            intro,
            code,
            ttl_minutes,
        }
        .render()?;
        let text = OtpEmailText {
            heading,
            name,
            intro,
            code,
            ttl_minutes,
        }
        .render()?;

        mailer.send_multipart_email(to, subject, &text, &html).await
    }
}

impl Mailer {
    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
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

        self.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Subject, heading and intro line for each kind of code.
const fn otp_copy(purpose: OtpPurpose) -> (&'static str, &'static str, &'static str) {
    match purpose {
        OtpPurpose::Register => (
            "SenMarket - Mã xác thực tài khoản",
            "Xác thực email",
            "Cảm ơn bạn đã đăng ký SenMarket. Nhập mã dưới đây để kích hoạt tài khoản.",
        ),
        OtpPurpose::PasswordReset => (
            "SenMarket - Mã đặt lại mật khẩu",
            "Đặt lại mật khẩu",
            "Chúng tôi nhận được yêu cầu đặt lại mật khẩu cho tài khoản của bạn.",
        ),
    }
}

/// Generate a 6-digit verification code.
#[must_use]
pub fn generate_verification_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_verification_code_format() {
        let code = generate_verification_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_otp_templates_render() {
        let (_, heading, intro) = otp_copy(OtpPurpose::Register);
        let html = OtpEmailHtml {
            heading,
            name: "Lan",
            intro,
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .expect("html renders");
        assert!(html.contains("482913"));
        assert!(html.contains("Lan"));

        let text = OtpEmailText {
            heading,
            name: "Lan",
            intro,
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .expect("text renders");
        assert!(text.contains("Mã xác thực: 482913"));
        assert!(text.contains("10 phút"));
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_fail() {
        let service = EmailService::disabled();
        service
            .send_otp("lan@example.vn", "Lan", "123456", OtpPurpose::PasswordReset, 10)
            .await
            .expect("logging never fails");
    }
}
