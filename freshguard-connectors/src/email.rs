//! Email channels for consolidated alert notifications
//!
//! Every channel receives the same flat field map built by the dispatcher
//! (`subject`, `message`, `timestamp`, `severity`, per-parameter
//! `<id>_value` / `<id>_status`, ...). Template-driven services get the map
//! verbatim; SMTP renders it into a plain-text body.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpConfig, HttpConnector, HttpError};
use crate::{lock, ConnectionStats, ConnectorError, EmailChannel, EmailFields};

/// Error type for email delivery failures
#[derive(Debug, Error)]
pub enum EmailError {
    /// HTTP email API failed or rejected the request
    #[error("email API request failed: {0}")]
    Http(#[from] HttpError),

    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Smtp(String),

    /// The recipient or sender address could not be parsed
    #[error("email address parse error: {0}")]
    Address(String),

    /// The MIME message could not be assembled
    #[error("email build error: {0}")]
    Build(String),

    /// Delivery was refused
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// Channel could not be set up
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

// ---------------------------------------------------------------------------
// EmailJS
// ---------------------------------------------------------------------------

const EMAILJS_API_URL: &str = "https://api.emailjs.com";
const EMAILJS_SEND_PATH: &str = "/api/v1.0/email/send";

/// Credentials for the EmailJS REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJsConfig {
    /// Email service configured in the EmailJS dashboard
    pub service_id: String,
    /// Template receiving the notification fields
    pub template_id: String,
    /// Account public key
    #[serde(alias = "public_key")]
    pub user_id: String,
    /// Private key, required when the account enforces it for API calls
    #[serde(default)]
    pub access_token: Option<String>,
    /// API origin, overridable for self-hosted proxies
    #[serde(default = "default_emailjs_url")]
    pub api_url: String,
}

fn default_emailjs_url() -> String {
    EMAILJS_API_URL.to_string()
}

impl EmailJsConfig {
    /// Configuration against the public EmailJS endpoint
    pub fn new(
        service_id: impl Into<String>,
        template_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            template_id: template_id.into(),
            user_id: user_id.into(),
            access_token: None,
            api_url: default_emailjs_url(),
        }
    }
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a EmailFields,
}

/// Sends notifications through an EmailJS template
pub struct EmailJsChannel {
    config: EmailJsConfig,
    http: HttpConnector,
}

impl EmailJsChannel {
    /// Create the channel; sends are never retried
    pub fn new(config: EmailJsConfig) -> Result<Self, EmailError> {
        let http = HttpConnector::new(HttpConfig::new(&config.api_url).timeout_secs(15).max_retries(0))
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        Ok(Self { config, http })
    }
}

#[async_trait::async_trait]
impl EmailChannel for EmailJsChannel {
    async fn send(&self, fields: &EmailFields) -> Result<(), EmailError> {
        let request = EmailJsRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.user_id,
            access_token: self.config.access_token.as_deref(),
            template_params: fields,
        };

        let response = self.http.post_json(EMAILJS_SEND_PATH, &request).await?;
        log::info!(
            "EmailJS accepted notification via template {}: {}",
            self.config.template_id,
            response.trim()
        );
        Ok(())
    }

    fn stats(&self) -> ConnectionStats {
        self.http.stats()
    }
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS)
#[cfg(feature = "smtp")]
const DEFAULT_SMTP_PORT: u16 = 587;

#[cfg(feature = "smtp")]
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

/// Configuration for SMTP delivery
#[cfg(feature = "smtp")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port (defaults to 587)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// RFC 5322 "From" address
    pub from_address: String,
    /// Recipient of every notification
    pub to_address: String,
    /// Optional SMTP username
    #[serde(default)]
    pub smtp_user: Option<String>,
    /// Optional SMTP password
    #[serde(default)]
    pub smtp_password: Option<String>,
}

#[cfg(feature = "smtp")]
impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless both `SMTP_HOST` and `SMTP_TO` are set.
    ///
    /// | Variable        | Required | Default                    |
    /// |-----------------|----------|----------------------------|
    /// | `SMTP_HOST`     | yes      |                            |
    /// | `SMTP_TO`       | yes      |                            |
    /// | `SMTP_PORT`     | no       | `587`                      |
    /// | `SMTP_FROM`     | no       | `freshguard@localhost`     |
    /// | `SMTP_USER`     | no       |                            |
    /// | `SMTP_PASSWORD` | no       |                            |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let to_address = std::env::var("SMTP_TO").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "freshguard@localhost".to_string()),
            to_address,
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

/// Sends notifications as plain-text mail through an SMTP relay
#[cfg(feature = "smtp")]
pub struct SmtpEmailChannel {
    config: SmtpConfig,
    stats: Mutex<ConnectionStats>,
}

#[cfg(feature = "smtp")]
impl SmtpEmailChannel {
    /// Create the channel; addresses are checked on every send
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(ConnectionStats::default()),
        }
    }

    async fn deliver(&self, fields: &EmailFields) -> Result<usize, EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let (subject, body) = render_plain_text(fields);
        let size = body.len();

        let email = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e: lettre::address::AddressError| EmailError::Address(e.to_string()))?,
            )
            .to(self
                .config
                .to_address
                .parse()
                .map_err(|e: lettre::address::AddressError| EmailError::Address(e.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| EmailError::Smtp(e.to_string()))?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer
            .send(email)
            .await
            .map_err(|e| EmailError::Smtp(e.to_string()))?;

        log::info!("notification email sent to {}", self.config.to_address);
        Ok(size)
    }
}

#[cfg(feature = "smtp")]
#[async_trait::async_trait]
impl EmailChannel for SmtpEmailChannel {
    async fn send(&self, fields: &EmailFields) -> Result<(), EmailError> {
        match self.deliver(fields).await {
            Ok(size) => {
                lock(&self.stats).record_success(size, 0);
                Ok(())
            }
            Err(e) => {
                lock(&self.stats).record_failure(&e);
                Err(e)
            }
        }
    }

    fn stats(&self) -> ConnectionStats {
        lock(&self.stats).clone()
    }
}

/// Subject and body for transports without templates
///
/// The body is the `message` field followed by every other field except
/// `subject`, one `name: value` per line.
pub fn render_plain_text(fields: &EmailFields) -> (String, String) {
    let subject = fields
        .get("subject")
        .cloned()
        .unwrap_or_else(|| "FreshGuard alert".to_string());

    let mut body = fields.get("message").cloned().unwrap_or_default();
    body.push_str("\n\n");
    for (name, value) in fields {
        if name == "subject" || name == "message" {
            continue;
        }
        body.push_str(name);
        body.push_str(": ");
        body.push_str(value);
        body.push('\n');
    }

    (subject, body)
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Records every send attempt; clones share the record
#[derive(Clone, Default)]
pub struct MemoryEmail {
    attempts: Arc<Mutex<Vec<(EmailFields, bool)>>>,
    failure: Arc<Mutex<Option<String>>>,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl MemoryEmail {
    /// Channel that accepts every message
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following send with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *lock(&self.failure) = Some(reason.into());
    }

    /// Accept sends again
    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    /// Messages that were accepted
    pub fn sent(&self) -> Vec<EmailFields> {
        lock(&self.attempts)
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(fields, _)| fields.clone())
            .collect()
    }

    /// Number of send attempts, accepted or not
    pub fn attempts(&self) -> usize {
        lock(&self.attempts).len()
    }
}

#[async_trait::async_trait]
impl EmailChannel for MemoryEmail {
    async fn send(&self, fields: &EmailFields) -> Result<(), EmailError> {
        let failure = lock(&self.failure).clone();
        lock(&self.attempts).push((fields.clone(), failure.is_none()));

        match failure {
            Some(reason) => {
                let err = EmailError::Rejected(reason);
                lock(&self.stats).record_failure(&err);
                Err(err)
            }
            None => {
                let size = fields.values().map(String::len).sum();
                lock(&self.stats).record_success(size, 0);
                Ok(())
            }
        }
    }

    fn stats(&self) -> ConnectionStats {
        lock(&self.stats).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> EmailFields {
        EmailFields::from([
            ("subject".to_string(), "DANGER: 2 new alerts".to_string()),
            ("message".to_string(), "Methane is high".to_string()),
            ("ch4_value".to_string(), "1750".to_string()),
        ])
    }

    #[test]
    fn emailjs_payload_shape() {
        let config = EmailJsConfig {
            access_token: Some("secret".to_string()),
            ..EmailJsConfig::new("service_x", "template_y", "pk_z")
        };
        let fields = fields();

        let request = EmailJsRequest {
            service_id: &config.service_id,
            template_id: &config.template_id,
            user_id: &config.user_id,
            access_token: config.access_token.as_deref(),
            template_params: &fields,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["service_id"], "service_x");
        assert_eq!(json["user_id"], "pk_z");
        assert_eq!(json["accessToken"], "secret");
        assert_eq!(json["template_params"]["ch4_value"], "1750");
    }

    #[test]
    fn emailjs_config_accepts_public_key_alias() {
        let config: EmailJsConfig = serde_json::from_str(
            r#"{"service_id": "s", "template_id": "t", "public_key": "p"}"#,
        )
        .unwrap();

        assert_eq!(config.user_id, "p");
        assert_eq!(config.api_url, "https://api.emailjs.com");
        assert!(config.access_token.is_none());
    }

    #[test]
    fn plain_text_rendering() {
        let (subject, body) = render_plain_text(&fields());

        assert_eq!(subject, "DANGER: 2 new alerts");
        assert!(body.starts_with("Methane is high\n\n"));
        assert!(body.contains("ch4_value: 1750\n"));
        assert!(!body.contains("subject:"));
    }

    #[tokio::test]
    async fn memory_email_can_fail() {
        let email = MemoryEmail::new();
        let handle = email.clone();

        email.send(&fields()).await.unwrap();
        handle.fail_with("quota exceeded");
        let err = email.send(&fields()).await.unwrap_err();

        assert_eq!(err.to_string(), "delivery rejected: quota exceeded");
        assert_eq!(handle.attempts(), 2);
        assert_eq!(handle.sent().len(), 1);
    }

    #[cfg(feature = "smtp")]
    #[test]
    fn smtp_config_from_json_defaults_port() {
        let config: SmtpConfig = serde_json::from_str(
            r#"{"smtp_host": "mail.local", "from_address": "a@b.c", "to_address": "d@e.f"}"#,
        )
        .unwrap();

        assert_eq!(config.smtp_port, 587);
        assert!(config.smtp_user.is_none());
    }
}
