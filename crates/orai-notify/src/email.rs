use crate::error::{NotifyError, Result};
use crate::Mailer;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

/// SMTP relay settings, typically loaded from the config file and then
/// overridden by environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

// Must agree with the serde field default, or a missing [smtp] section
// (Default) and an empty one (Deserialize) would disagree on the port.
impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            from: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpConfig {
    /// Apply `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASS` /
    /// `SMTP_FROM` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SMTP_HOST") {
            self.host = Some(host);
        }
        if let Some(port) = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Ok(user) = std::env::var("SMTP_USER") {
            self.username = Some(user);
        }
        if let Ok(pass) = std::env::var("SMTP_PASS") {
            self.password = Some(pass);
        }
        if let Ok(from) = std::env::var("SMTP_FROM") {
            self.from = Some(from);
        }
        self
    }

    /// A relay is usable once both a host and a sender address are present.
    pub fn is_complete(&self) -> bool {
        let has_host = self.host.as_deref().is_some_and(|h| !h.trim().is_empty());
        let has_from = self.from.as_deref().is_some_and(|f| !f.trim().is_empty());
        has_host && has_from
    }
}

struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

/// Mailer backed by an async SMTP transport. Constructed unconditionally;
/// when the config is incomplete it reports unconfigured and refuses sends
/// instead of failing at startup.
pub struct SmtpMailer {
    relay: Option<SmtpRelay>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        if !config.is_complete() {
            tracing::warn!("SMTP host/from not set, email delivery disabled");
            return Ok(Self { relay: None });
        }

        // is_complete() guarantees both are present
        let host = config.host.clone().unwrap_or_default();
        let from = config.from.clone().unwrap_or_default();

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            relay: Some(SmtpRelay {
                transport: builder.build(),
                from,
            }),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn is_configured(&self) -> bool {
        self.relay.is_some()
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let Some(relay) = &self.relay else {
            return Err(NotifyError::NotConfigured);
        };

        let email = Message::builder()
            .from(
                relay
                    .from
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(relay.from.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| NotifyError::MessageError(e.to_string()))?;

        relay
            .transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;

        Ok(())
    }
}
