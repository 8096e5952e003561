//! Email delivery: SMTP transport, send throttling and message templates.

pub mod email;
pub mod error;
pub mod template;
pub mod throttle;

pub use email::{SmtpConfig, SmtpMailer};
pub use error::{NotifyError, Result};
pub use throttle::SendThrottle;

use async_trait::async_trait;

/// Outbound email boundary.
///
/// `is_configured` is checked before composing a message so callers can
/// record an audit row ("SMTP is not configured") without attempting a
/// send that cannot succeed.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}
