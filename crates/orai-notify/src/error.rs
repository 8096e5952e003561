/// Errors that can occur while delivering email notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No SMTP relay is configured; sends are impossible until one is.
    #[error("Notify: SMTP is not configured")]
    NotConfigured,

    /// The sender or recipient address failed to parse.
    #[error("Notify: invalid email address: {0}")]
    InvalidAddress(String),

    /// SMTP transport error while relaying the message.
    #[error("Notify: SMTP error: {0}")]
    SmtpError(String),

    /// Building the MIME message failed.
    #[error("Notify: message build error: {0}")]
    MessageError(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
