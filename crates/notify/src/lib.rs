//! Outbound notification delivery.
//!
//! In-app notification rows live in `mdc-db`; this crate covers the channel
//! that leaves the system: plain-text email over SMTP. Delivery is strictly
//! best-effort — workflow state never depends on whether a mail went out.

pub mod email;

pub use email::{EmailConfig, EmailDelivery, EmailError};

/// Facade over the optional email channel.
///
/// Holds `None` when SMTP is not configured, in which case every send is a
/// logged no-op. Constructed once at startup and shared.
pub struct Notifier {
    email: Option<EmailDelivery>,
}

impl Notifier {
    /// Build from environment variables. Email is enabled only when
    /// `SMTP_HOST` is set.
    pub fn from_env() -> Self {
        Self {
            email: EmailConfig::from_env().map(EmailDelivery::new),
        }
    }

    /// A notifier with no outbound channel, for tests and local runs.
    pub fn disabled() -> Self {
        Self { email: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.email.is_some()
    }

    /// Send one email, best-effort. Failures are logged and swallowed so a
    /// broken relay cannot fail the caller's transaction or batch run.
    pub async fn send(&self, to: &str, subject: &str, body: &str) {
        let Some(email) = &self.email else {
            tracing::debug!(to, subject, "email delivery not configured, skipping");
            return;
        };
        if let Err(error) = email.deliver(to, subject, body).await {
            tracing::warn!(to, subject, %error, "notification email failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_send_is_a_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        // Must return without attempting any network traffic.
        notifier.send("user@example.com", "subject", "body").await;
    }
}
