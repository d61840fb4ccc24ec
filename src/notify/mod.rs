//! Notification collaborator: message composition and delivery.
//!
//! The engine decides *what* to send (see [`messages`]) and hands finished
//! subject/body pairs to a [`Notifier`]. The bundled implementation delivers
//! plain-text email over SMTP; tests substitute a recording notifier.

pub mod errors;
pub mod mailer;
pub mod messages;

pub use errors::{NotifyError, NotifyResult};
pub use mailer::{Notifier, SmtpConfig, SmtpNotifier};

#[cfg(test)]
pub use mailer::mock;
