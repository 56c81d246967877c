//! Email notification: digest composition and SMTP delivery.

pub mod digest;
pub mod mailer;

pub use digest::Digest;
pub use mailer::{Mailer, SmtpMailer};
