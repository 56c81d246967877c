//! Credential storage for the geocaching and mail accounts.
//!
//! Passwords that are not set in the environment are kept in the OS
//! keychain via `CredentialStore`.

pub mod credentials;

pub use credentials::{Account, CredentialStore};
