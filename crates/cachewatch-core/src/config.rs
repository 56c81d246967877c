//! Application configuration.
//!
//! Settings are read once at startup from the environment (a `.env` file is
//! loaded by the binary first) into an explicit `Config` that is handed to
//! the watch loop. Passwords missing from the environment are looked up in
//! the OS keychain.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::auth::{Account, CredentialStore};

/// Application name used for the data directory path
pub const APP_NAME: &str = "cachewatch";

/// State file name
const STATE_FILE: &str = "logs.json";

const DEFAULT_API_URL: &str = "https://api.groundspeak.com";
const DEFAULT_AUTH_URL: &str = "https://oauth.geocaching.com";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Three days between polling cycles.
const DEFAULT_SLEEP_SECS: u64 = 3 * 24 * 60 * 60;

pub const GEOCACHING_USERNAME: &str = "GEOCACHING_USERNAME";
pub const GEOCACHING_PASSWORD: &str = "GEOCACHING_PASSWORD";
pub const SMTP_USERNAME: &str = "SMTP_USERNAME";
pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
const CACHE_OWNER: &str = "CACHE_OWNER";
const GEOCACHING_API_URL: &str = "GEOCACHING_API_URL";
const GEOCACHING_AUTH_URL: &str = "GEOCACHING_AUTH_URL";
const SMTP_HOST: &str = "SMTP_HOST";
const SMTP_PORT: &str = "SMTP_PORT";
const EMAIL_RECEIVER: &str = "EMAIL_RECEIVER";
const SLEEP_TIME: &str = "SLEEP_TIME";
const LOG_FILE: &str = "LOG_FILE";

/// Older deployments configured the mail account under these names.
const LEGACY_SMTP_USERNAME: &str = "GMAIL_EMAIL";
const LEGACY_SMTP_PASSWORD: &str = "GMAIL_PW";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GeocachingConfig {
    pub api_url: String,
    pub auth_url: String,
    pub username: String,
    pub password: String,
    /// Account whose hidden caches are watched
    pub owner: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub geocaching: GeocachingConfig,
    pub smtp: SmtpConfig,
    pub state_file: PathBuf,
    pub poll_interval: Duration,
}

impl Config {
    /// Read the process environment, falling back to the keychain for passwords.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&HashMap::new())
    }

    /// Like `from_env`, with values entered interactively taking the place of
    /// unset variables.
    pub fn from_env_with(entered: &HashMap<&'static str, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            env_value(key)
                .or_else(|| entered.get(key).cloned())
                .or_else(|| keychain_fallback(key))
        })
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let username = require(GEOCACHING_USERNAME)?;
        let geocaching = GeocachingConfig {
            api_url: get(GEOCACHING_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_url: get(GEOCACHING_AUTH_URL).unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            password: require(GEOCACHING_PASSWORD)?,
            owner: get(CACHE_OWNER).unwrap_or_else(|| username.clone()),
            username,
        };

        let smtp = SmtpConfig {
            host: get(SMTP_HOST).unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: parse_or(get(SMTP_PORT), SMTP_PORT, DEFAULT_SMTP_PORT)?,
            username: get(SMTP_USERNAME)
                .or_else(|| get(LEGACY_SMTP_USERNAME))
                .ok_or(ConfigError::Missing(SMTP_USERNAME))?,
            password: get(SMTP_PASSWORD)
                .or_else(|| get(LEGACY_SMTP_PASSWORD))
                .ok_or(ConfigError::Missing(SMTP_PASSWORD))?,
            recipient: require(EMAIL_RECEIVER)?,
        };

        let sleep_secs = parse_or(get(SLEEP_TIME), SLEEP_TIME, DEFAULT_SLEEP_SECS)?;
        if sleep_secs == 0 {
            return Err(ConfigError::Invalid {
                key: SLEEP_TIME,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            geocaching,
            smtp,
            state_file: get(LOG_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(default_state_file),
            poll_interval: Duration::from_secs(sleep_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// `<data dir>/cachewatch/logs.json`, or `logs.json` in the working directory
/// when the platform has no data directory.
pub fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME).join(STATE_FILE))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Keychain account holding the password for a password setting.
fn password_account(key: &str) -> Option<Account> {
    account_for(key, env_value)
}

fn account_for<F>(key: &str, lookup: F) -> Option<Account>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    match key {
        GEOCACHING_PASSWORD => Some(Account::Geocaching(get(GEOCACHING_USERNAME)?)),
        SMTP_PASSWORD => Some(Account::Smtp(
            get(SMTP_USERNAME).or_else(|| get(LEGACY_SMTP_USERNAME))?,
        )),
        _ => None,
    }
}

/// Every account the configured user names could have stored a password under.
pub fn keychain_accounts() -> Vec<Account> {
    keychain_accounts_from(env_value)
}

fn keychain_accounts_from<F>(lookup: F) -> Vec<Account>
where
    F: Fn(&str) -> Option<String>,
{
    [GEOCACHING_PASSWORD, SMTP_PASSWORD]
        .into_iter()
        .filter_map(|key| account_for(key, &lookup))
        .collect()
}

fn keychain_fallback(key: &str) -> Option<String> {
    let account = password_account(key)?;
    let password = CredentialStore::get_password(&account).ok()?;
    debug!(account = %account, "Using password from keychain");
    Some(password)
}

/// Password settings that are neither in the environment nor in the keychain,
/// with the account each belongs to. Accounts whose user name is unset are
/// skipped; `from_env` reports those as missing.
pub fn missing_passwords() -> Vec<(&'static str, Account)> {
    let legacy = |key: &str| match key {
        SMTP_PASSWORD => env_value(LEGACY_SMTP_PASSWORD),
        _ => None,
    };
    [GEOCACHING_PASSWORD, SMTP_PASSWORD]
        .into_iter()
        .filter(|key| env_value(key).or_else(|| legacy(*key)).is_none())
        .filter_map(|key| password_account(key).map(|account| (key, account)))
        .filter(|(_, account)| !CredentialStore::has_credentials(account))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (GEOCACHING_USERNAME, "betzebuwe"),
            (GEOCACHING_PASSWORD, "gc-secret"),
            (SMTP_USERNAME, "me@example.com"),
            (SMTP_PASSWORD, "mail-secret"),
            (EMAIL_RECEIVER, "alerts@example.com"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.geocaching.owner, "betzebuwe");
        assert_eq!(config.geocaching.api_url, DEFAULT_API_URL);
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.poll_interval, Duration::from_secs(259_200));
        assert!(config.state_file.ends_with("logs.json"));
    }

    #[test]
    fn test_overrides_and_legacy_mail_names() {
        let mut env = base_env();
        env.remove(SMTP_USERNAME);
        env.remove(SMTP_PASSWORD);
        env.insert(LEGACY_SMTP_USERNAME, "old@gmail.com");
        env.insert(LEGACY_SMTP_PASSWORD, "old-secret");
        env.insert(CACHE_OWNER, "someone-else");
        env.insert(SLEEP_TIME, "3600");
        env.insert(LOG_FILE, "/tmp/state.json");

        let config = load(&env).unwrap();
        assert_eq!(config.smtp.username, "old@gmail.com");
        assert_eq!(config.smtp.password, "old-secret");
        assert_eq!(config.geocaching.owner, "someone-else");
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn test_keychain_accounts_follow_legacy_mail_name() {
        let mut env = base_env();
        env.insert(SMTP_USERNAME, "");
        env.insert(LEGACY_SMTP_USERNAME, "old@gmail.com");
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        assert_eq!(
            keychain_accounts_from(lookup),
            vec![
                Account::Geocaching("betzebuwe".into()),
                Account::Smtp("old@gmail.com".into()),
            ]
        );

        env.remove(GEOCACHING_USERNAME);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());
        assert_eq!(
            keychain_accounts_from(lookup),
            vec![Account::Smtp("old@gmail.com".into())]
        );
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let mut env = base_env();
        env.remove(EMAIL_RECEIVER);
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(EMAIL_RECEIVER));

        let mut env = base_env();
        env.insert(GEOCACHING_PASSWORD, "  ");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(GEOCACHING_PASSWORD));

        let mut env = base_env();
        env.insert(SLEEP_TIME, "three days");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: SLEEP_TIME, .. }
        ));

        let mut env = base_env();
        env.insert(SLEEP_TIME, "0");
        assert!(load(&env).is_err());
    }
}
