use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "cachewatch";

/// An account whose password may live in the keychain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Geocaching(String),
    Smtp(String),
}

impl Account {
    /// Keychain user name; prefixed so both accounts can share one service entry.
    pub fn key(&self) -> String {
        match self {
            Account::Geocaching(user) => format!("geocaching:{}", user),
            Account::Smtp(user) => format!("smtp:{}", user),
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store a password in the OS keychain
    pub fn store(account: &Account, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, &account.key())
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an account from the OS keychain
    pub fn get_password(account: &Account) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, &account.key())
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for an account
    pub fn delete(account: &Account) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, &account.key())
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    pub fn has_credentials(account: &Account) -> bool {
        Self::get_password(account).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_keys_are_distinct() {
        let gc = Account::Geocaching("betzebuwe".into());
        let smtp = Account::Smtp("betzebuwe".into());
        assert_eq!(gc.key(), "geocaching:betzebuwe");
        assert_eq!(smtp.to_string(), "smtp:betzebuwe");
        assert_ne!(gc.key(), smtp.key());
    }

    #[test]
    fn test_stored_password_is_readable_from_a_new_entry() {
        let account = Account::Smtp(format!("cachewatch-test-{}", std::process::id()));

        if let Err(e) = CredentialStore::store(&account, "pw-1") {
            // Sandboxes without a reachable keychain (e.g. keyctl filtered by seccomp)
            match e.downcast_ref::<keyring::Error>() {
                Some(keyring::Error::PlatformFailure(_)) | Some(keyring::Error::NoStorageAccess(_)) => {
                    eprintln!("skipping, no keychain available: {e:#}");
                    return;
                }
                _ => panic!("store failed: {e:#}"),
            }
        }

        // Each call builds its own Entry, so this only passes with a persistent backend
        assert_eq!(CredentialStore::get_password(&account).unwrap(), "pw-1");
        assert!(CredentialStore::has_credentials(&account));

        CredentialStore::delete(&account).unwrap();
        assert!(!CredentialStore::has_credentials(&account));
    }
}
