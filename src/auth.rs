use crate::error::{PinCfgError, Result};
use crate::model::Configuration;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref HASH_RE: Regex = Regex::new(r"^[a-fA-F0-9]{64}$").expect("valid hash pattern");
}

/// Password material recovered from wire text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A SHA-256 hex digest, already lowercased
    Hash(String),
    /// A legacy plaintext password that still has to be hashed
    Legacy(String),
}

impl Credential {
    pub fn from_value(value: &str) -> Self {
        if is_hash(value) {
            Credential::Hash(value.to_lowercase())
        } else {
            Credential::Legacy(value.to_string())
        }
    }
}

pub fn is_hash(value: &str) -> bool {
    HASH_RE.is_match(value)
}

/// Lowercase hex SHA-256 of `text`; empty text has no digest.
pub fn sha256_hex(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || sha256_hex(&password))
        .await
        .map_err(|e| PinCfgError::Auth(format!("Hashing task failed: {}", e)))
}

impl Configuration {
    pub async fn set_password(&mut self, password: &str) -> Result<()> {
        let hash = hash_password(password).await?;
        self.auth_password = password.to_string();
        self.auth_password_hash = hash;
        debug!("Password hash updated");
        Ok(())
    }

    /// Accepts a pasted digest as-is and forgets the plaintext.
    pub fn set_password_hash(&mut self, value: &str) -> Result<()> {
        let value = value.trim();
        if !is_hash(value) {
            return Err(PinCfgError::Auth(
                "Password hash must be 64 hex characters".to_string(),
            ));
        }
        self.auth_password_hash = value.to_lowercase();
        self.auth_password.clear();
        Ok(())
    }

    pub async fn apply_credential(&mut self, credential: Credential) -> Result<()> {
        match credential {
            Credential::Hash(hash) => {
                self.auth_password_hash = hash;
                self.auth_password.clear();
                Ok(())
            }
            Credential::Legacy(password) => self.set_password(&password).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_digest() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_hex(""), "");
    }

    #[test]
    fn test_hash_shape() {
        assert!(is_hash(&"a".repeat(64)));
        assert!(is_hash(&"AB".repeat(32)));
        assert!(!is_hash(&"a".repeat(63)));
        assert!(!is_hash(&"g".repeat(64)));
        assert!(!is_hash("mypassword"));
    }

    #[test]
    fn test_credential_from_value() {
        assert_eq!(Credential::from_value(&"AB".repeat(32)), Credential::Hash("ab".repeat(32)));
        assert_eq!(Credential::from_value("mypassword"), Credential::Legacy("mypassword".into()));
    }

    #[tokio::test]
    async fn test_set_password_hashes() {
        let mut config = Configuration::new();
        config.set_password("abc").await.unwrap();
        assert_eq!(config.auth_password, "abc");
        assert_eq!(config.auth_password_hash, sha256_hex("abc"));
    }

    #[test]
    fn test_set_password_hash_direct() {
        let mut config = Configuration::new();
        config.auth_password = "old".to_string();
        config.set_password_hash(&"F".repeat(64)).unwrap();
        assert_eq!(config.auth_password_hash, "f".repeat(64));
        assert!(config.auth_password.is_empty());
        assert!(config.set_password_hash("short").is_err());
    }

    #[tokio::test]
    async fn test_legacy_credential_is_hashed() {
        let mut config = Configuration::new();
        config
            .apply_credential(Credential::Legacy("mypassword".into()))
            .await
            .unwrap();
        assert_eq!(config.auth_password, "mypassword");
        assert_ne!(config.auth_password_hash, "mypassword");
        assert_eq!(config.auth_password_hash, sha256_hex("mypassword"));
    }
}
