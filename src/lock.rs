//! Optional PIN that gates every command once set.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::core::Invalid;
use crate::store::{self, CredentialStore};

pub const PIN_CREDENTIAL: &str = "app_pin";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invalid(#[from] Invalid),
    #[error("app is locked, pass --pin to unlock")]
    Locked,
    #[error("incorrect PIN")]
    Denied,
    #[error(transparent)]
    Store(#[from] store::Error),
}

pub fn validate_pin(pin: &str) -> Result<(), Invalid> {
    let len = pin.len();
    if !(4..=6).contains(&len) || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Invalid::Pin);
    }
    Ok(())
}

fn digest(salt: &str, pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted digest in the form `salt$hex`.
pub fn hash_pin(pin: &str) -> Result<String, Invalid> {
    validate_pin(pin)?;
    let salt = ulid::Ulid::new().to_string();
    Ok(format!("{}${}", salt, digest(&salt, pin)))
}

pub fn verify_pin(stored: &str, pin: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => digest(salt, pin) == hash,
        None => false,
    }
}

pub struct AppLock<'a, S>(&'a S);

impl<'a, S: CredentialStore> AppLock<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self(store)
    }

    pub async fn is_set(&self) -> Result<bool, Error> {
        Ok(self.0.credential(PIN_CREDENTIAL).await?.is_some())
    }

    #[tracing::instrument(skip(self, pin))]
    pub async fn set(&self, pin: &str) -> Result<(), Error> {
        let hashed = hash_pin(pin)?;
        self.0.set_credential(PIN_CREDENTIAL, &hashed).await?;
        info!("app lock enabled");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), Error> {
        self.0.clear_credential(PIN_CREDENTIAL).await?;
        info!("app lock removed");
        Ok(())
    }

    /// Succeeds when no PIN is set or `pin` matches the stored one.
    pub async fn unlock(&self, pin: Option<&str>) -> Result<(), Error> {
        let stored = match self.0.credential(PIN_CREDENTIAL).await? {
            Some(stored) => stored,
            None => return Ok(()),
        };

        match pin {
            None => Err(Error::Locked),
            Some(pin) if verify_pin(&stored, pin) => Ok(()),
            Some(_) => Err(Error::Denied),
        }
    }
}
