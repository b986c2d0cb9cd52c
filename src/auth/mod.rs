//! API credential handling.
//!
//! The key is resolved once per session, in order: the `DAWBREI_API_KEY`
//! and `OPENAI_API_KEY` environment variables, the system keyring, then an
//! interactive prompt. A missing or blank key stops the program before any
//! session starts.

use keyring::Entry;
use std::fmt;
use tracing::{debug, warn};

mod ui;

pub use self::ui::{prompt_confirmation, prompt_token};

const KEYRING_SERVICE: &str = "dawbrei";
const KEYRING_USER: &str = "api-key";

pub const API_KEY_ENV_VARS: &[&str] = &["DAWBREI_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug)]
pub enum AuthError {
    /// No key was found and none was entered.
    MissingCredential,
    /// The system keyring refused the operation.
    Keyring(keyring::Error),
    /// Reading the prompt answer failed.
    Io(std::io::Error),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredential => write!(
                f,
                "An API key is required to use this application.\n\n\
                 Store one with `dawbrei auth`, or set DAWBREI_API_KEY / OPENAI_API_KEY."
            ),
            AuthError::Keyring(err) => write!(f, "Keyring error: {err}"),
            AuthError::Io(err) => write!(f, "Could not read API key: {err}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::MissingCredential => None,
            AuthError::Keyring(err) => Some(err),
            AuthError::Io(err) => Some(err),
        }
    }
}

impl From<keyring::Error> for AuthError {
    fn from(err: keyring::Error) -> Self {
        AuthError::Keyring(err)
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Io(err)
    }
}

/// Where the session's key came from, for the startup banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment(&'static str),
    Keyring,
    Prompt,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment(var) => write!(f, "{var}"),
            CredentialSource::Keyring => write!(f, "system keyring"),
            CredentialSource::Prompt => write!(f, "prompt"),
        }
    }
}

pub struct AuthManager {
    use_keyring: bool,
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Keyring backends that are locked or absent (headless sessions) are
/// treated as "no stored key" rather than a hard failure.
fn is_recoverable(err: &keyring::Error) -> bool {
    matches!(
        err,
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
    )
}

impl AuthManager {
    pub fn new() -> Self {
        Self::new_with_keyring(true)
    }

    /// Construct an AuthManager, optionally disabling keyring access (useful for tests)
    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    fn entry() -> Result<Entry, AuthError> {
        Ok(Entry::new(KEYRING_SERVICE, KEYRING_USER)?)
    }

    pub fn store_token(&self, token: &str) -> Result<(), AuthError> {
        if !self.use_keyring {
            return Ok(());
        }
        Self::entry()?.set_password(token)?;
        Ok(())
    }

    pub fn get_token(&self) -> Result<Option<String>, AuthError> {
        if !self.use_keyring {
            return Ok(None);
        }
        match Self::entry()?.get_password() {
            Ok(token) => Ok(non_blank(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the stored key; returns whether one existed.
    pub fn remove_token(&self) -> Result<bool, AuthError> {
        if !self.use_keyring {
            return Ok(false);
        }
        match Self::entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn token_from_env() -> Option<(String, CredentialSource)> {
        API_KEY_ENV_VARS.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .and_then(non_blank)
                .map(|key| (key, CredentialSource::Environment(*var)))
        })
    }

    /// Resolve the session key, calling `prompt` only when nothing is stored.
    pub fn resolve_api_key_with<F>(
        &self,
        prompt: F,
    ) -> Result<(String, CredentialSource), AuthError>
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        if let Some(found) = Self::token_from_env() {
            debug!(source = %found.1, "Using API key from environment");
            return Ok(found);
        }

        match self.get_token() {
            Ok(Some(token)) => return Ok((token, CredentialSource::Keyring)),
            Ok(None) => {}
            Err(AuthError::Keyring(err)) if is_recoverable(&err) => {
                warn!(error = %err, "Keyring unavailable; falling back to prompt");
            }
            Err(err) => return Err(err),
        }

        non_blank(prompt()?)
            .map(|key| (key, CredentialSource::Prompt))
            .ok_or(AuthError::MissingCredential)
    }

    pub fn resolve_api_key(&self) -> Result<(String, CredentialSource), AuthError> {
        self.resolve_api_key_with(|| prompt_token("Please enter your API key: "))
    }

    pub fn interactive_auth(&self) -> Result<(), AuthError> {
        println!("🔐 Dawbrei Authentication Setup");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if self.get_token()?.is_some() {
            println!("A key is already stored and will be replaced.");
        }

        let token = non_blank(prompt_token("Enter your API key: ")?)
            .ok_or(AuthError::MissingCredential)?;
        self.store_token(&token)?;

        println!("✓ Key stored securely in the system keyring");
        Ok(())
    }

    pub fn interactive_deauth(&self) -> Result<(), AuthError> {
        if self.get_token()?.is_none() {
            println!("No stored API key found.");
            return Ok(());
        }
        if !prompt_confirmation("Remove the stored API key?")? {
            println!("Cancelled.");
            return Ok(());
        }
        if self.remove_token()? {
            println!("✓ Stored API key removed");
        }
        Ok(())
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}
