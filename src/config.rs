//! Terminal configuration: where the store URL and API key come from.
//!
//! Resolution order is environment variables first (useful for development
//! and headless runs), then the OS credential store: DPAPI on Windows,
//! Keychain on macOS, Secret Service on Linux. Setup accepts a single
//! pasted "connection string": either plain JSON or base64url-encoded JSON
//! carrying `{"url": ..., "key": ...}`.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use keyring::Entry;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PosError;
use crate::supabase::normalize_store_url;

const SERVICE_NAME: &str = "cft-pos";

// Credential keys
const KEY_SUPABASE_URL: &str = "supabase_url";
const KEY_SUPABASE_ANON_KEY: &str = "supabase_anon_key";

// Environment overrides
pub const ENV_STORE_URL: &str = "CFT_SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "CFT_SUPABASE_ANON_KEY";

/// Resolved store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub anon_key: String,
}

// ---------------------------------------------------------------------------
// Low-level keyring helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), PosError> {
    let entry =
        Entry::new(SERVICE_NAME, key).map_err(|e| PosError::Remote(format!("keyring: {e}")))?;
    entry
        .set_password(value)
        .map_err(|e| PosError::Remote(format!("keyring: {e}")))?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), PosError> {
    let entry =
        Entry::new(SERVICE_NAME, key).map_err(|e| PosError::Remote(format!("keyring: {e}")))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(PosError::Remote(format!("keyring: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Connection-string decoding
// ---------------------------------------------------------------------------

fn decode_connection_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

/// Parse a pasted connection string into a [`StoreConfig`] without
/// persisting anything.
pub fn parse_connection_string(raw: &str) -> Result<StoreConfig, PosError> {
    let payload = decode_connection_payload(raw)
        .ok_or_else(|| PosError::Validation("Unrecognized connection string".to_string()))?;

    let url = payload
        .get("url")
        .and_then(Value::as_str)
        .map(normalize_store_url)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PosError::Validation("Connection string is missing the URL".to_string()))?;
    let anon_key = payload
        .get("key")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PosError::Validation("Connection string is missing the API key".to_string())
        })?;

    Ok(StoreConfig { url, anon_key })
}

/// Parse a pasted connection string and persist it in the credential store.
pub fn apply_connection_string(raw: &str) -> Result<StoreConfig, PosError> {
    let config = parse_connection_string(raw)?;
    set_credential(KEY_SUPABASE_URL, &config.url)?;
    set_credential(KEY_SUPABASE_ANON_KEY, &config.anon_key)?;
    info!("store connection configured");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the store configuration: environment first, then the keyring.
pub fn load_store_config() -> Option<StoreConfig> {
    let url = env_non_empty(ENV_STORE_URL).or_else(|| get_credential(KEY_SUPABASE_URL))?;
    let anon_key = env_non_empty(ENV_STORE_KEY).or_else(|| get_credential(KEY_SUPABASE_ANON_KEY))?;
    Some(StoreConfig {
        url: normalize_store_url(&url),
        anon_key,
    })
}

/// The terminal is considered configured when both the URL and the key
/// resolve.
pub fn is_configured() -> bool {
    load_store_config().is_some()
}

/// Remove the stored connection settings.
pub fn clear_store_config() -> Result<(), PosError> {
    delete_credential(KEY_SUPABASE_URL)?;
    delete_credential(KEY_SUPABASE_ANON_KEY)?;
    info!("store connection cleared");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
