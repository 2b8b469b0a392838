//! # Configuration
//!
//! Protocol constants and tunable wire settings.
//!
//! The constants fix the parts of the protocol both peers must agree on
//! (field order is fixed in [`crate::wire`]; sizes and key parameters live
//! here). [`WireConfig`] carries the per-process tunables: I/O deadlines and
//! the maximum accepted envelope field size. It can be built directly, from
//! a TOML string, or from a TOML file.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// RSA modulus size for generated keypairs.
pub const RSA_KEY_BITS: usize = 2048;

/// AES session key size in bytes (AES-128).
pub const AES_KEY_BYTES: usize = 16;

/// AES block size; also the CBC IV length prepended to every ciphertext.
pub const AES_BLOCK_BYTES: usize = 16;

/// Default deadline applied to every socket read and write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Max accepted size of a single envelope field (length-prefix bound,
/// checked before allocation).
pub const MAX_FIELD_BYTES: usize = 4 * 1024 * 1024;

/// Wire-level tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireConfig {
    /// Deadline for each individual socket read.
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,

    /// Deadline for each individual socket write.
    #[serde(with = "duration_millis")]
    pub write_timeout: Duration,

    /// Upper bound on a single envelope field, in bytes.
    pub max_field_bytes: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            max_field_bytes: MAX_FIELD_BYTES,
        }
    }
}

impl WireConfig {
    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Reject configurations that would break the protocol.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(ProtocolError::ConfigError(
                "I/O timeouts must be non-zero".into(),
            ));
        }
        if self.max_field_bytes == 0 {
            return Err(ProtocolError::ConfigError(
                "max_field_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
