//! # Error Types
//!
//! Error handling for the courier protocol.
//!
//! The protocol keeps a closed taxonomy of transmit failures, one variant per
//! pipeline stage. Each of those variants maps to a stable stage tag via
//! [`ProtocolError::tag`]; the server logs the tag when it drops a connection
//! and the client surfaces the same tag as data under the `TRANSMIT_ERROR`
//! key of a synthetic response.
//!
//! Misuse errors (missing keys, reserved document keys, malformed key
//! material) sit outside the wire taxonomy and are reported through ordinary
//! `Result` returns.

use std::io;
use thiserror::Error;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Could not open a connection to the remote peer.
    #[error("failed to connect to remote")]
    FailedToConnect,

    /// Reading envelope fields from the socket failed or timed out.
    #[error("network read failed")]
    BadNetworkRead,

    /// Writing envelope fields to the socket failed or timed out.
    #[error("network write failed")]
    BadNetworkWrite,

    /// No responder is registered for the wire reason.
    #[error("no responder registered for reason {0:?}")]
    NoValidReason(String),

    /// The presented sender public key is not in the responder's allowlist.
    #[error("sender public key is not recognized")]
    UnknownHost,

    /// Envelope signature did not validate against the presented key.
    #[error("envelope signature is invalid")]
    InvalidSignature,

    /// Session-key unwrap or body decryption failed.
    #[error("encryption key mismatch or corrupted ciphertext")]
    BadCryptKey,

    /// Decrypted body was not a valid JSON document.
    #[error("invalid message body: {0}")]
    InvalidJson(String),

    /// The body's internal reason disagrees with the wire reason.
    #[error("body reason {body:?} does not match wire reason {wire:?}")]
    ReasonMismatch { wire: String, body: String },

    /// The registered handler returned an error.
    #[error("responder failed: {0}")]
    ErrorOnResponse(String),

    /// An envelope field exceeded the maximum allowed size.
    #[error("envelope field too large: {0} bytes")]
    OversizedField(usize),

    /// Key material could not be decoded or parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Attempted to `put` a key reserved by the document role.
    #[error("reserved key: {0:?}")]
    ReservedKey(String),

    /// Request was sent without a reason set.
    #[error("no message reason specified")]
    MissingReason,

    /// Request was sent without an own keypair set.
    #[error("no RSA keypair specified")]
    MissingKeys,

    /// Request was sent without the recipient's public key set.
    #[error("no remote public key specified")]
    MissingRemoteKey,

    /// Operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Stage tag for this failure, as carried in a `TRANSMIT_ERROR` value
    /// and in server-side log fields.
    ///
    /// Failures outside the pipeline taxonomy collapse to
    /// `FAILED_TO_CONNECT`, the stage every exchange starts in.
    pub fn tag(&self) -> &'static str {
        match self {
            ProtocolError::NoValidReason(_) => "NO_VALID_REASON",
            ProtocolError::UnknownHost => "UNKNOWN_HOST",
            ProtocolError::InvalidSignature => "INVALID_SIGNATURE",
            ProtocolError::BadCryptKey => "BAD_CRYPT_KEY",
            ProtocolError::InvalidJson(_) => "INVALID_JSON",
            ProtocolError::ReasonMismatch { .. } => "REASON_MISMATCH",
            ProtocolError::ErrorOnResponse(_) => "ERROR_ON_RESPONSE",
            ProtocolError::BadNetworkRead | ProtocolError::OversizedField(_) => "BAD_NETWORK_READ",
            ProtocolError::BadNetworkWrite => "BAD_NETWORK_WRITE",
            _ => "FAILED_TO_CONNECT",
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_variants_map_to_stage_tags() {
        assert_eq!(
            ProtocolError::NoValidReason("double".into()).tag(),
            "NO_VALID_REASON"
        );
        assert_eq!(ProtocolError::UnknownHost.tag(), "UNKNOWN_HOST");
        assert_eq!(ProtocolError::InvalidSignature.tag(), "INVALID_SIGNATURE");
        assert_eq!(ProtocolError::BadCryptKey.tag(), "BAD_CRYPT_KEY");
        assert_eq!(
            ProtocolError::InvalidJson("eof".into()).tag(),
            "INVALID_JSON"
        );
        assert_eq!(ProtocolError::BadNetworkRead.tag(), "BAD_NETWORK_READ");
        assert_eq!(ProtocolError::BadNetworkWrite.tag(), "BAD_NETWORK_WRITE");
    }

    #[test]
    fn misuse_errors_collapse_to_connect_tag() {
        assert_eq!(ProtocolError::MissingReason.tag(), "FAILED_TO_CONNECT");
        assert_eq!(ProtocolError::Timeout.tag(), "FAILED_TO_CONNECT");
        assert_eq!(
            ProtocolError::InvalidKey("bad der".into()).tag(),
            "FAILED_TO_CONNECT"
        );
    }
}
