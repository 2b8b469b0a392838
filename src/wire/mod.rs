//! # Wire Channel
//!
//! Maps one TCP connection to exactly one envelope exchange.
//!
//! ## Wire Format
//! An envelope is 5 length-prefixed UTF-8 strings in this fixed order:
//!
//! ```text
//! reason | sender_pubkey_b64 | wrapped_key_b64 | signature_b64 | encrypted_body_b64
//! ```
//!
//! Each field is a u32 big-endian byte length followed by that many UTF-8
//! bytes. The order is bit-exact; both ends must agree on it, and there is
//! no resynchronization once a stream drifts. Length prefixes are bounded
//! before allocation.
//!
//! ## Security
//! - The signature covers the encrypted body, so a forged or corrupted
//!   envelope is rejected before any private-key operation
//! - Every read and write runs under a fixed deadline
//! - A fresh session key is generated per envelope and never reused

mod socket;

pub use socket::WireSocket;

/// The 5-field wire record. One flows request-ward and one flows
/// response-ward per connection, in that order.
///
/// In the response direction `reason` is empty by convention and
/// `sender_pubkey_b64` carries the responder's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub reason: String,
    pub sender_pubkey_b64: String,
    pub wrapped_key_b64: String,
    pub signature_b64: String,
    pub encrypted_body_b64: String,
}
