//! # Key Material & Envelope Cryptography
//!
//! Everything an envelope needs from the crypto stack, and nothing the rest
//! of the crate has to think about:
//!
//! - **Keys**: [`RsaKeyPair`] (2048-bit, base64 SPKI / PKCS#8 DER) and the
//!   ephemeral [`AesKey`] session key (128-bit, zeroized on drop)
//! - **Encryptor**: SHA-256-with-RSA signing and verification, RSA key
//!   wrapping, and AES-CBC body encryption, all speaking base64 strings at
//!   the boundary to match the wire format
//!
//! Session keys are generated fresh per envelope and never reused.

pub mod encryptor;
pub mod keys;

pub use keys::{AesKey, RsaKeyPair};
