//! RSA keypair and AES session-key wrappers.
//!
//! Both key types can be generated at random or restored from base64, and
//! both encode back to base64 for transport and storage. The RSA public key
//! travels as SPKI DER and the private key as PKCS#8 DER, so encoded keys
//! interoperate with anything else speaking those standard formats.

use crate::config::{AES_KEY_BYTES, RSA_KEY_BITS};
use crate::error::{ProtocolError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An immutable 2048-bit RSA keypair.
///
/// Each peer owns at least one; a server typically holds one per registered
/// reason. Construct once and share by reference or clone.
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl RsaKeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| ProtocolError::InvalidKey(format!("RSA generation failed: {e}")))?;
        let public = private.to_public_key();
        Ok(Self { public, private })
    }

    /// Restore a keypair from base64-encoded SPKI (public) and PKCS#8
    /// (private) DER documents.
    pub fn from_base64(public_b64: &str, private_b64: &str) -> Result<Self> {
        Ok(Self {
            public: public_from_base64(public_b64)?,
            private: private_from_base64(private_b64)?,
        })
    }

    pub fn from_keys(public: RsaPublicKey, private: RsaPrivateKey) -> Self {
        Self { public, private }
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Base64 SPKI DER encoding of the public key, as carried in the
    /// envelope's sender-key field and in responder allowlists.
    pub fn public_base64(&self) -> String {
        // SPKI serialization of a valid key cannot fail
        self.public
            .to_public_key_der()
            .map(|der| BASE64.encode(der.as_bytes()))
            .unwrap_or_default()
    }

    /// Base64 PKCS#8 DER encoding of the private key.
    pub fn private_base64(&self) -> String {
        self.private
            .to_pkcs8_der()
            .map(|der| BASE64.encode(der.as_bytes()))
            .unwrap_or_default()
    }
}

/// Decode a base64 SPKI DER public key.
pub fn public_from_base64(public_b64: &str) -> Result<RsaPublicKey> {
    let der = BASE64
        .decode(public_b64)
        .map_err(|e| ProtocolError::InvalidKey(format!("bad base64 public key: {e}")))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| ProtocolError::InvalidKey(format!("bad public key DER: {e}")))
}

/// Decode a base64 PKCS#8 DER private key.
pub fn private_from_base64(private_b64: &str) -> Result<RsaPrivateKey> {
    let der = BASE64
        .decode(private_b64)
        .map_err(|e| ProtocolError::InvalidKey(format!("bad base64 private key: {e}")))?;
    RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| ProtocolError::InvalidKey(format!("bad private key DER: {e}")))
}

/// A 128-bit AES session key.
///
/// Ephemeral by design: generated fresh for one envelope, used to encrypt or
/// decrypt exactly one body, then dropped. The raw bytes are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AesKey([u8; AES_KEY_BYTES]);

impl AesKey {
    /// Generate a fresh random session key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Restore a session key from its base64 encoding.
    pub fn from_base64(key_b64: &str) -> Result<Self> {
        let raw = BASE64
            .decode(key_b64)
            .map_err(|e| ProtocolError::InvalidKey(format!("bad base64 AES key: {e}")))?;
        let bytes: [u8; AES_KEY_BYTES] = raw
            .try_into()
            .map_err(|_| ProtocolError::InvalidKey("AES key must be 16 bytes".into()))?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn bytes(&self) -> &[u8; AES_KEY_BYTES] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_keypair_roundtrips_through_base64() {
        let pair = RsaKeyPair::generate().unwrap();
        let restored = RsaKeyPair::from_base64(&pair.public_base64(), &pair.private_base64())
            .expect("restore from own encoding");
        assert_eq!(pair.public(), restored.public());
        assert_eq!(pair.private(), restored.private());
    }

    #[test]
    fn aes_key_roundtrips_through_base64() {
        let key = AesKey::generate();
        let restored = AesKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.bytes(), restored.bytes());
    }

    #[test]
    fn fresh_aes_keys_differ() {
        assert_ne!(AesKey::generate().bytes(), AesKey::generate().bytes());
    }

    #[test]
    fn garbage_key_material_is_rejected() {
        assert!(public_from_base64("not base64 at all!").is_err());
        assert!(public_from_base64(&BASE64.encode(b"not a DER document")).is_err());
        assert!(AesKey::from_base64(&BASE64.encode(b"short")).is_err());
    }
}
