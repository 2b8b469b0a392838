//! Signing, key wrapping, and body encryption for envelopes.
//!
//! All functions speak base64 strings on the ciphertext/signature side to
//! match the wire format, and raw bytes on the plaintext side.
//!
//! - Signatures: PKCS#1 v1.5 over a SHA-256 digest (SHA-256-with-RSA).
//!   Verification returns a plain `bool` and never panics on malformed
//!   input.
//! - Key wrap: PKCS#1 v1.5 RSA encryption of the session key's base64 form.
//! - Body: AES-128-CBC with PKCS#7 padding. A random IV is generated per
//!   encryption and prepended to the ciphertext.

use crate::config::AES_BLOCK_BYTES;
use crate::crypt::keys::AesKey;
use crate::error::{ProtocolError, Result};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Sign `data` with the private key, returning the base64 signature.
pub fn sign(key: &RsaPrivateKey, data: &[u8]) -> Result<String> {
    let digest = Sha256::digest(data);
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), digest.as_slice())
        .map_err(|e| ProtocolError::InvalidKey(format!("signing failed: {e}")))?;
    Ok(BASE64.encode(signature))
}

/// Verify a base64 signature over `data` against the public key.
///
/// Any failure (bad base64, wrong key, tampered data) reads as `false`.
pub fn verify(key: &RsaPublicKey, data: &[u8], signature_b64: &str) -> bool {
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };
    let digest = Sha256::digest(data);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), digest.as_slice(), &signature)
        .is_ok()
}

/// RSA-encrypt `plaintext` under the recipient's public key.
///
/// Used to wrap session keys; PKCS#1 v1.5 limits the input to just under
/// the modulus size, which a base64 AES key fits comfortably.
pub fn encrypt_rsa(key: &RsaPublicKey, plaintext: &[u8]) -> Result<String> {
    let ciphertext = key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|_| ProtocolError::BadCryptKey)?;
    Ok(BASE64.encode(ciphertext))
}

/// RSA-decrypt a base64 ciphertext with the own private key.
pub fn decrypt_rsa(key: &RsaPrivateKey, ciphertext_b64: &str) -> Result<Vec<u8>> {
    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|_| ProtocolError::BadCryptKey)?;
    key.decrypt(Pkcs1v15Encrypt, &ciphertext)
        .map_err(|_| ProtocolError::BadCryptKey)
}

/// AES-encrypt `plaintext` with a session key.
///
/// Output layout before base64: `IV (16 bytes) || CBC ciphertext`.
pub fn encrypt_aes(key: &AesKey, plaintext: &[u8]) -> Result<String> {
    let mut iv = [0u8; AES_BLOCK_BYTES];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes128CbcEnc::new(key.bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut framed = iv.to_vec();
    framed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(framed))
}

/// AES-decrypt a base64 `IV || ciphertext` blob with a session key.
pub fn decrypt_aes(key: &AesKey, ciphertext_b64: &str) -> Result<Vec<u8>> {
    let framed = BASE64
        .decode(ciphertext_b64)
        .map_err(|_| ProtocolError::BadCryptKey)?;
    if framed.len() < AES_BLOCK_BYTES {
        return Err(ProtocolError::BadCryptKey);
    }

    let (iv, ciphertext) = framed.split_at(AES_BLOCK_BYTES);
    let iv: [u8; AES_BLOCK_BYTES] = iv.try_into().map_err(|_| ProtocolError::BadCryptKey)?;
    Aes128CbcDec::new(key.bytes().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ProtocolError::BadCryptKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::keys::RsaKeyPair;

    fn pair() -> RsaKeyPair {
        RsaKeyPair::generate().unwrap()
    }

    #[test]
    fn aes_roundtrip() {
        let key = AesKey::generate();
        let plaintext = b"{\"reason\":\"double\",\"value\":\"21\"}";
        let ciphertext = encrypt_aes(&key, plaintext).unwrap();
        assert_eq!(decrypt_aes(&key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn aes_wrong_key_fails() {
        let ciphertext = encrypt_aes(&AesKey::generate(), b"secret body").unwrap();
        let other = AesKey::generate();
        // Wrong key either trips the padding check or yields different bytes
        match decrypt_aes(&other, &ciphertext) {
            Ok(decrypted) => assert_ne!(decrypted, b"secret body"),
            Err(e) => assert!(matches!(e, ProtocolError::BadCryptKey)),
        }
    }

    #[test]
    fn rsa_wraps_session_key() {
        let pair = pair();
        let session = AesKey::generate();
        let wrapped = encrypt_rsa(pair.public(), session.to_base64().as_bytes()).unwrap();
        let unwrapped = decrypt_rsa(pair.private(), &wrapped).unwrap();
        assert_eq!(unwrapped, session.to_base64().as_bytes());
    }

    #[test]
    fn rsa_unwrap_with_wrong_key_fails() {
        let wrapped = encrypt_rsa(pair().public(), b"session key").unwrap();
        let result = decrypt_rsa(pair().private(), &wrapped);
        assert!(matches!(result, Err(ProtocolError::BadCryptKey)));
    }

    #[test]
    fn signature_verifies_for_matching_pair() {
        let pair = pair();
        let body = b"apples are delicious!";
        let signature = sign(pair.private(), body).unwrap();
        assert!(verify(pair.public(), body, &signature));
    }

    #[test]
    fn signature_fails_closed() {
        let signer = pair();
        let body = b"apples are delicious!";
        let signature = sign(signer.private(), body).unwrap();

        // mismatched key
        assert!(!verify(pair().public(), body, &signature));
        // tampered body
        assert!(!verify(signer.public(), b"apples are rotten!", &signature));
        // garbage signature never panics
        assert!(!verify(signer.public(), body, "@@not-base64@@"));
        assert!(!verify(signer.public(), body, ""));
    }
}
