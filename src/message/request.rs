//! Outbound request documents and the client-side send pipeline.

use crate::crypt::keys::{self, RsaKeyPair};
use crate::error::{ProtocolError, Result};
use crate::message::document::Document;
use crate::message::response::ResponseMessage;
use crate::wire::WireSocket;
use rsa::RsaPublicKey;
use serde_json::Value;
use tracing::{debug, warn};

/// A request document: key-value pairs plus a routing `"reason"`.
///
/// Before sending, the message must carry a reason, the sender's own
/// keypair, and the recipient's public key. Construction chains:
///
/// ```no_run
/// # use courier_protocol::{RequestMessage, RsaKeyPair};
/// # fn demo(keys: RsaKeyPair, remote: rsa::RsaPublicKey) -> courier_protocol::Result<()> {
/// let request = RequestMessage::new()
///     .set_reason("double")
///     .put("value", "21")?
///     .set_keys(keys)
///     .set_remote_key(remote);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestMessage {
    document: Document,
    keys: Option<RsaKeyPair>,
    remote_key: Option<RsaPublicKey>,
}

impl RequestMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a request body received off the wire.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            document: Document::from_json(json)?,
            keys: None,
            remote_key: None,
        })
    }

    /// Add a key-value pair. The `"reason"` key is reserved; use
    /// [`set_reason`](Self::set_reason) instead.
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key == "reason" {
            return Err(ProtocolError::ReservedKey(key));
        }
        self.document.insert(key, Value::String(value.into()));
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.document.get_str(key)
    }

    pub fn set_reason(mut self, reason: impl Into<String>) -> Self {
        self.document.insert("reason", Value::String(reason.into()));
        self
    }

    pub fn reason(&self) -> Option<String> {
        self.document.get_str("reason")
    }

    /// Absorb keys from `other` that this message does not already have.
    pub fn merge(mut self, other: &RequestMessage) -> Self {
        self.document.absorb(&other.document);
        self
    }

    /// Drop every key-value pair; keys and remote key stay set.
    pub fn clear(mut self) -> Self {
        self.document.clear();
        self
    }

    /// Own keypair used to sign the request and decrypt the reply.
    pub fn set_keys(mut self, keys: RsaKeyPair) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Recipient's public key used to wrap the session key and verify the
    /// reply signature.
    pub fn set_remote_key(mut self, key: RsaPublicKey) -> Self {
        self.remote_key = Some(key);
        self
    }

    /// Same as [`set_remote_key`](Self::set_remote_key) from a base64 SPKI
    /// encoding.
    pub fn set_remote_key_base64(self, key_b64: &str) -> Result<Self> {
        let key = keys::public_from_base64(key_b64)?;
        Ok(self.set_remote_key(key))
    }

    pub fn json(&self) -> String {
        self.document.json()
    }

    /// Send this request to `"host:port"`.
    pub async fn send_addr(&self, address: &str) -> Result<ResponseMessage> {
        let (host, port) = address
            .rsplit_once(':')
            .and_then(|(host, port)| port.parse::<u16>().ok().map(|p| (host, p)))
            .ok_or_else(|| ProtocolError::ConfigError(format!("invalid address {address:?}")))?;
        self.send(host, port).await
    }

    /// Send this request and await the decrypted, verified reply.
    ///
    /// Missing reason, keypair, or remote key fail fast with a state error.
    /// Every transmit failure past that point comes back as data: a
    /// synthetic response whose `TRANSMIT_ERROR` key names the failing
    /// stage (with the raw reply under `"body"` when the reply was not
    /// valid JSON). Callers branch on the response, not on exceptions.
    pub async fn send(&self, host: &str, port: u16) -> Result<ResponseMessage> {
        let reason = self.reason().ok_or(ProtocolError::MissingReason)?;
        let keys = self.keys.as_ref().ok_or(ProtocolError::MissingKeys)?;
        let remote = self
            .remote_key
            .as_ref()
            .ok_or(ProtocolError::MissingRemoteKey)?;

        let mut raw_body = None;
        match self
            .transmit(host, port, &reason, keys, remote, &mut raw_body)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(host, port, stage = err.tag(), error = %err, "send failed");
                Ok(ResponseMessage::transmit_failure(err.tag(), raw_body))
            }
        }
    }

    async fn transmit(
        &self,
        host: &str,
        port: u16,
        reason: &str,
        keys: &RsaKeyPair,
        remote: &RsaPublicKey,
        raw_body: &mut Option<String>,
    ) -> Result<ResponseMessage> {
        debug!(host, port, reason, "sending request");

        let mut socket = WireSocket::connect(host, port).await?;
        socket.set_message(self.json(), reason, keys.public_base64());
        socket.encode(remote, keys.private())?;
        socket.send().await?;

        socket.receive_envelope().await?;
        let body = socket.decode(keys.private())?;
        *raw_body = Some(body.clone());

        // The reply is verified against the key we already hold for the
        // responder, not the key the envelope claims.
        let verified = socket.verify_signature(remote)?;
        socket.close().await;
        if !verified {
            return Err(ProtocolError::InvalidSignature);
        }

        ResponseMessage::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_key_is_reserved() {
        let result = RequestMessage::new().put("reason", "smuggled");
        assert!(matches!(result, Err(ProtocolError::ReservedKey(_))));
    }

    #[test]
    fn success_is_not_reserved_for_requests() {
        let request = RequestMessage::new().put("success", "true").unwrap();
        assert_eq!(request.get("success").as_deref(), Some("true"));
    }

    #[test]
    fn reason_roundtrips_through_setter() {
        let request = RequestMessage::new().set_reason("double");
        assert_eq!(request.reason().as_deref(), Some("double"));
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let a = RequestMessage::new()
            .put("value", "21")
            .unwrap()
            .set_reason("double");
        let b = RequestMessage::new()
            .put("value", "99")
            .unwrap()
            .put("extra", "yes")
            .unwrap();

        let merged = a.merge(&b);
        assert_eq!(merged.get("value").as_deref(), Some("21"));
        assert_eq!(merged.get("extra").as_deref(), Some("yes"));
    }

    #[test]
    fn clear_empties_pairs() {
        let request = RequestMessage::new()
            .put("value", "21")
            .unwrap()
            .clear();
        assert!(request.get("value").is_none());
    }

    #[tokio::test]
    async fn send_without_reason_fails_fast() {
        let request = RequestMessage::new();
        let result = request.send("127.0.0.1", 1).await;
        assert!(matches!(result, Err(ProtocolError::MissingReason)));
    }

    #[tokio::test]
    async fn send_without_keys_fails_fast() {
        let request = RequestMessage::new().set_reason("double");
        let result = request.send("127.0.0.1", 1).await;
        assert!(matches!(result, Err(ProtocolError::MissingKeys)));
    }
}
