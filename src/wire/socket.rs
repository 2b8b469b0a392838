use crate::config::WireConfig;
use crate::crypt::encryptor;
use crate::crypt::keys::AesKey;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout::with_deadline;
use crate::wire::Envelope;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Staged outbound fields before encryption.
#[derive(Debug, Default)]
struct PendingMessage {
    body: String,
    reason: String,
    sender_pubkey_b64: String,
}

/// One network connection driven through one envelope exchange.
///
/// The same type serves both roles: [`connect`](WireSocket::connect) dials a
/// peer (client side), [`from_stream`](WireSocket::from_stream) wraps an
/// accepted connection (server side). Outbound, `set_message` stages the
/// plaintext fields, `encode` derives and wraps a fresh session key, encrypts
/// and signs, and `send` writes the 5 wire fields. Inbound,
/// `receive_envelope` blocks reading the 5 fields, `decode` recovers the
/// body, and `verify_signature` checks the envelope against a caller-chosen
/// public key.
pub struct WireSocket {
    stream: TcpStream,
    config: WireConfig,
    staged: Option<PendingMessage>,
    outbound: Option<Envelope>,
    inbound: Option<Envelope>,
    inbound_body: Option<String>,
}

impl WireSocket {
    /// Dial `host:port`. Connection failures map to `FAILED_TO_CONNECT`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with(host, port, WireConfig::default()).await
    }

    /// Dial with explicit wire tunables.
    pub async fn connect_with(host: &str, port: u16, config: WireConfig) -> Result<Self> {
        let stream = with_deadline(
            async {
                TcpStream::connect((host, port))
                    .await
                    .map_err(ProtocolError::Io)
            },
            config.read_timeout,
        )
        .await
        .map_err(|_| ProtocolError::FailedToConnect)?;

        trace!(host, port, "connected");
        Ok(Self::wrap(stream, config))
    }

    /// Wrap an already-accepted connection.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self::wrap(stream, WireConfig::default())
    }

    /// Wrap an already-accepted connection with explicit wire tunables.
    pub fn from_stream_with(stream: TcpStream, config: WireConfig) -> Self {
        Self::wrap(stream, config)
    }

    fn wrap(stream: TcpStream, config: WireConfig) -> Self {
        Self {
            stream,
            config,
            staged: None,
            outbound: None,
            inbound: None,
            inbound_body: None,
        }
    }

    /// Stage the plaintext fields of the outbound envelope.
    pub fn set_message(
        &mut self,
        body: impl Into<String>,
        reason: impl Into<String>,
        sender_pubkey_b64: impl Into<String>,
    ) {
        self.staged = Some(PendingMessage {
            body: body.into(),
            reason: reason.into(),
            sender_pubkey_b64: sender_pubkey_b64.into(),
        });
        self.outbound = None;
    }

    /// Turn the staged message into wire fields: generate a fresh session
    /// key, wrap it under `remote_pub`, encrypt the body, and sign the
    /// ciphertext with `own_priv`.
    pub fn encode(&mut self, remote_pub: &RsaPublicKey, own_priv: &RsaPrivateKey) -> Result<()> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| ProtocolError::ConfigError("no message staged for encode".into()))?;

        let session_key = AesKey::generate();
        let wrapped_key_b64 = encryptor::encrypt_rsa(remote_pub, session_key.to_base64().as_bytes())?;
        let encrypted_body_b64 = encryptor::encrypt_aes(&session_key, staged.body.as_bytes())?;
        let signature_b64 = encryptor::sign(own_priv, encrypted_body_b64.as_bytes())?;

        self.outbound = Some(Envelope {
            reason: staged.reason,
            sender_pubkey_b64: staged.sender_pubkey_b64,
            wrapped_key_b64,
            signature_b64,
            encrypted_body_b64,
        });
        Ok(())
    }

    /// Write the encoded envelope's 5 fields in wire order and flush.
    pub async fn send(&mut self) -> Result<()> {
        let envelope = self
            .outbound
            .take()
            .ok_or_else(|| ProtocolError::ConfigError("no envelope encoded for send".into()))?;

        let deadline = self.config.write_timeout;
        let result = with_deadline(
            async {
                write_field(&mut self.stream, &envelope.reason).await?;
                write_field(&mut self.stream, &envelope.sender_pubkey_b64).await?;
                write_field(&mut self.stream, &envelope.wrapped_key_b64).await?;
                write_field(&mut self.stream, &envelope.signature_b64).await?;
                write_field(&mut self.stream, &envelope.encrypted_body_b64).await?;
                self.stream.flush().await.map_err(ProtocolError::Io)
            },
            deadline,
        )
        .await;

        result.map_err(|_| ProtocolError::BadNetworkWrite)?;
        debug!(reason = %envelope.reason, "envelope sent");
        Ok(())
    }

    /// Block reading the 5 wire fields into the pending inbound envelope.
    pub async fn receive_envelope(&mut self) -> Result<()> {
        let deadline = self.config.read_timeout;
        let max = self.config.max_field_bytes;
        let envelope = with_deadline(
            async {
                Ok(Envelope {
                    reason: read_field(&mut self.stream, max).await?,
                    sender_pubkey_b64: read_field(&mut self.stream, max).await?,
                    wrapped_key_b64: read_field(&mut self.stream, max).await?,
                    signature_b64: read_field(&mut self.stream, max).await?,
                    encrypted_body_b64: read_field(&mut self.stream, max).await?,
                })
            },
            deadline,
        )
        .await
        .map_err(|_| ProtocolError::BadNetworkRead)?;

        debug!(reason = %envelope.reason, "envelope received");
        self.inbound = Some(envelope);
        self.inbound_body = None;
        Ok(())
    }

    /// Unwrap the session key with `own_priv` and decrypt the body.
    /// Returns the plaintext, which stays accessible via
    /// [`remote_body`](Self::remote_body).
    pub fn decode(&mut self, own_priv: &RsaPrivateKey) -> Result<String> {
        let envelope = self.inbound_ref()?;

        let key_b64 = encryptor::decrypt_rsa(own_priv, &envelope.wrapped_key_b64)?;
        let key_b64 = String::from_utf8(key_b64).map_err(|_| ProtocolError::BadCryptKey)?;
        let session_key = AesKey::from_base64(&key_b64).map_err(|_| ProtocolError::BadCryptKey)?;

        let plaintext = encryptor::decrypt_aes(&session_key, &envelope.encrypted_body_b64)?;
        let body = String::from_utf8(plaintext).map_err(|_| ProtocolError::BadCryptKey)?;

        self.inbound_body = Some(body.clone());
        Ok(body)
    }

    /// Check the inbound envelope's signature against `remote_pub`.
    ///
    /// The signature covers the encrypted body, so this needs no decryption
    /// and can run before [`decode`](Self::decode). A `false` verdict is the
    /// caller's cue to drop the exchange.
    pub fn verify_signature(&self, remote_pub: &RsaPublicKey) -> Result<bool> {
        let envelope = self.inbound_ref()?;
        Ok(encryptor::verify(
            remote_pub,
            envelope.encrypted_body_b64.as_bytes(),
            &envelope.signature_b64,
        ))
    }

    /// Wire reason of the received envelope.
    pub fn remote_reason(&self) -> Result<&str> {
        Ok(&self.inbound_ref()?.reason)
    }

    /// Sender public key (base64) presented by the received envelope.
    pub fn remote_pubkey(&self) -> Result<&str> {
        Ok(&self.inbound_ref()?.sender_pubkey_b64)
    }

    /// Decrypted body of the received envelope, once decoded.
    pub fn remote_body(&self) -> Option<&str> {
        self.inbound_body.as_deref()
    }

    /// Release the connection. Safe to call after partial failure; close
    /// errors are ignored.
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    fn inbound_ref(&self) -> Result<&Envelope> {
        self.inbound
            .as_ref()
            .ok_or_else(|| ProtocolError::ConfigError("no envelope received yet".into()))
    }
}

async fn write_field(stream: &mut TcpStream, field: &str) -> Result<()> {
    let bytes = field.as_bytes();
    stream.write_u32(bytes.len() as u32).await?;
    stream.write_all(bytes).await?;
    Ok(())
}

async fn read_field(stream: &mut TcpStream, max_bytes: usize) -> Result<String> {
    let len = stream.read_u32().await? as usize;
    if len > max_bytes {
        return Err(ProtocolError::OversizedField(len));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|e| ProtocolError::InvalidJson(format!("field is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::keys::RsaKeyPair;
    use tokio::net::TcpListener;

    async fn socket_pair() -> (WireSocket, WireSocket) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (client, server) = tokio::join!(WireSocket::connect("127.0.0.1", port), async {
            let (stream, _) = listener.accept().await.unwrap();
            WireSocket::from_stream(stream)
        });
        (client.unwrap(), server)
    }

    #[tokio::test]
    async fn envelope_crosses_the_wire_intact() {
        let keys = RsaKeyPair::generate().unwrap();
        let remote = RsaKeyPair::generate().unwrap();
        let (mut client, mut server) = socket_pair().await;

        client.set_message(r#"{"reason":"double","value":"21"}"#, "double", keys.public_base64());
        client.encode(remote.public(), keys.private()).unwrap();
        client.send().await.unwrap();

        server.receive_envelope().await.unwrap();
        assert_eq!(server.remote_reason().unwrap(), "double");
        assert_eq!(server.remote_pubkey().unwrap(), keys.public_base64());

        assert!(server.verify_signature(keys.public()).unwrap());
        let body = server.decode(remote.private()).unwrap();
        assert_eq!(body, r#"{"reason":"double","value":"21"}"#);
    }

    #[tokio::test]
    async fn signature_check_fails_for_wrong_key() {
        let keys = RsaKeyPair::generate().unwrap();
        let remote = RsaKeyPair::generate().unwrap();
        let (mut client, mut server) = socket_pair().await;

        client.set_message("{}", "double", keys.public_base64());
        client.encode(remote.public(), keys.private()).unwrap();
        client.send().await.unwrap();

        server.receive_envelope().await.unwrap();
        // verifying against the wrong public key must read false, not panic
        assert!(!server.verify_signature(remote.public()).unwrap());
    }

    #[tokio::test]
    async fn decode_with_wrong_private_key_fails() {
        let keys = RsaKeyPair::generate().unwrap();
        let remote = RsaKeyPair::generate().unwrap();
        let (mut client, mut server) = socket_pair().await;

        client.set_message("{}", "double", keys.public_base64());
        client.encode(remote.public(), keys.private()).unwrap();
        client.send().await.unwrap();

        server.receive_envelope().await.unwrap();
        let result = server.decode(keys.private());
        assert!(matches!(result, Err(ProtocolError::BadCryptKey)));
    }

    #[tokio::test]
    async fn read_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = WireConfig {
            read_timeout: std::time::Duration::from_millis(100),
            ..WireConfig::default()
        };
        let (client, _held) = tokio::join!(
            WireSocket::connect_with("127.0.0.1", port, config),
            async { listener.accept().await.unwrap() }
        );

        let mut client = client.unwrap();
        let result = client.receive_envelope().await;
        assert!(matches!(result, Err(ProtocolError::BadNetworkRead)));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (client, sender) = tokio::join!(WireSocket::connect("127.0.0.1", port), async {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_u32(u32::MAX).await.unwrap();
            stream
        });
        let _sender = sender;

        let mut client = client.unwrap();
        let result = client.receive_envelope().await;
        assert!(matches!(result, Err(ProtocolError::BadNetworkRead)));
    }

    #[tokio::test]
    async fn close_is_safe_to_repeat() {
        let (mut client, _server) = socket_pair().await;
        client.close().await;
        client.close().await;
    }
}
