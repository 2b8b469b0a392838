//! Per-port accept loop and the server-side connection pipeline.

use crate::config::WireConfig;
use crate::crypt::keys;
use crate::error::{ProtocolError, Result};
use crate::message::RequestMessage;
use crate::service::responder::ReasonResponder;
use crate::wire::WireSocket;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

type ResponderMap = Arc<RwLock<HashMap<String, Arc<ReasonResponder>>>>;

/// The accept loop for one port, routing each connection to the responder
/// registered for its wire reason.
///
/// The loop itself never decrypts or parses: every accepted connection is
/// handed to a worker task running the full protocol pipeline, so one slow
/// or hostile peer cannot stall acceptance. A pipeline failure drops that
/// connection, logs the failing stage, and touches nothing else.
pub struct PortListener {
    port: u16,
    responders: ResponderMap,
    shutdown: mpsc::Sender<()>,
}

impl PortListener {
    /// Bind `port` (0 picks an ephemeral port) and start accepting on
    /// `handle`. Connection pipelines are spawned on the same handle.
    pub async fn start(port: u16, handle: &Handle, config: WireConfig) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();

        let responders: ResponderMap = Arc::new(RwLock::new(HashMap::new()));
        let (shutdown, mut shutdown_rx) = mpsc::channel::<()>(1);

        let accept_responders = responders.clone();
        let workers = handle.clone();
        handle.spawn(async move {
            info!(port, "listening");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(port, "no longer listening");
                        return;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                let responders = accept_responders.clone();
                                let config = config.clone();
                                workers.spawn(async move {
                                    if let Err(err) =
                                        serve_connection(stream, config, responders).await
                                    {
                                        warn!(
                                            port,
                                            peer = %peer,
                                            stage = err.tag(),
                                            error = %err,
                                            "connection dropped"
                                        );
                                    }
                                });
                            }
                            Err(e) => {
                                error!(port, error = %e, "error accepting connection");
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            port,
            responders,
            shutdown,
        })
    }

    /// The actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Register a responder under its reason, replacing any prior handler
    /// for that reason. Safe while connections are being served: lookups
    /// and registration share a read-mostly lock.
    pub fn add_responder(&self, responder: ReasonResponder) -> Result<()> {
        let mut map = self.responders.write().map_err(|_| {
            ProtocolError::ConfigError("failed to acquire write lock on responder map".into())
        })?;
        map.insert(responder.reason().to_string(), Arc::new(responder));
        Ok(())
    }

    /// Reasons currently registered on this port.
    pub fn reasons(&self) -> Vec<String> {
        self.responders
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Signal the accept loop to exit. Idempotent; in-flight connection
    /// tasks run to their natural completion or timeout.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(()).await;
    }
}

/// Drive one accepted connection through the full pipeline, then close it.
async fn serve_connection(
    stream: TcpStream,
    config: WireConfig,
    responders: ResponderMap,
) -> Result<()> {
    let mut socket = WireSocket::from_stream_with(stream, config);
    let outcome = run_pipeline(&mut socket, &responders).await;
    socket.close().await;
    outcome
}

/// The ordered server pipeline. Each step fails with its own stage tag;
/// any failure drops the connection with no reply, because a reply would
/// need a session key the server cannot legitimately derive for an
/// unauthenticated peer.
async fn run_pipeline(socket: &mut WireSocket, responders: &ResponderMap) -> Result<()> {
    socket.receive_envelope().await?;

    let wire_reason = socket.remote_reason()?.to_string();
    let responder = {
        let map = responders.read().map_err(|_| {
            ProtocolError::ConfigError("failed to acquire read lock on responder map".into())
        })?;
        map.get(&wire_reason).cloned()
    }
    .ok_or_else(|| ProtocolError::NoValidReason(wire_reason.clone()))?;

    // Allowlist check runs before any cryptographic processing of the
    // claimed body.
    let sender_b64 = socket.remote_pubkey()?.to_string();
    if !responder.is_known(&sender_b64) {
        return Err(ProtocolError::UnknownHost);
    }
    let sender_pub = keys::public_from_base64(&sender_b64).map_err(|_| ProtocolError::UnknownHost)?;

    if !socket.verify_signature(&sender_pub)? {
        return Err(ProtocolError::InvalidSignature);
    }

    let body = socket.decode(responder.keypair().private())?;
    let request = RequestMessage::from_json(&body)?;

    // The decrypted body must claim the same reason the envelope routed on.
    if request.reason().as_deref() != Some(wire_reason.as_str()) {
        return Err(ProtocolError::ReasonMismatch {
            wire: wire_reason,
            body: request.reason().unwrap_or_default(),
        });
    }

    let response = responder
        .respond(&request)
        .map_err(|e| ProtocolError::ErrorOnResponse(e.to_string()))?;

    // Reply: fresh session key wrapped under the sender's presented key,
    // signed with this reason's private key, empty wire reason.
    socket.set_message(response.json(), "", responder.keypair().public_base64());
    socket.encode(&sender_pub, responder.keypair().private())?;
    socket.send().await?;

    Ok(())
}
