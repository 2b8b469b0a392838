//! # courier-protocol
//!
//! Encrypted, signed request/response messaging over raw TCP.
//!
//! A sender packages a key-value document into a hybrid-encrypted, signed
//! envelope tagged with a *reason*, transmits it, and receives an equally
//! encrypted, signed reply over the same connection. A server multiplexes
//! independent handlers over one or more ports, keyed by reason, each with
//! its own keypair and known-sender allowlist.
//!
//! ## Layers
//! - [`crypt`] — RSA keypairs, ephemeral AES session keys, and the
//!   sign/wrap/encrypt primitives envelopes are built from
//! - [`message`] — request/response documents with reserved-key roles
//! - [`wire`] — one connection, one envelope exchange: 5 length-prefixed
//!   fields in a fixed order
//! - [`service`] — reason-keyed responders, per-port accept loops, and the
//!   [`Switchboard`] facade
//!
//! ## Example
//! ```no_run
//! use courier_protocol::{
//!     RequestMessage, ResponseMessage, RsaKeyPair, ReasonResponder, Switchboard,
//! };
//!
//! # async fn demo() -> courier_protocol::Result<()> {
//! let server_keys = RsaKeyPair::generate()?;
//! let client_keys = RsaKeyPair::generate()?;
//!
//! let mut switchboard = Switchboard::new();
//! let responder = ReasonResponder::new("double", server_keys.clone(), |req| {
//!     let value: i64 = req.get("value").unwrap_or_default().parse().unwrap_or(0);
//!     ResponseMessage::new()
//!         .put("returnval", (value * 2).to_string())
//!         .map(|r| r.set_success(true))
//! })
//! .add_known(client_keys.public_base64());
//! let port = switchboard.add_response(25540, responder).await?;
//!
//! let reply = RequestMessage::new()
//!     .set_reason("double")
//!     .put("value", "21")?
//!     .set_keys(client_keys)
//!     .set_remote_key(server_keys.public().clone())
//!     .send("127.0.0.1", port)
//!     .await?;
//! assert_eq!(reply.get("returnval").as_deref(), Some("42"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Security model
//! - Bodies are AES-128 encrypted under a session key generated fresh per
//!   envelope; the session key travels RSA-wrapped under the recipient's
//!   public key
//! - Signatures are SHA-256-with-RSA over the ciphertext, checked before
//!   any private-key operation
//! - Servers never reply to a request they cannot authenticate: failed
//!   connections are dropped silently and the failing stage is logged
//! - Key distribution is out of scope; peers must hold each other's public
//!   keys in advance

pub mod config;
pub mod crypt;
pub mod error;
pub mod message;
pub mod service;
pub mod utils;
pub mod wire;

pub use crypt::{AesKey, RsaKeyPair};
pub use error::{ProtocolError, Result};
pub use message::{RequestMessage, ResponseMessage};
pub use service::{PortListener, ReasonResponder, Switchboard};
pub use wire::{Envelope, WireSocket};
