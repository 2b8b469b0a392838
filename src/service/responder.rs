//! Reason-keyed responders with per-handler sender allowlists.

use crate::crypt::keys::RsaKeyPair;
use crate::error::Result;
use crate::message::{RequestMessage, ResponseMessage};
use std::collections::HashSet;
use std::fmt;

type HandlerFn = dyn Fn(&RequestMessage) -> Result<ResponseMessage> + Send + Sync + 'static;

/// A handler bound to one reason: the keypair used to decrypt and sign for
/// that reason, the set of sender public keys allowed to invoke it, and the
/// function producing the reply document.
///
/// Dispatch is a plain function value, not a subclass: register a closure
/// and the listener calls it with each authenticated request.
pub struct ReasonResponder {
    reason: String,
    keypair: RsaKeyPair,
    known_senders: HashSet<String>,
    handler: Box<HandlerFn>,
}

impl ReasonResponder {
    pub fn new<F>(reason: impl Into<String>, keypair: RsaKeyPair, handler: F) -> Self
    where
        F: Fn(&RequestMessage) -> Result<ResponseMessage> + Send + Sync + 'static,
    {
        Self {
            reason: reason.into(),
            keypair,
            known_senders: HashSet::new(),
            handler: Box::new(handler),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn keypair(&self) -> &RsaKeyPair {
        &self.keypair
    }

    /// Allow a sender public key (base64) to invoke this responder.
    /// Unrecognized senders are dropped before any cryptographic work.
    pub fn add_known(mut self, sender_pubkey_b64: impl Into<String>) -> Self {
        self.known_senders.insert(sender_pubkey_b64.into());
        self
    }

    pub fn is_known(&self, sender_pubkey_b64: &str) -> bool {
        self.known_senders.contains(sender_pubkey_b64)
    }

    /// Produce the reply for an authenticated request.
    pub fn respond(&self, request: &RequestMessage) -> Result<ResponseMessage> {
        (self.handler)(request)
    }
}

impl fmt::Debug for ReasonResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasonResponder")
            .field("reason", &self.reason)
            .field("known_senders", &self.known_senders.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_membership() {
        let keys = RsaKeyPair::generate().unwrap();
        let responder = ReasonResponder::new("ping", keys, |_| Ok(ResponseMessage::new()))
            .add_known("sender-a")
            .add_known("sender-b");

        assert!(responder.is_known("sender-a"));
        assert!(responder.is_known("sender-b"));
        assert!(!responder.is_known("sender-c"));
    }

    #[test]
    fn handler_sees_request_fields() {
        let keys = RsaKeyPair::generate().unwrap();
        let responder = ReasonResponder::new("echo", keys, |req| {
            ResponseMessage::new()
                .put("echoed", req.get("value").unwrap_or_default())
                .map(|r| r.set_success(true))
        });

        let request = RequestMessage::new()
            .set_reason("echo")
            .put("value", "hello")
            .unwrap();
        let response = responder.respond(&request).unwrap();
        assert_eq!(response.get("echoed").as_deref(), Some("hello"));
        assert!(response.success());
    }
}
