//! # Message Documents
//!
//! Flat string-keyed JSON documents carried as envelope bodies.
//!
//! Two roles share one underlying document:
//! - [`RequestMessage`] — outbound, tagged with a `"reason"` that routes it
//!   to a registered responder. The `"reason"` key is reserved and only
//!   settable through [`RequestMessage::set_reason`].
//! - [`ResponseMessage`] — inbound reply, carrying a boolean `"success"`
//!   (reserved, settable through [`ResponseMessage::set_success`]; missing
//!   reads as `false`).
//!
//! Documents merge by absorption: `merge` copies keys the receiver does not
//! already have and never overwrites existing ones.

mod document;
mod request;
mod response;

pub use request::RequestMessage;
pub use response::ResponseMessage;

pub(crate) use document::Document;

/// Key carrying the failure stage tag in a synthetic error response.
pub const TRANSMIT_ERROR_KEY: &str = "TRANSMIT_ERROR";
