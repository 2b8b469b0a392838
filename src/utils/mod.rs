//! # Utility Modules
//!
//! Supporting utilities shared across the protocol implementation.
//!
//! - **Logging**: `tracing-subscriber` initialization helpers
//! - **Timeout**: async deadline wrappers for socket operations

pub mod logging;
pub mod timeout;
