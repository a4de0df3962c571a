//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA1)
//! - The typed view of event types and payloads
//! - Classification of events into ignore / dispatch / invalidate decisions

pub mod classify;
pub mod events;
pub mod signature;

pub use classify::{ClassifyInput, Decision, IgnoreReason, classify};
pub use events::{EventPayload, EventType, PayloadError};
pub use signature::{
    SignatureError, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
