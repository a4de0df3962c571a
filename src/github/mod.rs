//! GitHub access for refreshes.
//!
//! - [`SourceHost`]: what the router asks of the host
//! - [`OctocrabHost`]: GitHub App implementation over octocrab
//! - [`HostError`]: "not found" versus everything else

mod client;
mod error;

pub use client::{OctocrabHost, SourceHost};
pub use error::{ApiFailure, HostError, OptionalExt};
