//! Core domain types shared by the webhook, shard, queue and refresh layers.

pub mod ids;
pub mod repository;
pub mod subscription;

pub use ids::{DeliveryId, InstallationId, PrNumber};
pub use repository::{Account, InstallationRef, Repository};
pub use subscription::Subscription;
