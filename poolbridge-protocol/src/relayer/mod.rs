pub mod api;
pub mod coordinator;
pub mod ratelimit;
pub mod service;
pub mod store;

pub use coordinator::{RelayerCoordinator, RelayerStatus};
pub use ratelimit::RateLimiter;
pub use service::RelayerService;
pub use store::{MappingEntry, MappingStore};
