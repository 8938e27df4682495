pub mod enrichment;
pub mod errors;
pub mod ids;
pub mod messages;
pub mod role;

pub use enrichment::Enrichment;
pub use errors::{DeliveryError, RelayError};
pub use ids::{ConnectionId, DeviceId};
pub use role::Role;
