pub mod connection;
pub mod handshake;
pub mod http;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;

pub use connection::Connection;
pub use registry::ConnectionRegistry;
pub use router::{DeliveryReport, RelayRouter, RouteOutcome};
pub use server::{build_gateway, build_router, start, AppState, ServerHandle};
