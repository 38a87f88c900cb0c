pub mod engine;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod iface;
pub mod packet;
pub mod ra;
pub mod server;
pub mod store;
pub mod timer;

pub use engine::Engine;
pub use error::{DecodeError, EngineError, StateError};
pub use server::EngineServer;

use std::time::Duration;

/// Upper bound of the random delay before the first solicitation (RFC 4861).
pub const MAX_RTR_SOLICITATION_DELAY: Duration = Duration::from_secs(1);
pub const RTR_SOLICITATION_INTERVAL: Duration = Duration::from_secs(4);
pub const MAX_RTR_SOLICITATIONS: u32 = 3;
