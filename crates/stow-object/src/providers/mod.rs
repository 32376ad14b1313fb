//! Client trait and object storage providers.

mod gateway;
mod local;
mod memory;
mod provider;

pub use gateway::{GatewayCredentials, GatewayProvider};
pub use local::{LocalCredentials, LocalProvider};
pub use memory::MemoryBuckets;
pub use provider::Client;
