//! Convenience re-exports.

pub use crate::client::{GetOutput, ObjectStoreClient, PutOutput};
pub use crate::providers::{
    Client, GatewayCredentials, GatewayProvider, LocalCredentials, LocalProvider, MemoryBuckets,
};
pub use crate::remote::RemoteStore;
pub use crate::types::{Error, ErrorKind};
