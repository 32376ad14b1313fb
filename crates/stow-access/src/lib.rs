#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for grant creation, parsing and restriction.
pub const TRACING_TARGET_GRANT: &str = "stow_access::grant";

/// Tracing target for scope resolution and bucket provisioning.
pub const TRACING_TARGET_SCOPE: &str = "stow_access::scope";

mod connector;
mod error;
mod grant;
mod manager;
mod permission;
mod satellite;
mod scoped;

pub use connector::{Connector, DefaultConnector, MemoryConnector};
pub use error::{ScopeError, ScopeResult};
pub use grant::AccessGrant;
pub use manager::{ResolvedScope, ScopeManager, ScopeRequest, ScopeSource, SharedScope};
pub use permission::{Operation, Permission, Restriction, SharePrefix};
pub use satellite::SatelliteAddress;
pub use scoped::ScopedStore;
