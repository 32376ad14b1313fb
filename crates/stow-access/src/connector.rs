//! Connectors turn a grant into a client bound to one bucket.

use async_trait::async_trait;
use stow_object::ObjectStoreClient;
use stow_object::providers::{
    Client, GatewayCredentials, GatewayProvider, LocalCredentials, LocalProvider, MemoryBuckets,
};

use crate::grant::AccessGrant;
use crate::satellite::SatelliteAddress;

/// Opens bucket-bound clients for a grant.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Creates `bucket` if it does not exist. Must be idempotent.
    async fn ensure_bucket(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<(), stow_object::Error>;

    /// Opens a client bound to `bucket`.
    async fn connect(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<ObjectStoreClient, stow_object::Error>;
}

/// Dispatches on the grant's satellite address: network addresses go through
/// their S3-compatible gateway, `file://` addresses use a local directory.
///
/// Gateway credentials are the grant's key id and chain tail, so a restricted
/// grant never presents the root API key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

enum Target {
    Gateway(GatewayCredentials),
    Local(LocalCredentials),
}

impl DefaultConnector {
    fn target(grant: &AccessGrant, bucket: &str) -> Target {
        match grant.satellite() {
            SatelliteAddress::Local(root) => Target::Local(LocalCredentials {
                root: root.clone(),
                bucket: bucket.to_string(),
            }),
            satellite => Target::Gateway(GatewayCredentials {
                endpoint: satellite.endpoint().unwrap_or_default(),
                bucket: bucket.to_string(),
                access_key_id: grant.key_id_hex(),
                secret_access_key: grant.tail_hex(),
                region: "us-east-1".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn ensure_bucket(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<(), stow_object::Error> {
        match Self::target(grant, bucket) {
            Target::Gateway(creds) => GatewayProvider::ensure_bucket(&creds).await,
            Target::Local(creds) => LocalProvider::ensure_bucket(&creds).await,
        }
    }

    async fn connect(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<ObjectStoreClient, stow_object::Error> {
        match Self::target(grant, bucket) {
            Target::Gateway(creds) => Ok(GatewayProvider::connect(&creds).await?.into_client()),
            Target::Local(creds) => Ok(LocalProvider::connect(&creds).await?.into_client()),
        }
    }
}

/// Connects grants to a shared set of in-memory buckets.
///
/// With no registered API keys every grant is accepted. Once keys are
/// registered, a grant must verify against one of them, the way a gateway
/// authenticates the key id and chain tail it is presented with.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    buckets: MemoryBuckets,
    api_keys: Vec<String>,
}

impl MemoryConnector {
    pub fn new(buckets: MemoryBuckets) -> Self {
        Self {
            buckets,
            api_keys: Vec::new(),
        }
    }

    /// Accepts only grants issued from `api_key` or another registered key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_keys.push(api_key.into());
        self
    }

    pub fn buckets(&self) -> &MemoryBuckets {
        &self.buckets
    }

    fn authenticate(&self, grant: &AccessGrant) -> Result<(), stow_object::Error> {
        if self.api_keys.is_empty()
            || self
                .api_keys
                .iter()
                .any(|api_key| grant.verify_chain(api_key).is_ok())
        {
            return Ok(());
        }
        Err(stow_object::Error::denied(
            "access grant does not verify against any issued API key",
            "memory",
        ))
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn ensure_bucket(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<(), stow_object::Error> {
        self.authenticate(grant)?;
        self.buckets.ensure(bucket);
        Ok(())
    }

    async fn connect(
        &self,
        grant: &AccessGrant,
        bucket: &str,
    ) -> Result<ObjectStoreClient, stow_object::Error> {
        self.authenticate(grant)?;
        self.buckets.get(bucket)
    }
}
