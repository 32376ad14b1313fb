//! Resolves a destination scope: grant, bucket and bound store.

use std::fmt;
use std::sync::Arc;

use crate::TRACING_TARGET_SCOPE;
use crate::connector::Connector;
use crate::error::{ScopeError, ScopeResult};
use crate::grant::AccessGrant;
use crate::permission::Restriction;
use crate::scoped::ScopedStore;

/// Where the grant for a scope comes from.
#[derive(Clone)]
pub enum ScopeSource {
    /// Derive a new root grant from credentials.
    Fresh {
        satellite: String,
        api_key: String,
        passphrase: String,
    },
    /// Reuse a previously serialized grant.
    Reuse { serialized: String },
}

impl fmt::Debug for ScopeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh { satellite, .. } => f
                .debug_struct("Fresh")
                .field("satellite", satellite)
                .finish_non_exhaustive(),
            Self::Reuse { .. } => f.debug_struct("Reuse").finish_non_exhaustive(),
        }
    }
}

/// Input to [`ScopeManager::resolve`].
#[derive(Debug, Clone)]
pub struct ScopeRequest {
    pub source: ScopeSource,
    pub bucket: String,
    /// Restriction applied to the shareable grant, if any.
    pub restriction: Option<Restriction>,
}

impl ScopeRequest {
    pub fn new(source: ScopeSource, bucket: impl Into<String>) -> Self {
        Self {
            source,
            bucket: bucket.into(),
            restriction: None,
        }
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = Some(restriction);
        self
    }
}

/// A restricted grant meant to be handed to someone else.
#[derive(Debug, Clone)]
pub struct SharedScope {
    pub grant: AccessGrant,
    pub serialized: String,
}

/// The outcome of resolving a scope.
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    /// The unrestricted grant uploads are performed with.
    pub grant: AccessGrant,
    pub serialized: String,
    pub shared: Option<SharedScope>,
    /// Store bound to the requested bucket.
    pub store: ScopedStore,
}

/// Produces grants and bucket-bound stores through a [`Connector`].
#[derive(Clone)]
pub struct ScopeManager {
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for ScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeManager").finish_non_exhaustive()
    }
}

impl ScopeManager {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// Derives or parses the grant named by `source` without touching the network.
    pub fn grant(&self, source: &ScopeSource) -> ScopeResult<AccessGrant> {
        match source {
            ScopeSource::Fresh {
                satellite,
                api_key,
                passphrase,
            } => AccessGrant::request_with_passphrase(satellite, api_key, passphrase),
            ScopeSource::Reuse { serialized } => AccessGrant::parse(serialized),
        }
    }

    /// Resolves `request` into a grant, an optional shareable grant and a
    /// store bound to the bucket, creating the bucket if it does not exist.
    #[tracing::instrument(
        target = TRACING_TARGET_SCOPE,
        name = "scope.resolve",
        skip(self, request),
        fields(bucket = %request.bucket)
    )]
    pub async fn resolve(&self, request: ScopeRequest) -> ScopeResult<ResolvedScope> {
        let bucket = request.bucket.trim();
        if bucket.is_empty() || bucket.contains('/') {
            return Err(ScopeError::InvalidBucket(request.bucket.clone()));
        }

        let grant = self.grant(&request.source)?;
        let shared = match &request.restriction {
            Some(restriction) => {
                let grant = grant.share(restriction)?;
                let serialized = grant.serialize()?;
                Some(SharedScope { grant, serialized })
            }
            None => None,
        };
        let serialized = grant.serialize()?;

        self.connector
            .ensure_bucket(&grant, bucket)
            .await
            .map_err(|source| ScopeError::Unreachable {
                bucket: bucket.to_string(),
                source,
            })?;
        let client = self
            .connector
            .connect(&grant, bucket)
            .await
            .map_err(|source| ScopeError::Unreachable {
                bucket: bucket.to_string(),
                source,
            })?;
        client
            .verify_reachable()
            .await
            .map_err(|source| ScopeError::Unreachable {
                bucket: bucket.to_string(),
                source,
            })?;

        tracing::info!(
            target: TRACING_TARGET_SCOPE,
            satellite = %grant.satellite(),
            restricted = shared.is_some(),
            "scope resolved"
        );

        Ok(ResolvedScope {
            store: ScopedStore::new(client, grant.clone(), bucket),
            grant,
            serialized,
            shared,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use jiff::{Timestamp, ToSpan};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use stow_object::RemoteStore;
    use stow_object::providers::MemoryBuckets;

    use super::*;
    use crate::connector::MemoryConnector;
    use crate::permission::{Operation, Permission};

    fn fresh() -> ScopeSource {
        ScopeSource::Fresh {
            satellite: "us1.sat.example.io:7777".into(),
            api_key: "13YqeGFpvtzbUp1QAfpvy2E5ZqLUFFNhEkv7153UDGDVnSmTuYYa".into(),
            passphrase: "secret".into(),
        }
    }

    #[tokio::test]
    async fn resolve_creates_bucket_and_binds_store() {
        let buckets = MemoryBuckets::new();
        let manager = ScopeManager::new(MemoryConnector::new(buckets.clone()));

        let scope = manager
            .resolve(ScopeRequest::new(fresh(), "backups"))
            .await
            .unwrap();
        assert!(buckets.contains("backups"));
        assert!(scope.shared.is_none());
        assert_eq!(scope.store.bucket(), "backups");

        scope
            .store
            .write_object("influx/0.txt", Bytes::from("x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolve_is_idempotent_for_existing_bucket() {
        let buckets = MemoryBuckets::new();
        let manager = ScopeManager::new(MemoryConnector::new(buckets.clone()));

        let first = manager
            .resolve(ScopeRequest::new(fresh(), "backups"))
            .await
            .unwrap();
        first
            .store
            .write_object("a/0", Bytes::from("x"))
            .await
            .unwrap();

        let second = manager
            .resolve(ScopeRequest::new(fresh(), "backups"))
            .await
            .unwrap();
        assert_eq!(second.store.list_keys("a/").await.unwrap(), vec!["a/0"]);
    }

    #[tokio::test]
    async fn serialized_grant_can_be_reused() {
        let manager = ScopeManager::new(MemoryConnector::default());
        let first = manager
            .resolve(ScopeRequest::new(fresh(), "b"))
            .await
            .unwrap();

        let reused = manager
            .resolve(ScopeRequest::new(
                ScopeSource::Reuse {
                    serialized: first.serialized.clone(),
                },
                "b",
            ))
            .await
            .unwrap();
        assert_eq!(reused.grant, first.grant);
    }

    #[tokio::test]
    async fn restriction_produces_shared_grant() {
        let manager = ScopeManager::new(MemoryConnector::default());
        let now = Timestamp::now();
        let restriction = Restriction::new(
            Permission::read_only().with_window(Some(now), Some(now + 1.hour())),
        );

        let scope = manager
            .resolve(ScopeRequest::new(fresh(), "b").with_restriction(restriction))
            .await
            .unwrap();
        let shared = scope.shared.unwrap();
        assert_ne!(shared.serialized, scope.serialized);
        assert!(shared.grant.allows(Operation::Download, "b", "k", now));
        assert!(!shared.grant.allows(Operation::Upload, "b", "k", now));
        assert!(scope.grant.allows(Operation::Upload, "b", "k", now));
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let manager = ScopeManager::new(MemoryConnector::default());
        let now = Timestamp::now();
        let restriction =
            Restriction::new(Permission::full().with_window(Some(now), Some(now - 1.hour())));

        let err = manager
            .resolve(ScopeRequest::new(fresh(), "b").with_restriction(restriction))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::InvalidWindow { .. }));
    }

    #[tokio::test]
    async fn empty_api_key_is_invalid_credentials() {
        let manager = ScopeManager::new(MemoryConnector::default());
        let source = ScopeSource::Fresh {
            satellite: "sat.example.io:7777".into(),
            api_key: String::new(),
            passphrase: String::new(),
        };
        let err = manager
            .resolve(ScopeRequest::new(source, "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn empty_bucket_is_rejected() {
        let manager = ScopeManager::new(MemoryConnector::default());
        let err = manager
            .resolve(ScopeRequest::new(fresh(), ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::InvalidBucket(_)));
    }

    #[tokio::test]
    async fn shared_grant_stays_restricted_when_reused() {
        let api_key = "13YqeGFpvtzbUp1QAfpvy2E5ZqLUFFNhEkv7153UDGDVnSmTuYYa";
        let manager = ScopeManager::new(MemoryConnector::default().with_api_key(api_key));
        let scope = manager
            .resolve(
                ScopeRequest::new(fresh(), "b")
                    .with_restriction(Restriction::new(Permission::read_only())),
            )
            .await
            .unwrap();
        let shared = scope
            .shared
            .unwrap()
            .grant
            .share(&Restriction::new(Permission::full()))
            .unwrap()
            .serialize()
            .unwrap();

        let reused = manager
            .resolve(ScopeRequest::new(
                ScopeSource::Reuse {
                    serialized: shared.clone(),
                },
                "b",
            ))
            .await
            .unwrap();
        assert!(reused.grant.is_restricted());
        assert!(
            reused
                .store
                .write_object("k", Bytes::from("x"))
                .await
                .is_err()
        );

        // Dropping a caveat leaves a grant the satellite no longer accepts.
        let mut wire: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&shared).unwrap()).unwrap();
        wire["caveats"].as_array_mut().unwrap().remove(0);
        let tampered = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&wire).unwrap());

        let err = manager
            .resolve(ScopeRequest::new(
                ScopeSource::Reuse {
                    serialized: tampered,
                },
                "b",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::Unreachable { .. }));
    }
}
