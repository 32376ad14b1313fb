//! In-process buckets backed by [`object_store::memory::InMemory`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use object_store::memory::InMemory;

use crate::client::ObjectStoreClient;
use crate::types::Error;

/// Shared registry of in-memory buckets.
///
/// Cloning the registry shares the buckets, so a client obtained after
/// [`ensure`](Self::ensure) sees everything written through earlier clients.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuckets {
    buckets: Arc<Mutex<HashMap<String, ObjectStoreClient>>>,
}

impl MemoryBuckets {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client for `bucket`, creating the bucket if absent.
    pub fn ensure(&self, bucket: &str) -> ObjectStoreClient {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_insert_with(|| ObjectStoreClient::new(InMemory::new()))
            .clone()
    }

    /// Returns the client for an existing `bucket`.
    pub fn get(&self, bucket: &str) -> Result<ObjectStoreClient, Error> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("bucket {bucket} does not exist"), "memory"))
    }

    /// Whether `bucket` has been created.
    pub fn contains(&self, bucket: &str) -> bool {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.contains_key(bucket)
    }
}
