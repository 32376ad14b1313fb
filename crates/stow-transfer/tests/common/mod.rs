#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use object_store::memory::InMemory;
use stow_object::{Error, ObjectStoreClient, PutOutput, RemoteStore};
use stow_transfer::CancellationToken;

/// In-memory store whose writes fail on demand.
pub struct FlakyStore {
    pub inner: ObjectStoreClient,
    /// Writes that succeed before failures start.
    succeed_first: u32,
    /// Consecutive transient failures injected after that.
    failures: AtomicU32,
    pub write_attempts: AtomicU32,
    successes: AtomicU32,
    /// Cancelled after the given number of committed writes.
    cancel_after: Mutex<Option<(u32, CancellationToken)>>,
    /// Pause before every write, so concurrent uploads get a chance to interleave.
    write_delay: Option<Duration>,
    /// Committed keys with the first byte of their data, in commit order.
    log: Mutex<Vec<(String, u8)>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::failing(0, 0)
    }

    pub fn failing(succeed_first: u32, failures: u32) -> Self {
        Self {
            inner: ObjectStoreClient::new(InMemory::new()),
            succeed_first,
            failures: AtomicU32::new(failures),
            write_attempts: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            cancel_after: Mutex::new(None),
            write_delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn log(&self) -> Vec<(String, u8)> {
        self.log.lock().unwrap().clone()
    }

    pub fn cancel_after(self, writes: u32, token: CancellationToken) -> Self {
        *self.cancel_after.lock().unwrap() = Some((writes, token));
        self
    }

    pub fn attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        let mut keys = self.inner.list_keys(prefix).await.unwrap();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl RemoteStore for FlakyStore {
    async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.successes.load(Ordering::SeqCst) >= self.succeed_first {
            let injected = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(Error::runtime("injected write failure", "flaky", true));
            }
        }

        let first = data.first().copied().unwrap_or_default();
        let output = self.inner.write_object(key, data).await?;
        self.log.lock().unwrap().push((key.to_string(), first));
        let done = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if done >= *after {
                token.cancel();
            }
        }
        Ok(output)
    }

    async fn read_object(&self, key: &str) -> Result<Bytes, Error> {
        self.inner.read_object(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        self.inner.list_keys(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        self.inner.delete_object(key).await
    }
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, data).unwrap();
    path
}
