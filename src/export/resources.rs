//! Transient references to exported payloads.
//!
//! A reference stays resolvable until it is released. Releases are scheduled
//! on a timer so the consumer of the reference has time to read it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, SketchError};

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
}

/// Shared registry of live transient references.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    inner: Arc<Inner>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        // Entries are plain data, a poisoned lock still holds a usable map.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `bytes` and return a reference of the form `blob:sketch/<n>`.
    pub fn create(&self, bytes: Vec<u8>) -> String {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let key = format!("blob:sketch/{id}");
        self.entries().insert(key.clone(), bytes.into());
        log::debug!("created transient resource {key}");
        key
    }

    pub fn get(&self, key: &str) -> Result<Arc<[u8]>> {
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| SketchError::ResourceMissing(key.to_string()))
    }

    /// Drop a reference. Returns whether it was still live.
    pub fn release(&self, key: &str) -> bool {
        let removed = self.entries().remove(key).is_some();
        if removed {
            log::debug!("released transient resource {key}");
        }
        removed
    }

    /// Release `key` once `delay` has passed, regardless of what happened to it meanwhile.
    pub fn release_after(&self, key: String, delay: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.release(&key);
        })
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }
}
