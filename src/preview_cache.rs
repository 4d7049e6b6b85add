use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

use crate::error::{CaixaError, Result};
use crate::models::ImportPreview;

struct Entry {
    preview: Arc<ImportPreview>,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Short-lived single-consumer storage for previews awaiting confirmation.
#[derive(Default)]
pub struct PreviewCache {
    entries: Mutex<HashMap<String, Entry>>,
}

/// Opaque 128-bit key, hex encoded.
pub fn new_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: String, preview: Arc<ImportPreview>, ttl: Duration) {
        let entry = Entry {
            preview,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key, entry);
    }

    /// Remove and return the preview; a key can be taken at most once.
    pub fn take(&self, key: &str) -> Result<Arc<ImportPreview>> {
        let entry = self
            .entries
            .lock()
            .remove(key)
            .ok_or_else(|| CaixaError::PreviewNotFound(key.to_string()))?;
        if entry.expired(Instant::now()) {
            return Err(CaixaError::PreviewExpired(key.to_string()));
        }
        Ok(entry.preview)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Evict every expired entry, returning how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Background thread evicting expired previews; stops and joins when dropped.
pub struct Sweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn(cache: Arc<PreviewCache>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("preview-sweeper".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let evicted = cache.sweep_expired();
                        if evicted > 0 {
                            debug!(evicted, "expired previews swept");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
