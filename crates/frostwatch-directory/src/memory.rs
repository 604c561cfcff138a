//! Process-local mirror.
//!
//! Backs the `memory` mirror backend and doubles as a test mirror: loads and
//! saves can be made to fail or stall, and writes are counted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use frostwatch_core::{DeviceToken, Location, MirrorError};

use crate::mirror::{Entries, LoadedDirectory, MirrorResult, RemoteMirror};

#[derive(Default)]
pub struct MemoryMirror {
    entries: Mutex<Entries>,
    failing_loads: AtomicU32,
    fail_saves: AtomicBool,
    save_delay: Mutex<Duration>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-existing records.
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Make the next `count` calls to `load_all` fail.
    pub fn fail_next_loads(&self, count: u32) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Make every `save_one` fail until reset.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Stall every `save_one` for `delay` before it is applied.
    pub fn set_save_delay(&self, delay: Duration) {
        *self.save_delay.lock() = delay;
    }

    /// Number of `load_all` calls, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of accepted writes.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Stored record for `token`.
    pub fn stored(&self, token: &DeviceToken) -> Option<Vec<Location>> {
        self.entries.lock().get(token).cloned()
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_all(&self) -> MirrorResult<LoadedDirectory> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MirrorError::unavailable("injected load failure"));
        }

        Ok(LoadedDirectory {
            entries: self.entries.lock().clone(),
        })
    }

    async fn save_one(&self, token: &DeviceToken, locations: &[Location]) -> MirrorResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(MirrorError::unavailable("injected save failure"));
        }

        let delay = *self.save_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.entries
            .lock()
            .insert(token.clone(), locations.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
