//! Remote mirror trait.
//!
//! This module defines the `RemoteMirror` trait that abstracts over durable
//! stores (SQLite, in-memory) backing the directory.

use async_trait::async_trait;
use frostwatch_core::{DeviceToken, Location, MirrorError};
use std::collections::BTreeMap;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Token → ordered locations. Ordered by token so sweeps iterate
/// deterministically.
pub type Entries = BTreeMap<DeviceToken, Vec<Location>>;

/// Full contents of a mirror as returned by [`RemoteMirror::load_all`].
#[derive(Debug, Clone, Default)]
pub struct LoadedDirectory {
    pub entries: Entries,
}

impl LoadedDirectory {
    /// True when the store held no records at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Durable store the directory loads from and writes through to.
///
/// Keyed by token; each value is that token's full ordered location list.
/// Writes are per-token upserts, atomic at the record level only.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Read every record.
    ///
    /// # Errors
    /// Returns `MirrorError` when the store cannot be read or a record
    /// cannot be decoded.
    async fn load_all(&self) -> MirrorResult<LoadedDirectory>;

    /// Insert or replace the record for `token`.
    ///
    /// # Errors
    /// Returns `MirrorError` when the write is not durably accepted.
    async fn save_one(&self, token: &DeviceToken, locations: &[Location]) -> MirrorResult<()>;
}
