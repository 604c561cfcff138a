//! In-memory token → locations directory with write-through mirroring.
//!
//! Concurrency:
//! - Mutations are serialized by an async writer lock that is held across
//!   the mirror write, so two mutations never interleave their
//!   apply-then-mirror steps.
//! - The map itself sits behind a short-lived `RwLock`. Its write lock is
//!   only held while the in-memory change is applied, never across I/O.
//! - The map is an `Arc` so [`Directory::snapshot`] is a pointer copy;
//!   a mutation after a snapshot clones the map (copy-on-write), leaving the
//!   snapshot untouched.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use frostwatch_core::{DeviceToken, DirectoryError, Location};

use crate::mirror::{Entries, RemoteMirror};

/// Outcome of [`Directory::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    AlreadyExists,
}

/// Outcome of [`Directory::add_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Outcome of [`Directory::remove_location`] and [`Directory::remove_coordinates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Read-only view of the directory taken at a point in time.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    entries: Arc<Entries>,
}

impl DirectorySnapshot {
    /// Tokens in ascending order, each with its locations in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceToken, &[Location])> {
        self.entries.iter().map(|(t, l)| (t, l.as_slice()))
    }

    pub fn get(&self, token: &DeviceToken) -> Option<&[Location]> {
        self.entries.get(token).map(Vec::as_slice)
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (token, location) pairs.
    pub fn location_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

pub struct Directory {
    entries: RwLock<Arc<Entries>>,
    writer: tokio::sync::Mutex<()>,
    mirror: Arc<dyn RemoteMirror>,
    mirror_timeout: Duration,
}

impl Directory {
    /// Load the full directory from `mirror` (single attempt).
    ///
    /// An empty store produces an empty, usable directory.
    ///
    /// # Errors
    /// Returns `DirectoryError::RemoteUnavailable` if the load fails or
    /// exceeds `mirror_timeout`.
    pub async fn load(
        mirror: Arc<dyn RemoteMirror>,
        mirror_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let loaded = match tokio::time::timeout(mirror_timeout, mirror.load_all()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DirectoryError::RemoteUnavailable(format!(
                    "{} load timed out after {:?}",
                    mirror.name(),
                    mirror_timeout
                )))
            }
        };

        if loaded.is_empty() {
            tracing::info!("{} mirror is empty; starting with an empty directory", mirror.name());
        } else {
            tracing::info!(
                "Loaded {} tokens from {} mirror",
                loaded.len(),
                mirror.name()
            );
        }

        Ok(Self {
            entries: RwLock::new(Arc::new(loaded.entries)),
            writer: tokio::sync::Mutex::new(()),
            mirror,
            mirror_timeout,
        })
    }

    /// Register a device token.
    ///
    /// # Errors
    /// Returns `DirectoryError::RemoteUnavailable` if the mirror write fails;
    /// the token stays registered in memory.
    pub async fn register(&self, token: &DeviceToken) -> Result<RegisterOutcome, DirectoryError> {
        let _writer = self.writer.lock().await;

        {
            let mut guard = self.entries.write();
            if guard.contains_key(token) {
                tracing::debug!("Token already registered: {}", token);
                return Ok(RegisterOutcome::AlreadyExists);
            }
            Arc::make_mut(&mut *guard).insert(token.clone(), Vec::new());
        }

        self.mirror_token(token, &[]).await?;
        tracing::info!("Registered token: {}", token);
        Ok(RegisterOutcome::Registered)
    }

    /// Append `location` to the token's list. An unknown token is
    /// registered implicitly.
    ///
    /// # Errors
    /// Returns `DirectoryError::RemoteUnavailable` if the mirror write fails;
    /// the location stays added in memory.
    pub async fn add_location(
        &self,
        token: &DeviceToken,
        location: Location,
    ) -> Result<AddOutcome, DirectoryError> {
        let _writer = self.writer.lock().await;

        let updated = {
            let mut guard = self.entries.write();
            if guard
                .get(token)
                .is_some_and(|locations| locations.contains(&location))
            {
                tracing::debug!("Location {} already present for token {}", location.name, token);
                return Ok(AddOutcome::AlreadyPresent);
            }
            let locations = Arc::make_mut(&mut *guard).entry(token.clone()).or_default();
            locations.push(location);
            locations.clone()
        };

        self.mirror_token(token, &updated).await?;
        tracing::info!("Location added for token {} ({} total)", token, updated.len());
        Ok(AddOutcome::Added)
    }

    /// Remove the entry structurally equal to `location`.
    ///
    /// # Errors
    /// `DirectoryError::UnknownToken` if the token was never registered;
    /// `DirectoryError::RemoteUnavailable` if the mirror write fails.
    pub async fn remove_location(
        &self,
        token: &DeviceToken,
        location: &Location,
    ) -> Result<RemoveOutcome, DirectoryError> {
        self.remove_first(token, |candidate| candidate == location)
            .await
    }

    /// Remove the first entry at the given coordinates, whatever its name
    /// and unit.
    ///
    /// # Errors
    /// Same as [`Directory::remove_location`].
    pub async fn remove_coordinates(
        &self,
        token: &DeviceToken,
        latitude: &str,
        longitude: &str,
    ) -> Result<RemoveOutcome, DirectoryError> {
        self.remove_first(token, |candidate| {
            candidate.has_coordinates(latitude, longitude)
        })
        .await
    }

    async fn remove_first<F>(
        &self,
        token: &DeviceToken,
        matches: F,
    ) -> Result<RemoveOutcome, DirectoryError>
    where
        F: Fn(&Location) -> bool,
    {
        let _writer = self.writer.lock().await;

        let updated = {
            let mut guard = self.entries.write();
            let Some(index) = guard
                .get(token)
                .ok_or_else(|| DirectoryError::UnknownToken(token.to_string()))?
                .iter()
                .position(|candidate| matches(candidate))
            else {
                tracing::debug!("Location not found for token {}", token);
                return Ok(RemoveOutcome::NotFound);
            };

            let entries = Arc::make_mut(&mut *guard);
            match entries.get_mut(token) {
                Some(locations) => {
                    locations.remove(index);
                    locations.clone()
                }
                None => return Err(DirectoryError::UnknownToken(token.to_string())),
            }
        };

        self.mirror_token(token, &updated).await?;
        tracing::info!("Location removed for token {} ({} left)", token, updated.len());
        Ok(RemoveOutcome::Removed)
    }

    async fn mirror_token(
        &self,
        token: &DeviceToken,
        locations: &[Location],
    ) -> Result<(), DirectoryError> {
        let result =
            tokio::time::timeout(self.mirror_timeout, self.mirror.save_one(token, locations))
                .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!("Mirror write failed for token {}: {}", token, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::error!(
                    "Mirror write for token {} timed out after {:?}",
                    token,
                    self.mirror_timeout
                );
                Err(DirectoryError::RemoteUnavailable(format!(
                    "{} save timed out after {:?}",
                    self.mirror.name(),
                    self.mirror_timeout
                )))
            }
        }
    }

    /// Point-in-time, read-only view for a sweep.
    pub fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            entries: Arc::clone(&*self.entries.read()),
        }
    }

    /// Copy of the locations stored for `token`.
    pub fn locations(&self, token: &DeviceToken) -> Option<Vec<Location>> {
        self.entries.read().get(token).cloned()
    }

    pub fn contains(&self, token: &DeviceToken) -> bool {
        self.entries.read().contains_key(token)
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::memory::MemoryMirror;
    use crate::mirror::RemoteMirror;
    use crate::sqlite::SqliteMirror;
    use frostwatch_core::TemperatureUnit;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn token(s: &str) -> DeviceToken {
        DeviceToken::new(s)
    }

    fn loc(lat: &str, lon: &str, name: &str) -> Location {
        Location::new(lat, lon, name, TemperatureUnit::Celsius)
    }

    async fn directory_with(mirror: Arc<MemoryMirror>) -> Directory {
        Directory::load(mirror, TIMEOUT).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_directory() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        assert!(dir.is_empty());
        assert!(dir.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_mirror_write_times_out() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = Directory::load(mirror.clone(), Duration::from_millis(50))
            .await
            .unwrap();
        mirror.set_save_delay(Duration::from_secs(5));

        let started = std::time::Instant::now();
        let result = dir.add_location(&token("slow"), loc("1", "2", "Field")).await;

        assert!(matches!(result, Err(DirectoryError::RemoteUnavailable(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(dir.locations(&token("slow")), Some(vec![loc("1", "2", "Field")]));
        assert_eq!(mirror.save_count(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_is_remote_unavailable() {
        let mirror = Arc::new(MemoryMirror::new());
        mirror.fail_next_loads(1);
        let result = Directory::load(mirror, TIMEOUT).await;
        assert!(matches!(result, Err(DirectoryError::RemoteUnavailable(_))));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;

        assert_eq!(dir.register(&token("a")).await.unwrap(), RegisterOutcome::Registered);
        assert_eq!(dir.register(&token("a")).await.unwrap(), RegisterOutcome::AlreadyExists);

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.locations(&token("a")), Some(vec![]));
        // Only the first call touched the mirror
        assert_eq!(mirror.save_count(), 1);
        assert_eq!(mirror.stored(&token("a")), Some(vec![]));
    }

    #[tokio::test]
    async fn test_duplicate_add_is_noop() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("a");

        assert_eq!(
            dir.add_location(&t, loc("10", "20", "Orchard")).await.unwrap(),
            AddOutcome::Added
        );
        assert_eq!(
            dir.add_location(&t, loc("10", "20", "Orchard")).await.unwrap(),
            AddOutcome::AlreadyPresent
        );

        assert_eq!(dir.locations(&t).unwrap().len(), 1);
        assert_eq!(mirror.save_count(), 1);
    }

    #[tokio::test]
    async fn test_same_coordinates_different_name_are_distinct() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        let t = token("a");

        dir.add_location(&t, loc("10", "20", "Orchard")).await.unwrap();
        dir.add_location(&t, loc("10", "20", "Barn")).await.unwrap();

        assert_eq!(dir.locations(&t).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_registers_unknown_token() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("new");

        dir.add_location(&t, loc("1", "2", "Field")).await.unwrap();

        assert!(dir.contains(&t));
        assert_eq!(mirror.stored(&t), Some(vec![loc("1", "2", "Field")]));
    }

    #[tokio::test]
    async fn test_add_preserves_order_and_mirrors_full_list() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("a");

        dir.add_location(&t, loc("1", "1", "first")).await.unwrap();
        dir.add_location(&t, loc("2", "2", "second")).await.unwrap();
        dir.add_location(&t, loc("3", "3", "third")).await.unwrap();

        let names: Vec<_> = mirror
            .stored(&t)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_remove_unknown_token() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        let result = dir.remove_location(&token("ghost"), &loc("1", "2", "x")).await;
        assert!(matches!(result, Err(DirectoryError::UnknownToken(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_location_does_not_write() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("a");
        dir.register(&t).await.unwrap();

        let outcome = dir.remove_location(&t, &loc("1", "2", "x")).await.unwrap();

        assert_eq!(outcome, RemoveOutcome::NotFound);
        assert_eq!(mirror.save_count(), 1);
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_previous_state() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("a");
        dir.add_location(&t, loc("1", "1", "keep")).await.unwrap();
        let before = dir.locations(&t).unwrap();

        let added = loc("5", "6", "temp");
        dir.add_location(&t, added.clone()).await.unwrap();
        let outcome = dir.remove_location(&t, &added).await.unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(dir.locations(&t).unwrap(), before);
        assert_eq!(mirror.stored(&t).unwrap(), before);
    }

    #[tokio::test]
    async fn test_structural_remove_requires_full_match() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        let t = token("a");
        dir.add_location(&t, loc("1", "2", "Orchard")).await.unwrap();

        let outcome = dir.remove_location(&t, &loc("1", "2", "Other")).await.unwrap();
        assert_eq!(outcome, RemoveOutcome::NotFound);
        assert_eq!(dir.locations(&t).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_coordinates_takes_first_match() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        let t = token("a");
        dir.add_location(&t, loc("1", "2", "Orchard")).await.unwrap();
        dir.add_location(&t, loc("1", "2", "Barn")).await.unwrap();

        let outcome = dir.remove_coordinates(&t, "1", "2").await.unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(dir.locations(&t).unwrap(), vec![loc("1", "2", "Barn")]);
    }

    #[tokio::test]
    async fn test_mirror_failure_surfaces_but_keeps_memory_change() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = directory_with(mirror.clone()).await;
        let t = token("a");

        mirror.set_fail_saves(true);
        let result = dir.add_location(&t, loc("1", "2", "x")).await;

        assert!(matches!(result, Err(DirectoryError::RemoteUnavailable(_))));
        // Not rolled back
        assert_eq!(dir.locations(&t).unwrap().len(), 1);
        assert_eq!(mirror.stored(&t), None);
    }

    #[tokio::test]
    async fn test_snapshot_does_not_see_later_mutations() {
        let dir = directory_with(Arc::new(MemoryMirror::new())).await;
        let t = token("a");
        dir.add_location(&t, loc("1", "1", "before")).await.unwrap();

        let snapshot = dir.snapshot();
        dir.add_location(&t, loc("2", "2", "after")).await.unwrap();
        dir.register(&token("b")).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&t).unwrap().len(), 1);
        assert_eq!(dir.snapshot().location_count(), 2);
    }

    #[tokio::test]
    async fn test_reload_reflects_last_written_state() {
        let mirror = Arc::new(SqliteMirror::in_memory().unwrap());
        let dir = Directory::load(mirror.clone(), TIMEOUT).await.unwrap();

        let a = token("a");
        let b = token("b");
        dir.register(&a).await.unwrap();
        dir.add_location(&a, loc("1", "1", "one")).await.unwrap();
        dir.add_location(&a, loc("2", "2", "two")).await.unwrap();
        dir.add_location(&b, loc("3", "3", "three")).await.unwrap();
        dir.remove_coordinates(&a, "1", "1").await.unwrap();

        let loaded = mirror.load_all().await.unwrap();
        assert_eq!(loaded.entries[&a], vec![loc("2", "2", "two")]);
        assert_eq!(loaded.entries[&b], vec![loc("3", "3", "three")]);

        let reloaded = Directory::load(mirror, TIMEOUT).await.unwrap();
        assert_eq!(reloaded.locations(&a), dir.locations(&a));
        assert_eq!(reloaded.locations(&b), dir.locations(&b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_all_kept() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = Arc::new(directory_with(mirror.clone()).await);
        let t = token("shared");

        let mut handles = Vec::new();
        for i in 0..20 {
            let dir = Arc::clone(&dir);
            let t = t.clone();
            handles.push(tokio::spawn(async move {
                dir.add_location(&t, loc(&i.to_string(), "0", "n")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(dir.locations(&t).unwrap().len(), 20);
        assert_eq!(mirror.stored(&t).unwrap().len(), 20);
    }
}
