//! Per-entity result cache with time-based invalidation.
//!
//! Each entity holds two independently timestamped slots, one for its
//! detections and one for its annotations. A slot is fresh while its age is
//! at most the TTL; a stale slot is treated as absent and refetched.
//!
//! Concurrency:
//! - the entry map is the only shared state; fetches run without holding it
//! - concurrent lookups of the same `(entity, kind)` queue on a per-key
//!   lock, so only the first one fetches and the others reuse its entry
//! - [`EntityCache::clear`] bumps an epoch; a fetch started before the clear
//!   still answers its caller but is not stored

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::stats::CacheStats;
use crate::types::{Annotation, Detection, EntityId, ResultKind};

/// Default time-to-live of a cache slot: 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Results together with the time they were fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub results: Vec<T>,
}

impl<T> Timestamped<T> {
    /// Stamp `results` with the current time.
    pub fn now(results: Vec<T>) -> Self {
        Self {
            timestamp: Utc::now(),
            results,
        }
    }

    /// Whether the slot is at most `ttl` old at `now`.
    ///
    /// Timestamps in the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.timestamp).to_std() {
            Ok(age) => age <= ttl,
            Err(_) => true,
        }
    }
}

/// Cached results of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Timestamped<Detection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Timestamped<Annotation>>,
}

/// Whole-cache snapshot, keyed by entity.
pub type CacheDump = BTreeMap<EntityId, CacheEntry>;

/// Typed access to one slot of a [`CacheEntry`].
pub trait CacheSlot {
    type Record: Clone + Send + Sync;

    const KIND: ResultKind;

    fn get(entry: &CacheEntry) -> Option<&Timestamped<Self::Record>>;

    fn get_mut(entry: &mut CacheEntry) -> &mut Option<Timestamped<Self::Record>>;
}

/// The detections slot.
#[derive(Debug)]
pub enum DetectionSlot {}

/// The annotations slot.
#[derive(Debug)]
pub enum AnnotationSlot {}

impl CacheSlot for DetectionSlot {
    type Record = Detection;

    const KIND: ResultKind = ResultKind::Detections;

    fn get(entry: &CacheEntry) -> Option<&Timestamped<Detection>> {
        entry.detections.as_ref()
    }

    fn get_mut(entry: &mut CacheEntry) -> &mut Option<Timestamped<Detection>> {
        &mut entry.detections
    }
}

impl CacheSlot for AnnotationSlot {
    type Record = Annotation;

    const KIND: ResultKind = ResultKind::Annotations;

    fn get(entry: &CacheEntry) -> Option<&Timestamped<Annotation>> {
        entry.annotations.as_ref()
    }

    fn get_mut(entry: &mut CacheEntry) -> &mut Option<Timestamped<Annotation>> {
        &mut entry.annotations
    }
}

#[derive(Debug, Default)]
struct CacheState {
    epoch: u64,
    entries: CacheDump,
}

enum Lookup<T> {
    Fresh(Vec<T>),
    Stale,
    Missing,
}

impl CacheState {
    fn lookup<S: CacheSlot>(&self, entity: EntityId, ttl: Duration) -> Lookup<S::Record> {
        match self.entries.get(&entity).and_then(S::get) {
            Some(slot) if slot.is_fresh(Utc::now(), ttl) => Lookup::Fresh(slot.results.clone()),
            Some(_) => Lookup::Stale,
            None => Lookup::Missing,
        }
    }
}

/// Keyed, time-bounded store of per-entity results.
#[derive(Debug)]
pub struct EntityCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    key_locks: Mutex<HashMap<(EntityId, ResultKind), Arc<tokio::sync::Mutex<()>>>>,
    stats: Mutex<CacheStats>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    /// Create an empty cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create an empty cache whose slots expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
            key_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Time-to-live of a slot.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the fresh results of slot `S` for `entity`, or run `fetch`
    /// and store what it returns.
    ///
    /// A failed fetch leaves the slot untouched.
    pub async fn get_or_fetch<S, F, Fut>(&self, entity: EntityId, fetch: F) -> Result<Vec<S::Record>>
    where
        S: CacheSlot,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<S::Record>>>,
    {
        match self.state.read().await.lookup::<S>(entity, self.ttl) {
            Lookup::Fresh(results) => {
                self.record(CacheStats::record_hit);
                tracing::trace!(entity, kind = %S::KIND, "cache hit");
                return Ok(results);
            }
            Lookup::Stale => {
                self.record(CacheStats::record_expired);
                tracing::debug!(entity, kind = %S::KIND, "cache entry expired");
            }
            Lookup::Missing => {}
        }

        let key_lock = self.key_lock(entity, S::KIND);
        let outcome = {
            let _guard = key_lock.lock().await;
            self.fetch_and_store::<S, _, _>(entity, fetch).await
        };
        self.release_key_lock(entity, S::KIND, &key_lock);
        outcome
    }

    async fn fetch_and_store<S, F, Fut>(&self, entity: EntityId, fetch: F) -> Result<Vec<S::Record>>
    where
        S: CacheSlot,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<S::Record>>>,
    {
        let epoch = {
            let state = self.state.read().await;
            // filled by a concurrent caller while we waited for the key
            if let Lookup::Fresh(results) = state.lookup::<S>(entity, self.ttl) {
                self.record(CacheStats::record_hit);
                return Ok(results);
            }
            state.epoch
        };

        self.record(CacheStats::record_miss);
        tracing::debug!(entity, kind = %S::KIND, "cache miss, fetching");

        let results = match fetch().await {
            Ok(results) => results,
            Err(e) => {
                self.record(CacheStats::record_failure);
                tracing::warn!(entity, kind = %S::KIND, error = %e, "fetch failed");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.epoch == epoch {
            let entry = state.entries.entry(entity).or_default();
            *S::get_mut(entry) = Some(Timestamped::now(results.clone()));
        } else {
            self.record(CacheStats::record_discarded);
            tracing::debug!(entity, kind = %S::KIND, "discarding results fetched before cache was cleared");
        }

        Ok(results)
    }

    /// [`get_or_fetch`](Self::get_or_fetch) for the detections slot.
    pub async fn detections<F, Fut>(&self, entity: EntityId, fetch: F) -> Result<Vec<Detection>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Detection>>>,
    {
        self.get_or_fetch::<DetectionSlot, _, _>(entity, fetch).await
    }

    /// [`get_or_fetch`](Self::get_or_fetch) for the annotations slot.
    pub async fn annotations<F, Fut>(&self, entity: EntityId, fetch: F) -> Result<Vec<Annotation>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Annotation>>>,
    {
        self.get_or_fetch::<AnnotationSlot, _, _>(entity, fetch).await
    }

    /// Discard every entry of every entity.
    ///
    /// Fetches already in flight will not repopulate the cache.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.epoch += 1;
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!(epoch = state.epoch, "cache cleared");
    }

    /// Snapshot of every entry.
    pub async fn dump(&self) -> CacheDump {
        self.state.read().await.entries.clone()
    }

    /// Replace the whole cache with `dump`.
    ///
    /// Restored slots keep their timestamps and expire as usual. Fetches
    /// in flight will not repopulate the cache.
    pub async fn restore(&self, dump: CacheDump) {
        let mut state = self.state.write().await;
        state.entries = dump;
        state.epoch += 1;
        tracing::debug!(entities = state.entries.len(), "cache restored");
    }

    /// Number of entities with at least one slot.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether no entity is cached.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Counters collected so far.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, update: fn(&mut CacheStats)) {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn key_lock(&self, entity: EntityId, kind: ResultKind) -> Arc<tokio::sync::Mutex<()>> {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((entity, kind))
            .or_default()
            .clone()
    }

    /// Drop the map's lock for a key once no other caller holds or awaits it.
    fn release_key_lock(&self, entity: EntityId, kind: ResultKind, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let unshared = locks
            .get(&(entity, kind))
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(lock) == 2);
        if unshared {
            locks.remove(&(entity, kind));
        }
    }
}
