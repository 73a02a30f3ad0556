use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use drift_model::{FileStatus, Hash, ScmStatus};
use tokio::sync::watch;
use tracing::trace;

/// Monotonic change counter assigned by the journal to each observable
/// working-copy mutation. Used to detect staleness of cached results.
pub type SequenceNumber = u64;

/// A status result together with the journal sequence it was computed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqStatusPair {
    pub sequence: SequenceNumber,
    pub status: ScmStatus,
}

impl SeqStatusPair {
    pub fn new(sequence: SequenceNumber, status: ScmStatus) -> Self {
        Self { sequence, status }
    }
}

/// Write end of an in-flight status computation.
///
/// One promise can feed any number of [`StatusFuture`]s; fulfilling it
/// resolves them all, including futures subscribed before the value
/// arrived. Dropping the promise without fulfilling it resolves every
/// subscriber with `None`.
pub struct StatusPromise {
    tx: watch::Sender<Option<ScmStatus>>,
}

impl StatusPromise {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Deliver the computed status to every subscribed future.
    pub fn fulfill(&self, status: ScmStatus) {
        self.tx.send_replace(Some(status));
    }

    /// A future that resolves when this promise is fulfilled.
    pub fn subscribe(&self) -> StatusFuture {
        StatusFuture(FutureInner::Waiting(self.tx.subscribe()))
    }
}

/// Read end of a cached or in-flight status result.
pub struct StatusFuture(FutureInner);

enum FutureInner {
    Ready(ScmStatus),
    Waiting(watch::Receiver<Option<ScmStatus>>),
}

impl StatusFuture {
    fn ready(status: ScmStatus) -> Self {
        Self(FutureInner::Ready(status))
    }

    /// True once a value is available without awaiting.
    pub fn is_ready(&self) -> bool {
        match &self.0 {
            FutureInner::Ready(_) => true,
            FutureInner::Waiting(rx) => rx.borrow().is_some(),
        }
    }

    /// Await the status. Returns `None` only if the producing promise
    /// was abandoned without ever being fulfilled.
    pub async fn wait(self) -> Option<ScmStatus> {
        match self.0 {
            FutureInner::Ready(status) => Some(status),
            FutureInner::Waiting(mut rx) => match rx.wait_for(|v| v.is_some()).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            },
        }
    }
}

/// Result of a cache lookup.
pub enum StatusLookup {
    /// A value is cached (ready future) or the same computation is
    /// already in flight (future chained to its promise).
    Future(StatusFuture),
    /// Cache miss. The promise has been registered as in-flight for
    /// this `(key, sequence)`; the caller must run the computation and
    /// either `insert` the result or `drop_promise`.
    Promise(Arc<StatusPromise>),
}

impl StatusLookup {
    pub fn is_future(&self) -> bool {
        matches!(self, StatusLookup::Future(_))
    }
}

enum CacheEntry {
    Completed {
        value: SeqStatusPair,
        cost: usize,
        last_used: u64,
    },
    Pending {
        sequence: SequenceNumber,
        promise: Arc<StatusPromise>,
    },
}

struct CacheState {
    entries: HashMap<Hash, CacheEntry>,
    total_cost: usize,
    tick: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Accounted cost of one completed entry.
fn entry_cost(value: &SeqStatusPair) -> usize {
    let entries: usize = value
        .status
        .iter()
        .map(|(path, _)| path.as_bytes().len() + std::mem::size_of::<FileStatus>())
        .sum();
    std::mem::size_of::<SequenceNumber>() + std::mem::size_of::<ScmStatus>() + entries
}

/// Concurrent cache of status computations keyed by commit identity.
///
/// Completed entries carry the journal sequence they were computed at;
/// an insertion with a sequence not strictly greater than the stored
/// one is silently dropped. Lookups that miss register an in-flight
/// promise so concurrent identical requests coalesce onto one
/// computation. Completed entries are evicted least-recently-used once
/// the accounted size exceeds `max_size_bytes`, down to a floor of
/// `minimum_items`; in-flight promises are pinned.
///
/// All public operations take one internal lock; nothing blocks inside.
pub struct StatusCache {
    max_size_bytes: usize,
    minimum_items: usize,
    state: Mutex<CacheState>,
}

impl StatusCache {
    pub const DEFAULT_MAX_SIZE_BYTES: usize = 4 * 1024 * 1024;
    pub const DEFAULT_MINIMUM_ITEMS: usize = 10;

    pub fn new(max_size_bytes: usize, minimum_items: usize) -> Self {
        Self {
            max_size_bytes,
            minimum_items,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                total_cost: 0,
                tick: 0,
            }),
        }
    }

    /// Look up the status for `key` as of `sequence`.
    pub fn get(&self, key: Hash, sequence: SequenceNumber) -> StatusLookup {
        let mut state = self.state.lock().unwrap();
        let tick = state.next_tick();

        match state.entries.get_mut(&key) {
            Some(CacheEntry::Completed { value, last_used, .. })
                if value.sequence >= sequence =>
            {
                *last_used = tick;
                return StatusLookup::Future(StatusFuture::ready(value.status.clone()));
            }
            Some(CacheEntry::Pending {
                sequence: pending_seq,
                promise,
            }) if *pending_seq == sequence => {
                return StatusLookup::Future(promise.subscribe());
            }
            _ => {}
        }

        // Miss: absent, completed-but-stale, or a promise in flight for
        // a different sequence. Register a fresh promise; a replaced
        // promise stays alive through Arcs its requester already holds.
        let promise = Arc::new(StatusPromise::new());
        let old = state.entries.insert(
            key,
            CacheEntry::Pending {
                sequence,
                promise: Arc::clone(&promise),
            },
        );
        if let Some(CacheEntry::Completed { cost, .. }) = old {
            state.total_cost -= cost;
        }
        StatusLookup::Promise(promise)
    }

    /// Install a computed result.
    ///
    /// Stale values (sequence not greater than the stored or in-flight
    /// one) are dropped silently. Fulfills the in-flight promise when
    /// the sequences match. May evict least-recently-used completed
    /// entries afterwards.
    pub fn insert(&self, key: Hash, value: SeqStatusPair) {
        let mut state = self.state.lock().unwrap();
        let tick = state.next_tick();
        let cost = entry_cost(&value);

        match state.entries.remove(&key) {
            None => {}
            Some(CacheEntry::Completed {
                value: stored,
                cost: stored_cost,
                last_used,
            }) => {
                if value.sequence <= stored.sequence {
                    trace!(key = %key, sequence = value.sequence, "dropping stale status insert");
                    state.entries.insert(
                        key,
                        CacheEntry::Completed {
                            value: stored,
                            cost: stored_cost,
                            last_used,
                        },
                    );
                    return;
                }
                state.total_cost -= stored_cost;
            }
            Some(CacheEntry::Pending { sequence, promise }) => {
                if value.sequence < sequence {
                    trace!(key = %key, sequence = value.sequence, "dropping stale status insert");
                    state
                        .entries
                        .insert(key, CacheEntry::Pending { sequence, promise });
                    return;
                }
                if value.sequence == sequence {
                    promise.fulfill(value.status.clone());
                }
            }
        }

        state.entries.insert(
            key,
            CacheEntry::Completed {
                value,
                cost,
                last_used: tick,
            },
        );
        state.total_cost += cost;

        self.evict(&mut state);
    }

    /// Abandon the in-flight registration for `(key, sequence)`.
    ///
    /// Exact sequence match only; no-op otherwise. Futures already
    /// handed out stay valid and still complete if the promise's owner
    /// fulfills it later.
    pub fn drop_promise(&self, key: Hash, sequence: SequenceNumber) {
        let mut state = self.state.lock().unwrap();
        let registered = matches!(
            state.entries.get(&key),
            Some(CacheEntry::Pending { sequence: pending_seq, .. }) if *pending_seq == sequence
        );
        if registered {
            state.entries.remove(&key);
        }
    }

    /// True iff a completed entry exists. In-flight promises don't count.
    pub fn contains(&self, key: Hash) -> bool {
        matches!(
            self.state.lock().unwrap().entries.get(&key),
            Some(CacheEntry::Completed { .. })
        )
    }

    /// Number of completed entries.
    pub fn object_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| matches!(e, CacheEntry::Completed { .. }))
            .count()
    }

    /// Evict least-recently-used completed entries until the accounted
    /// cost fits or the entry count reaches the configured floor.
    /// Pending promises are never evicted.
    fn evict(&self, state: &mut CacheState) {
        while state.total_cost > self.max_size_bytes {
            let completed = state
                .entries
                .iter()
                .filter_map(|(key, entry)| match entry {
                    CacheEntry::Completed { last_used, .. } => Some((*key, *last_used)),
                    CacheEntry::Pending { .. } => None,
                })
                .collect::<Vec<_>>();
            if completed.len() <= self.minimum_items {
                break;
            }
            // Entry counts stay small enough that a scan beats keeping
            // an intrusive recency list in sync.
            let Some(&(lru_key, _)) = completed.iter().min_by_key(|(_, used)| *used) else {
                break;
            };
            if let Some(CacheEntry::Completed { cost, .. }) = state.entries.remove(&lru_key) {
                state.total_cost -= cost;
                trace!(key = %lru_key, "evicted status cache entry");
            }
        }
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SIZE_BYTES, Self::DEFAULT_MINIMUM_ITEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_model::RelativePathBuf;

    fn status_of(entries: &[(&str, FileStatus)]) -> ScmStatus {
        entries
            .iter()
            .map(|(path, st)| (RelativePathBuf::parse(*path).unwrap(), *st))
            .collect()
    }

    async fn resolved(lookup: StatusLookup) -> ScmStatus {
        match lookup {
            StatusLookup::Future(future) => future.wait().await.expect("future resolved"),
            StatusLookup::Promise(_) => panic!("expected a future, got a cache miss"),
        }
    }

    #[tokio::test]
    async fn test_insert_sequence_status_pair() {
        let key = Hash::sha1_of(b"0123456789abcdef");
        let cache = StatusCache::default();
        assert!(!cache.contains(key));
        assert_eq!(cache.object_count(), 0);

        let initial = status_of(&[("foo", FileStatus::Added), ("bar", FileStatus::Added)]);
        cache.insert(key, SeqStatusPair::new(5, initial.clone()));
        assert!(cache.contains(key));
        assert_eq!(cache.object_count(), 1);
        assert_eq!(resolved(cache.get(key, 5)).await, initial);

        // Smaller sequence: the original value stays.
        cache.insert(key, SeqStatusPair::new(4, ScmStatus::new()));
        assert_eq!(cache.object_count(), 1);
        assert_eq!(resolved(cache.get(key, 5)).await, initial);

        // Larger sequence replaces the stored value.
        let third = ScmStatus::new();
        cache.insert(key, SeqStatusPair::new(6, third.clone()));
        assert_eq!(cache.object_count(), 1);
        assert_eq!(resolved(cache.get(key, 5)).await, third);
    }

    #[test]
    fn test_final_sequence_is_maximum() {
        let key = Hash::sha1_of(b"monotonic");
        let cache = StatusCache::default();

        for sequence in [3u64, 9, 1, 7, 9, 2] {
            let status = status_of(&[("f", FileStatus::Modified)]);
            cache.insert(key, SeqStatusPair::new(sequence, status));
        }

        let state = cache.state.lock().unwrap();
        match state.entries.get(&key) {
            Some(CacheEntry::Completed { value, .. }) => assert_eq!(value.sequence, 9),
            _ => panic!("expected a completed entry"),
        }
    }

    #[test]
    fn test_evict_when_cache_size_too_large() {
        // One entry "f1234" => 5 + size_of(FileStatus) bytes on top of the
        // fixed sequence and status costs.
        let status = status_of(&[("f1234", FileStatus::Added)]);
        let item_cost = entry_cost(&SeqStatusPair::new(1, status.clone()));
        let max_count = 600 / item_cost;

        let cache = StatusCache::new(600, 0);

        let mut keys = Vec::new();
        for i in 1..=max_count + 1 {
            let key = Hash::sha1_of(format!("{}", i).as_bytes());
            keys.push(key);
            cache.insert(key, SeqStatusPair::new(i as u64, status.clone()));

            if i <= max_count {
                assert_eq!(cache.object_count(), i);
            } else {
                assert_eq!(cache.object_count(), max_count);
            }
        }

        // The first key inserted is the least recently used.
        assert!(!cache.contains(keys[0]));
        assert!(cache.contains(*keys.last().unwrap()));
    }

    #[test]
    fn test_evict_on_update() {
        let status = status_of(&[("f1234", FileStatus::Added)]);
        let item_cost = entry_cost(&SeqStatusPair::new(1, status.clone()));
        let max_count = 600 / item_cost;

        let cache = StatusCache::new(600, max_count - 1);

        let mut keys = Vec::new();
        for i in 0..max_count {
            let key = Hash::sha1_of(format!("{}", i).as_bytes());
            keys.push(key);
            cache.insert(key, SeqStatusPair::new(i as u64, status.clone()));
        }
        assert_eq!(cache.object_count(), max_count);

        let big: ScmStatus = (0..100)
            .map(|i| {
                (
                    RelativePathBuf::parse(format!("file{}", i)).unwrap(),
                    FileStatus::Added,
                )
            })
            .collect();

        // Replacing the oldest entry with a much larger value forces
        // eviction down to the configured floor.
        cache.insert(keys[0], SeqStatusPair::new(1, big));
        assert_eq!(cache.object_count(), max_count - 1);
    }

    #[test]
    fn test_pending_promises_are_pinned() {
        let cache = StatusCache::new(16, 0);

        for i in 0..20 {
            let key = Hash::sha1_of(format!("pending{}", i).as_bytes());
            let lookup = cache.get(key, 1);
            assert!(!lookup.is_future());
        }

        // No completed entries, nothing evictable, nothing counted.
        assert_eq!(cache.object_count(), 0);
        assert_eq!(cache.state.lock().unwrap().entries.len(), 20);
    }

    #[tokio::test]
    async fn test_get_results_as_promise_or_future() {
        let cache = StatusCache::default();
        let status = status_of(&[("foo", FileStatus::Added)]);
        let key = Hash::sha1_of(b"foo");
        assert!(!cache.contains(key));

        let StatusLookup::Promise(promise) = cache.get(key, 1) else {
            panic!("first lookup must be a miss");
        };
        assert!(!cache.contains(key));

        let mut futures = Vec::new();
        for _ in 0..10 {
            match cache.get(key, 1) {
                StatusLookup::Future(future) => {
                    assert!(!future.is_ready());
                    futures.push(future);
                }
                StatusLookup::Promise(_) => panic!("in-flight lookup must coalesce"),
            }
            assert!(!cache.contains(key));
        }

        promise.fulfill(status.clone());

        for future in futures {
            assert!(future.is_ready());
            assert_eq!(future.wait().await.unwrap(), status);
        }

        // The registration persists until insert or drop_promise, so
        // later lookups still chain to the (now fulfilled) promise.
        for _ in 0..10 {
            let lookup = cache.get(key, 1);
            assert!(!cache.contains(key));
            assert_eq!(resolved(lookup).await, status);
        }

        cache.insert(key, SeqStatusPair::new(1, status.clone()));
        assert!(cache.contains(key));
        assert_eq!(resolved(cache.get(key, 1)).await, status);
    }

    #[tokio::test]
    async fn test_drop_cached_promise() {
        let cache = StatusCache::default();
        let status = status_of(&[("foo", FileStatus::Added)]);
        let key = Hash::sha1_of(b"foo");

        let StatusLookup::Promise(promise) = cache.get(key, 1) else {
            panic!("first lookup must be a miss");
        };

        let StatusLookup::Future(future) = cache.get(key, 1) else {
            panic!("second lookup must coalesce");
        };
        assert!(!future.is_ready());

        cache.drop_promise(key, 1);
        promise.fulfill(status.clone());

        // The future handed out before the drop still completes.
        assert!(future.is_ready());
        assert_eq!(future.wait().await.unwrap(), status);

        // The registration is gone, so this is a fresh miss.
        let lookup = cache.get(key, 1);
        assert!(!lookup.is_future());

        // Dropping with a non-matching sequence is a no-op.
        cache.drop_promise(key, 0);
        let lookup = cache.get(key, 1);
        assert!(lookup.is_future());
    }

    #[tokio::test]
    async fn test_insert_fulfills_matching_promise() {
        let cache = StatusCache::default();
        let status = status_of(&[("changed", FileStatus::Modified)]);
        let key = Hash::sha1_of(b"fulfill");

        let StatusLookup::Promise(_promise) = cache.get(key, 7) else {
            panic!("first lookup must be a miss");
        };
        let StatusLookup::Future(future) = cache.get(key, 7) else {
            panic!("second lookup must coalesce");
        };

        cache.insert(key, SeqStatusPair::new(7, status.clone()));

        assert!(cache.contains(key));
        assert_eq!(future.wait().await.unwrap(), status);
    }

    #[tokio::test]
    async fn test_abandoned_promise_resolves_none() {
        let cache = StatusCache::default();
        let key = Hash::sha1_of(b"abandoned");

        let StatusLookup::Promise(promise) = cache.get(key, 1) else {
            panic!("first lookup must be a miss");
        };
        let StatusLookup::Future(future) = cache.get(key, 1) else {
            panic!("second lookup must coalesce");
        };

        cache.drop_promise(key, 1);
        drop(promise);

        assert_eq!(future.wait().await, None);
    }
}
