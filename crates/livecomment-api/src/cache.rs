use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::warn;

use livecomment_types::models::Livecomment;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Per-livestream cache of the fully hydrated, unlimited comment list.
///
/// Reads are best-effort: anything other than a clean hit is a miss and the
/// caller recomputes from the store. Writers must call [`invalidate`] for
/// every livestream whose comment list they change.
///
/// A reader takes a [`FillTicket`] before it opens its read transaction and
/// hands it back to [`put`]. The put is dropped if any invalidation happened
/// in between, so a list read from an older snapshot never lands after a
/// newer write was invalidated.
///
/// [`invalidate`]: LivecommentCache::invalidate
/// [`put`]: LivecommentCache::put
pub struct LivecommentCache {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: LruCache<i64, Arc<[Livecomment]>>,
    invalidations: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FillTicket(u64);

impl LivecommentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                invalidations: 0,
            }),
        }
    }

    pub fn get(&self, livestream_id: i64) -> Option<Arc<[Livecomment]>> {
        match self.inner.lock() {
            Ok(mut inner) => inner.entries.get(&livestream_id).cloned(),
            Err(e) => {
                warn!("Livecomment cache lock poisoned, treating as miss: {}", e);
                None
            }
        }
    }

    pub fn ticket(&self) -> FillTicket {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        FillTicket(inner.invalidations)
    }

    /// Store a freshly read list. Returns false if the list was discarded
    /// because an invalidation raced with the read.
    pub fn put(&self, livestream_id: i64, ticket: FillTicket, livecomments: Vec<Livecomment>) -> bool {
        match self.inner.lock() {
            Ok(mut inner) => {
                if inner.invalidations != ticket.0 {
                    return false;
                }
                inner.entries.put(livestream_id, livecomments.into());
                true
            }
            Err(e) => {
                warn!("Livecomment cache lock poisoned, skipping put: {}", e);
                false
            }
        }
    }

    /// Drop the entry for a livestream. Never fails: a poisoned cache is
    /// cleared entirely so no stale list can be served.
    pub fn invalidate(&self, livestream_id: i64) {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.entries.pop(&livestream_id);
                inner.invalidations = inner.invalidations.wrapping_add(1);
            }
            Err(poisoned) => {
                warn!("Livecomment cache lock poisoned, clearing all entries");
                let mut inner = poisoned.into_inner();
                inner.entries.clear();
                inner.invalidations = inner.invalidations.wrapping_add(1);
            }
        }
    }
}

impl Default for LivecommentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
