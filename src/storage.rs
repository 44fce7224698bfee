//! Singleton instance cache
//!
//! Uses DashMap so lookups only need `&Context`. Each descriptor id moves
//! through `vacant -> Building -> Built`; a build that fails drops its
//! [`BuildGuard`] and the id returns to vacant. A thread that finds another
//! thread's `Building` slot waits on it, so each id is built at most once at
//! a time.

use crate::Instance;
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

/// State of one singleton id.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Building(Arc<Pending>),
    Built(Instance),
}

/// An in-progress build, owned by one thread.
#[derive(Debug)]
pub(crate) struct Pending {
    owner: ThreadId,
    done: Mutex<bool>,
    ready: Condvar,
}

impl Pending {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            done: Mutex::new(false),
            ready: Condvar::new(),
        }
    }

    /// Block until the owning thread commits or abandons the build.
    fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self.ready.wait(done).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.ready.notify_all();
    }
}

/// Outcome of trying to claim an id for construction.
pub(crate) enum Claim<'a> {
    Cached(Instance),
    /// Under construction by this thread: re-entering it is a cycle
    Reentered,
    /// Under construction by another thread
    Pending(Arc<Pending>),
    Claimed(BuildGuard<'a>),
}

/// Thread-safe storage for built singletons.
pub(crate) struct InstanceCache {
    slots: DashMap<String, Slot, RandomState>,
    /// Waiting thread -> thread owning the build it waits on
    waiting: DashMap<ThreadId, ThreadId, RandomState>,
}

impl InstanceCache {
    /// Create an empty cache.
    ///
    /// 8 shards: wiring graphs are small and the cache is mostly read.
    #[inline]
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity.
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            slots: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            waiting: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub(crate) fn is_built(&self, id: &str) -> bool {
        matches!(self.slots.get(id).as_deref(), Some(Slot::Built(_)))
    }

    /// Return the cached instance, report an in-progress build, or mark the
    /// id as `Building` and hand back the guard for it.
    ///
    /// The shard lock is released before this returns, so waiting on a
    /// [`Claim::Pending`] never holds it.
    pub(crate) fn claim(&self, id: &str) -> Claim<'_> {
        match self.slots.entry(id.to_owned()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Built(instance) => Claim::Cached(instance.clone()),
                Slot::Building(pending) if pending.owner == thread::current().id() => {
                    Claim::Reentered
                }
                Slot::Building(pending) => Claim::Pending(Arc::clone(pending)),
            },
            Entry::Vacant(entry) => {
                let pending = Arc::new(Pending::new());
                entry.insert(Slot::Building(Arc::clone(&pending)));
                Claim::Claimed(BuildGuard {
                    cache: self,
                    id: id.to_owned(),
                    pending,
                    committed: false,
                })
            }
        }
    }

    /// Block until another thread finishes the build behind `pending`.
    ///
    /// Returns `false` without blocking when the owner is itself waiting,
    /// directly or through other threads, on this thread: the two builds
    /// depend on each other.
    pub(crate) fn wait_for(&self, pending: &Pending) -> bool {
        let current = thread::current().id();
        self.waiting.insert(current, pending.owner);

        let mut next = pending.owner;
        for _ in 0..=self.waiting.len() {
            let Some(owner) = self.waiting.get(&next).map(|entry| *entry.value()) else {
                break;
            };
            if owner == current {
                self.waiting.remove(&current);
                return false;
            }
            next = owner;
        }

        pending.wait();
        self.waiting.remove(&current);
        true
    }

    /// Drop the slot for `id`. Returns whether a built instance was removed.
    #[inline]
    pub(crate) fn remove(&self, id: &str) -> bool {
        matches!(self.slots.remove(id), Some((_, Slot::Built(_))))
    }

    /// Drop every built instance.
    #[inline]
    pub(crate) fn clear(&self) {
        self.slots.retain(|_, slot| matches!(slot, Slot::Building(_)));
    }

    /// Number of built instances.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Built(_)))
            .count()
    }
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive claim on a `Building` slot.
///
/// Committing stores the instance; dropping without committing clears the
/// slot so a failed build leaves nothing cached. Either way, threads waiting
/// on the slot are woken.
pub(crate) struct BuildGuard<'a> {
    cache: &'a InstanceCache,
    id: String,
    pending: Arc<Pending>,
    committed: bool,
}

impl BuildGuard<'_> {
    pub(crate) fn commit(mut self, instance: Instance) {
        self.cache
            .slots
            .insert(std::mem::take(&mut self.id), Slot::Built(instance));
        self.committed = true;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let pending = &self.pending;
            self.cache.slots.remove_if(&self.id, |_, slot| {
                matches!(slot, Slot::Building(other) if Arc::ptr_eq(other, pending))
            });
        }
        self.pending.finish();
    }
}
