//! Object pools
//!
//! [`ObjectPool`] recycles plain values behind generational handles.
//! [`EntityPools`] applies the same acquire/release contract to whole
//! entities, deferring the structural part of a release to the next phase
//! boundary.

mod entity_pool;

pub use entity_pool::{EntityPoolId, EntityPools};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ecs::Service;
use crate::foundation::collections::{EntityId, PoolKey, SlotMap};

/// A value that can be recycled by an [`ObjectPool`]
pub trait Poolable {
    /// Restore the pool-default state. Runs on every acquire and release.
    fn reset(&mut self);

    /// Deactivate before returning to the free list
    fn on_release(&mut self) {}
}

/// Errors raised by pool misuse
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The instance is already in the pool
    #[error("instance released twice")]
    DoubleRelease,

    /// The instance does not belong to this pool
    #[error("instance does not belong to this pool")]
    ForeignInstance,

    /// The handle refers to an entry that no longer exists
    #[error("unknown pool handle")]
    UnknownHandle,

    /// No entity pool registered under the name
    #[error("no entity pool named `{0}`")]
    UnknownPool(String),

    /// The entity has been destroyed or was never created
    #[error("entity {0:?} is destroyed or unknown")]
    DestroyedEntity(EntityId),
}

/// Identifier distinguishing one object pool from another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u32);

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

impl PoolId {
    fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a pooled instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    pool: PoolId,
    key: PoolKey,
}

impl PoolHandle {
    /// Pool that issued the handle
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

/// Pool usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquisitions
    pub acquired: u64,
    /// Successful releases
    pub released: u64,
    /// Instances created by the factory
    pub allocated: u64,
    /// Largest number of instances simultaneously in use
    pub peak_in_use: usize,
}

struct PoolEntry<T> {
    value: T,
    in_pool: bool,
}

/// Growable pool of reusable instances.
///
/// The pool never shrinks: `size()` only grows when `acquire` finds the free
/// list empty.
pub struct ObjectPool<T: Poolable> {
    id: PoolId,
    entries: SlotMap<PoolKey, PoolEntry<T>>,
    free: VecDeque<PoolKey>,
    factory: Box<dyn FnMut() -> T>,
    stats: PoolStats,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create an empty pool
    pub fn new(factory: impl FnMut() -> T + 'static) -> Self {
        Self {
            id: PoolId::next(),
            entries: SlotMap::with_key(),
            free: VecDeque::new(),
            factory: Box::new(factory),
            stats: PoolStats::default(),
        }
    }

    /// Create a pool pre-warmed with `capacity` instances
    pub fn with_capacity(capacity: usize, factory: impl FnMut() -> T + 'static) -> Self {
        let mut pool = Self::new(factory);
        pool.reserve(capacity);
        pool
    }

    /// Grow the free list by `additional` fresh instances
    pub fn reserve(&mut self, additional: usize) {
        for _ in 0..additional {
            let mut value = (self.factory)();
            value.reset();
            let key = self.entries.insert(PoolEntry { value, in_pool: true });
            self.free.push_back(key);
            self.stats.allocated += 1;
        }
    }

    /// Identifier of this pool
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Take an instance, reusing a released one when available
    pub fn acquire(&mut self) -> PoolHandle {
        let key = match self.free.pop_front() {
            Some(key) => key,
            None => {
                let value = (self.factory)();
                self.stats.allocated += 1;
                self.entries.insert(PoolEntry { value, in_pool: true })
            }
        };
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value.reset();
            entry.in_pool = false;
        }
        self.stats.acquired += 1;
        self.stats.peak_in_use = self.stats.peak_in_use.max(self.in_use());
        PoolHandle { pool: self.id, key }
    }

    /// Return an instance to the free list
    pub fn release(&mut self, handle: PoolHandle) -> Result<(), PoolError> {
        if handle.pool != self.id {
            return Err(PoolError::ForeignInstance);
        }
        let entry = self
            .entries
            .get_mut(handle.key)
            .ok_or(PoolError::UnknownHandle)?;
        if entry.in_pool {
            return Err(PoolError::DoubleRelease);
        }
        entry.value.on_release();
        entry.value.reset();
        entry.in_pool = true;
        self.free.push_back(handle.key);
        self.stats.released += 1;
        Ok(())
    }

    /// Borrow an acquired instance
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        if handle.pool != self.id {
            return None;
        }
        self.entries
            .get(handle.key)
            .filter(|entry| !entry.in_pool)
            .map(|entry| &entry.value)
    }

    /// Mutably borrow an acquired instance
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        if handle.pool != self.id {
            return None;
        }
        self.entries
            .get_mut(handle.key)
            .filter(|entry| !entry.in_pool)
            .map(|entry| &mut entry.value)
    }

    /// Total instances owned by the pool
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Instances waiting in the free list
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Instances currently acquired
    pub fn in_use(&self) -> usize {
        self.size() - self.available()
    }

    /// Usage counters
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drop every instance. Outstanding handles become unknown.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
    }
}

impl<T: Poolable + 'static> Service for ObjectPool<T> {
    fn shutdown(&mut self) {
        log::debug!("releasing object pool {:?} ({} instances)", self.id, self.size());
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Bullet {
        damage: u32,
        active: bool,
    }

    impl Poolable for Bullet {
        fn reset(&mut self) {
            self.damage = 1;
        }

        fn on_release(&mut self) {
            self.active = false;
        }
    }

    fn pool(capacity: usize) -> ObjectPool<Bullet> {
        ObjectPool::with_capacity(capacity, Bullet::default)
    }

    #[test]
    fn test_empty_pool_grows_on_demand() {
        let mut pool = pool(0);
        assert_eq!(pool.size(), 0);

        let handle = pool.acquire();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 0);

        pool.release(handle).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_release_of_acquire_restores_default() {
        let mut pool = pool(2);
        let handle = pool.acquire();
        {
            let bullet = pool.get_mut(handle).unwrap();
            bullet.damage = 40;
            bullet.active = true;
        }
        pool.release(handle).unwrap();
        assert_eq!(pool.size(), 2);

        let again = pool.acquire();
        let bullet = pool.get(again).unwrap();
        assert_eq!(bullet.damage, 1);
        assert!(!bullet.active);
    }

    #[test]
    fn test_double_release_rejected() {
        let mut pool = pool(1);
        let handle = pool.acquire();
        pool.release(handle).unwrap();
        assert_eq!(pool.release(handle), Err(PoolError::DoubleRelease));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_foreign_release_rejected() {
        let mut a = pool(1);
        let mut b = pool(1);
        let handle = a.acquire();
        assert_eq!(b.release(handle), Err(PoolError::ForeignInstance));
        assert!(b.get(handle).is_none());
    }

    #[test]
    fn test_released_instance_not_borrowable() {
        let mut pool = pool(0);
        let handle = pool.acquire();
        pool.release(handle).unwrap();
        assert!(pool.get(handle).is_none());
    }

    #[test]
    fn test_pool_never_shrinks() {
        let mut pool = pool(0);
        let handles: Vec<_> = (0..4).map(|_| pool.acquire()).collect();
        for handle in handles {
            pool.release(handle).unwrap();
        }
        assert_eq!(pool.size(), 4);
        let _ = pool.acquire();
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.stats().allocated, 4);
        assert_eq!(pool.stats().peak_in_use, 4);
    }

    #[test]
    fn test_shutdown_clears() {
        let mut pool = pool(3);
        Service::shutdown(&mut pool);
        assert_eq!(pool.size(), 0);
    }
}
