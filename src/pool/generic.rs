//! Generic multimap object pool (C2).
//!
//! A `Pool<K, V>` caches device objects of type `V` keyed by a descriptor `K`. Several entries
//! can share the same key (a multimap, not a map) because a frame can legitimately need two
//! distinct live objects of identical shape at once (e.g. two same-sized transient textures
//! used by two passes running concurrently); `get` only hands back an entry that is not
//! currently checked out.
//!
//! `get` returns a [`Slot`] rather than a direct reference: the executor checks resources out
//! well before it is done with them (at devirtualization time) and needs to look them up again
//! much later (when binding them for a draw), by which point it may need a fresh, independent
//! borrow of the pool for an unrelated key. An index-based slot sidesteps that without any
//! unsafe aliasing — `resolve`/`resolve_mut` take it back to a reference on demand.
//!
//! Two independent policy flags, matching the profile table in the design (§4.2):
//! - `never_release`: entries are kept forever once created and never evicted by idle-frame
//!   trimming (used for render passes and pipeline state objects, which are cheap to keep and
//!   expensive to recreate).
//! - `destroy_out_of_date`: when set, an entry whose descriptor no longer matches anything
//!   requested this frame is destroyed immediately at `new_frame` rather than being kept
//!   around for `max_idle_frames` (used for framebuffers, which pin a specific, often
//!   short-lived, combination of attachments).

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::RenderGraphError;
use crate::hash::{ByteKey, DescriptorKey};

struct Entry<V> {
    value: V,
    checked_out: bool,
    idle_frames: u32,
}

/// How long an otherwise-unused entry survives before the pool reclaims it (spec §4.2).
pub const DEFAULT_MAX_IDLE_FRAMES: u32 = 4;

/// A handle to one entry checked out of a [`Pool`], valid until that pool's next `new_frame`.
pub struct Slot<K: DescriptorKey> {
    key: ByteKey<K>,
    index: usize,
    _marker: PhantomData<K>,
}

// `Slot` only ever needs to be moved around, not compared or hashed; manual impls so `K`
// itself need not be `Copy`/`Clone` for the slot to be.
impl<K: DescriptorKey> Clone for Slot<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K: DescriptorKey> Copy for Slot<K> {}

pub struct Pool<K: DescriptorKey, V> {
    entries: HashMap<ByteKey<K>, Vec<Entry<V>>>,
    never_release: bool,
    destroy_out_of_date: bool,
    max_idle_frames: u32,
    requested_this_frame: std::collections::HashSet<ByteKey<K>>,
}

impl<K: DescriptorKey, V> Pool<K, V> {
    pub fn new(never_release: bool, destroy_out_of_date: bool) -> Self {
        Pool {
            entries: HashMap::new(),
            never_release,
            destroy_out_of_date,
            max_idle_frames: DEFAULT_MAX_IDLE_FRAMES,
            requested_this_frame: std::collections::HashSet::new(),
        }
    }

    pub fn with_max_idle_frames(mut self, frames: u32) -> Self {
        self.max_idle_frames = frames;
        self
    }

    /// Check out an entry matching `key`, creating one with `create` if every existing entry
    /// for this key is already checked out (or none exist).
    pub fn get(
        &mut self,
        key: K,
        create: impl FnOnce(&K) -> Result<V, RenderGraphError>,
    ) -> Result<Slot<K>, RenderGraphError> {
        let byte_key = ByteKey(key);
        self.requested_this_frame.insert(byte_key);

        let bucket = self.entries.entry(byte_key).or_insert_with(Vec::new);
        if let Some(index) = bucket.iter().position(|e| !e.checked_out) {
            let entry = &mut bucket[index];
            entry.checked_out = true;
            entry.idle_frames = 0;
            return Ok(Slot {
                key: byte_key,
                index,
                _marker: PhantomData,
            });
        }

        let value = create(&key)?;
        bucket.push(Entry {
            value,
            checked_out: true,
            idle_frames: 0,
        });
        Ok(Slot {
            key: byte_key,
            index: bucket.len() - 1,
            _marker: PhantomData,
        })
    }

    pub fn resolve(&self, slot: Slot<K>) -> &V {
        &self.entries[&slot.key][slot.index].value
    }

    pub fn resolve_mut(&mut self, slot: Slot<K>) -> &mut V {
        &mut self.entries.get_mut(&slot.key).unwrap()[slot.index].value
    }

    /// Release every entry checked out this frame back into the free list and age/evict idle
    /// entries. Called once per frame after the executor has finished using pooled objects.
    /// Invalidates every [`Slot`] handed out since the last call.
    pub fn new_frame(&mut self) {
        let destroy_out_of_date = self.destroy_out_of_date;
        let never_release = self.never_release;
        let max_idle_frames = self.max_idle_frames;
        let requested = std::mem::take(&mut self.requested_this_frame);

        self.entries.retain(|key, bucket| {
            for entry in bucket.iter_mut() {
                entry.checked_out = false;
            }

            if destroy_out_of_date && !requested.contains(key) {
                return false;
            }

            if !never_release {
                for entry in bucket.iter_mut() {
                    entry.idle_frames += 1;
                }
                bucket.retain(|e| e.idle_frames <= max_idle_frames);
            }

            !bucket.is_empty()
        });
    }

    /// Drop every entry unconditionally, e.g. on device loss or shutdown.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.requested_this_frame.clear();
    }

    pub fn live_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Copy, Clone, Eq, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Key {
        a: u32,
        b: u32,
    }

    #[test]
    fn reuses_released_entry() {
        let mut pool: Pool<Key, u32> = Pool::new(false, false);
        let key = Key { a: 1, b: 2 };

        let mut calls = 0;
        let slot = pool
            .get(key, |_| {
                calls += 1;
                Ok(42)
            })
            .unwrap();
        assert_eq!(*pool.resolve(slot), 42);
        pool.new_frame();

        let slot = pool
            .get(key, |_| {
                calls += 1;
                Ok(99)
            })
            .unwrap();
        assert_eq!(*pool.resolve(slot), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn distinct_concurrent_requests_create_separate_entries() {
        let mut pool: Pool<Key, u32> = Pool::new(false, false);
        let key = Key { a: 1, b: 2 };

        let a = pool.get(key, |_| Ok(1)).unwrap();
        let b = pool.get(key, |_| Ok(2)).unwrap();
        assert_eq!(*pool.resolve(a), 1);
        assert_eq!(*pool.resolve(b), 2);
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn evicts_after_max_idle_frames() {
        let mut pool: Pool<Key, u32> = Pool::new(false, false).with_max_idle_frames(2);
        let key = Key { a: 1, b: 2 };
        pool.get(key, |_| Ok(1)).unwrap();
        pool.new_frame(); // idle_frames -> 1
        pool.new_frame(); // idle_frames -> 2, still kept (<=)
        assert_eq!(pool.live_count(), 1);
        pool.new_frame(); // idle_frames -> 3, evicted
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn never_release_keeps_entries_forever() {
        let mut pool: Pool<Key, u32> = Pool::new(true, false).with_max_idle_frames(0);
        let key = Key { a: 1, b: 2 };
        pool.get(key, |_| Ok(1)).unwrap();
        for _ in 0..10 {
            pool.new_frame();
        }
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn destroy_out_of_date_drops_unrequested_keys_immediately() {
        let mut pool: Pool<Key, u32> = Pool::new(false, true);
        let key = Key { a: 1, b: 2 };
        pool.get(key, |_| Ok(1)).unwrap();
        pool.new_frame();
        assert_eq!(pool.live_count(), 0);
    }
}
