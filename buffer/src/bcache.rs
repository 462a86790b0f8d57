use alloc::{boxed::Box, collections::BTreeSet, sync::Arc, vec::Vec};
use core::ptr;
use core::sync::atomic::Ordering;

use config::{BUCKET_NUM, NBUF};
use device::{BlockDevice, DeviceError};
use log::Level;
use sync::{Mutex, MutexGuard};
use time::{Ticks, TICKS};

use crate::bucket::{bucket_key, Bucket, Node};
use crate::buf::{Buf, BufSlot, Pinned};
use crate::stats::{CacheStats, Stats};

const MODULE_LEVEL: Level = Level::Debug;

/// Geometry of a [`BufferCache`], fixed once the cache is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of buffer slots
    pub nbuf: usize,
    /// Number of hash buckets
    pub nbucket: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nbuf: NBUF,
            nbucket: BUCKET_NUM,
        }
    }
}

/// Fixed set of buffer slots sharded over hash buckets.
///
/// A hit takes only the lock of the block's bucket. A miss additionally
/// takes `lock` for its whole resolution, so at most one task is ever
/// looking for a victim. Whenever more than one bucket lock is held they
/// were taken in ascending bucket order.
pub struct BufferCache {
    lock: Mutex<()>,
    buckets: Box<[Mutex<Bucket>]>,
    pub(crate) slots: Box<[BufSlot]>,
    nodes: Box<[Node]>,
    device: Arc<dyn BlockDevice>,
    ticks: &'static Ticks,
    stats: Stats,
    /// Runs once between letting go of a victim's bucket and relocking it
    #[cfg(test)]
    relock_hook: Mutex<Option<Box<dyn FnOnce(&BufferCache) + Send>>>,
}

/// Least recently released unreferenced slot, with its bucket still locked
struct Victim<'a> {
    slot: usize,
    bucket: usize,
    last_use: u64,
    guard: MutexGuard<'a, Bucket>,
}

impl BufferCache {
    /// Cache over `device` whose release times come from the kernel's [`TICKS`]
    pub fn new(config: CacheConfig, device: Arc<dyn BlockDevice>) -> Self {
        Self::with_ticks(config, device, &TICKS)
    }

    pub fn with_ticks(config: CacheConfig, device: Arc<dyn BlockDevice>, ticks: &'static Ticks) -> Self {
        assert!(config.nbuf > 0, "buffer cache needs at least one slot");
        assert!(config.nbucket > 0, "buffer cache needs at least one bucket");
        let slots: Box<[BufSlot]> = (0..config.nbuf).map(|_| BufSlot::new()).collect();
        let nodes: Box<[Node]> = (0..config.nbuf).map(|_| Node::new()).collect();
        // unassigned slots all start out in bucket 0
        let mut first = Bucket::new();
        for i in 0..config.nbuf {
            first.push_back(&nodes, i);
        }
        let mut first = Some(first);
        let buckets: Box<[Mutex<Bucket>]> = (0..config.nbucket)
            .map(|_| Mutex::new(first.take().unwrap_or_default()))
            .collect();
        Self {
            lock: Mutex::new(()),
            buckets,
            slots,
            nodes,
            device,
            ticks,
            stats: Stats::default(),
            #[cfg(test)]
            relock_hook: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn key(&self, dev: u32, blockno: u32) -> usize {
        bucket_key(dev, blockno, self.buckets.len())
    }

    /// Bucket a slot is linked into. Stable while the slot is referenced.
    fn slot_key(&self, i: usize) -> usize {
        match self.slots[i].ident() {
            Some((dev, blockno)) => self.key(dev, blockno),
            None => 0,
        }
    }

    fn find(&self, bucket: &Bucket, dev: u32, blockno: u32) -> Option<usize> {
        bucket
            .iter(&self.nodes)
            .find(|&i| self.slots[i].matches(dev, blockno))
    }

    fn lock_slot(&self, i: usize) -> Buf<'_> {
        Buf::new(self, i, self.slots[i].data.lock())
    }

    /// Look through the cache for block `blockno` on device `dev`.
    /// If not found, recycle the least recently released free slot.
    /// Either way the returned buffer is locked.
    fn bget(&self, dev: u32, blockno: u32) -> Buf<'_> {
        let key = self.key(dev, blockno);
        let bucket = self.buckets[key].lock();
        if let Some(i) = self.find(&bucket, dev, blockno) {
            self.slots[i].get();
            drop(bucket);
            self.stats.hit();
            return self.lock_slot(i);
        }
        drop(bucket);

        let global = self.lock.lock();
        // another miss may have brought the block in while we waited
        let bucket = self.buckets[key].lock();
        if let Some(i) = self.find(&bucket, dev, blockno) {
            self.slots[i].get();
            drop(bucket);
            drop(global);
            self.stats.hit();
            return self.lock_slot(i);
        }
        drop(bucket);

        self.stats.miss();
        log_trace!("miss ({}, {})", dev, blockno);
        let i = self.recycle(key, dev, blockno);
        drop(global);
        self.lock_slot(i)
    }

    /// Scan every bucket in order for the unreferenced slot with the oldest
    /// release time. Ties go to the earlier bucket, then the earlier position.
    ///
    /// At most two bucket locks are held at once: the current winner's and
    /// the one being scanned, which always has the larger index.
    fn find_victim(&self) -> Option<Victim<'_>> {
        let mut best: Option<Victim<'_>> = None;
        for (b, bucket) in self.buckets.iter().enumerate() {
            let guard = bucket.lock();
            let mut min = best.as_ref().map(|v| v.last_use);
            let mut found = None;
            for i in guard.iter(&self.nodes) {
                let slot = &self.slots[i];
                if slot.refcnt() == 0 && min.map_or(true, |m| slot.last_use() < m) {
                    min = Some(slot.last_use());
                    found = Some(i);
                }
            }
            if let (Some(slot), Some(last_use)) = (found, min) {
                // replacing the winner unlocks its bucket
                best = Some(Victim {
                    slot,
                    bucket: b,
                    last_use,
                    guard,
                });
            }
        }
        best
    }

    /// Take a slot for `(dev, blockno)` and link it into bucket `key`.
    /// Caller holds the global lock.
    fn recycle(&self, key: usize, dev: u32, blockno: u32) -> usize {
        loop {
            let Some(victim) = self.find_victim() else {
                log_error!("bget: every buffer is in use, dev {} block {}", dev, blockno);
                panic!("bget: no buffers");
            };
            let Victim {
                slot: i,
                bucket: from,
                last_use,
                guard,
            } = victim;

            if from == key {
                self.reuse(i, dev, blockno);
                drop(guard);
                return i;
            }

            let (mut src, mut dst) = if from < key {
                let dst = self.buckets[key].lock();
                (guard, dst)
            } else {
                // the target bucket sorts first: let go of the winner and
                // take both again in order
                drop(guard);
                #[cfg(test)]
                self.run_relock_hook();
                let dst = self.buckets[key].lock();
                let src = self.buckets[from].lock();
                let slot = &self.slots[i];
                if slot.refcnt() != 0 || slot.last_use() != last_use {
                    log_trace!("slot {} was used while relocking, rescanning", i);
                    continue;
                }
                (src, dst)
            };
            src.remove(&self.nodes, i);
            dst.push_back(&self.nodes, i);
            log_trace!("slot {} moves from bucket {} to {}", i, from, key);
            self.reuse(i, dev, blockno);
            drop(src);
            drop(dst);
            return i;
        }
    }

    /// Overwrite a victim's identity. Caller holds its bucket lock(s).
    fn reuse(&self, i: usize, dev: u32, blockno: u32) {
        let slot = &self.slots[i];
        if let Some((old_dev, old_blockno)) = slot.ident() {
            self.stats.eviction();
            log_debug!(
                "evict slot {}: ({}, {}) -> ({}, {})",
                i,
                old_dev,
                old_blockno,
                dev,
                blockno
            );
        }
        slot.assign(dev, blockno);
    }

    /// Locked buffer for `(dev, blockno)`, content not necessarily loaded
    pub fn acquire(&self, dev: u32, blockno: u32) -> Buf<'_> {
        self.bget(dev, blockno)
    }

    /// Locked buffer holding the content of the indicated block.
    ///
    /// A failed device read releases the buffer and returns the error.
    pub fn read(&self, dev: u32, blockno: u32) -> Result<Buf<'_>, DeviceError> {
        let mut b = self.bget(dev, blockno);
        if !b.is_valid() {
            self.device.read_block(dev, blockno, b.data_mut())?;
            b.slot_ref().valid.store(true, Ordering::Release);
            self.stats.fill();
            log_trace!("filled slot {} from ({}, {})", b.slot(), dev, blockno);
        }
        Ok(b)
    }

    /// Write `b`'s content to the device. The caller must hold `b`.
    pub fn write(&self, b: &Buf<'_>) -> Result<(), DeviceError> {
        if !b.slot_ref().data.holding() {
            log_error!("bwrite: slot {} written by a non-holder", b.slot());
            panic!("bwrite");
        }
        self.device.write_block(b.dev(), b.blockno(), b.data())?;
        self.stats.write();
        Ok(())
    }

    /// Release a locked buffer. The caller must hold `b`.
    pub fn release(&self, b: Buf<'_>) {
        assert!(ptr::eq(b.cache, self), "brelse: buffer of another cache");
        drop(b);
    }

    /// Drop the content lock's reference to slot `i`
    pub(crate) fn put(&self, i: usize) {
        let bucket = self.buckets[self.slot_key(i)].lock();
        let left = self.slots[i].put(self.ticks.now());
        drop(bucket);
        if left.is_none() {
            log_error!("brelse: slot {} has no reference to drop", i);
            panic!("brelse");
        }
    }

    /// Keep `b`'s slot cached after it is released, until the returned pin
    /// is unpinned or dropped
    pub fn pin(&self, b: &Buf<'_>) -> Pinned<'_> {
        assert!(ptr::eq(b.cache, self), "bpin: buffer of another cache");
        let i = b.slot();
        let bucket = self.buckets[self.slot_key(i)].lock();
        self.slots[i].pin();
        drop(bucket);
        Pinned { cache: self, index: i }
    }

    /// Give up a pin. Does not need the content lock.
    pub fn unpin(&self, p: Pinned<'_>) {
        assert!(ptr::eq(p.cache, self), "bunpin: pin of another cache");
        drop(p);
    }

    pub(crate) fn unpin_slot(&self, i: usize) {
        let bucket = self.buckets[self.slot_key(i)].lock();
        let left = self.slots[i].unpin(self.ticks.now());
        drop(bucket);
        if left.is_none() {
            log_error!("bunpin: slot {} is not pinned", i);
            panic!("bunpin");
        }
    }

    /// Whether `(dev, blockno)` currently occupies a slot
    pub fn is_cached(&self, dev: u32, blockno: u32) -> bool {
        let bucket = self.buckets[self.key(dev, blockno)].lock();
        self.find(&bucket, dev, blockno).is_some()
    }

    /// Reference count of the slot holding `(dev, blockno)`, if cached
    pub fn refcnt(&self, dev: u32, blockno: u32) -> Option<u32> {
        let bucket = self.buckets[self.key(dev, blockno)].lock();
        self.find(&bucket, dev, blockno)
            .map(|i| self.slots[i].refcnt())
    }

    /// Pins currently held on `(dev, blockno)`, if cached
    pub fn pins(&self, dev: u32, blockno: u32) -> Option<u32> {
        let bucket = self.buckets[self.key(dev, blockno)].lock();
        self.find(&bucket, dev, blockno)
            .map(|i| self.slots[i].pins())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    #[cfg(test)]
    fn run_relock_hook(&self) {
        let hook = self.relock_hook.lock().take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    /// Panic unless every slot is linked into exactly the bucket its
    /// identity hashes to and no identity is cached twice.
    pub fn check_invariants(&self) {
        let _global = self.lock.lock();
        let guards: Vec<_> = self.buckets.iter().map(|b| b.lock()).collect();
        let mut seen = BTreeSet::new();
        let mut linked = 0;
        for (key, bucket) in guards.iter().enumerate() {
            let mut len = 0;
            for i in bucket.iter(&self.nodes) {
                len += 1;
                assert!(self.slots[i].pins() <= self.slots[i].refcnt(), "slot {} pinned without a reference", i);
                match self.slots[i].ident() {
                    Some((dev, blockno)) => {
                        assert_eq!(self.key(dev, blockno), key, "slot {} in wrong bucket", i);
                        assert!(seen.insert((dev, blockno)), "({}, {}) cached twice", dev, blockno);
                    }
                    None => assert_eq!(key, 0, "unassigned slot {} outside bucket 0", i),
                }
            }
            assert_eq!(len, bucket.len());
            linked += len;
        }
        assert_eq!(linked, self.slots.len(), "slot lost from the bucket lists");
    }
}
