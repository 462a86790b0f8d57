use core::mem::{self, ManuallyDrop};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use config::BSIZE;
use log::Level;
use sync::{SleepLock, SleepLockGuard};

use crate::BufferCache;

const MODULE_LEVEL: Level = Level::Debug;

/// Raw content of one cached block
#[repr(C, align(8))]
pub struct BufData(pub [u8; BSIZE]);

/// Types that may be viewed in place inside a block.
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`, and
/// the type must not hold pointers or interior mutability.
pub unsafe trait OnDisk: Sized {}

unsafe impl OnDisk for u8 {}
unsafe impl OnDisk for u16 {}
unsafe impl OnDisk for u32 {}
unsafe impl OnDisk for u64 {}
unsafe impl OnDisk for i32 {}
unsafe impl OnDisk for i64 {}
unsafe impl<T: OnDisk, const N: usize> OnDisk for [T; N] {}

/// One cache entry.
///
/// Identity, reference and pin counts and release time are only changed
/// while holding the lock of the bucket the slot is currently linked into.
/// `data` guards the content bytes, and `valid` is set by its holder.
pub(crate) struct BufSlot {
    dev: AtomicU32,
    blockno: AtomicU32,
    assigned: AtomicBool,
    pub(crate) valid: AtomicBool,
    refcnt: AtomicU32,
    pins: AtomicU32,
    last_use: AtomicU64,
    pub(crate) data: SleepLock<BufData>,
}

impl BufSlot {
    pub fn new() -> Self {
        Self {
            dev: AtomicU32::new(0),
            blockno: AtomicU32::new(0),
            assigned: AtomicBool::new(false),
            valid: AtomicBool::new(false),
            refcnt: AtomicU32::new(0),
            pins: AtomicU32::new(0),
            last_use: AtomicU64::new(0),
            data: SleepLock::new(BufData([0; BSIZE]), "buffer"),
        }
    }

    pub fn matches(&self, dev: u32, blockno: u32) -> bool {
        self.assigned.load(Ordering::Relaxed)
            && self.dev.load(Ordering::Relaxed) == dev
            && self.blockno.load(Ordering::Relaxed) == blockno
    }

    /// `(dev, blockno)` if the slot ever held a block
    pub fn ident(&self) -> Option<(u32, u32)> {
        self.assigned.load(Ordering::Relaxed).then(|| {
            (
                self.dev.load(Ordering::Relaxed),
                self.blockno.load(Ordering::Relaxed),
            )
        })
    }

    /// Hand the slot to a new block. Content becomes stale.
    pub fn assign(&self, dev: u32, blockno: u32) {
        self.dev.store(dev, Ordering::Relaxed);
        self.blockno.store(blockno, Ordering::Relaxed);
        self.assigned.store(true, Ordering::Relaxed);
        self.valid.store(false, Ordering::Relaxed);
        self.refcnt.store(1, Ordering::Relaxed);
        self.pins.store(0, Ordering::Relaxed);
    }

    pub fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    pub fn last_use(&self) -> u64 {
        self.last_use.load(Ordering::Relaxed)
    }

    pub fn get(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pins(&self) -> u32 {
        self.pins.load(Ordering::Relaxed)
    }

    /// Drop one reference, stamping the release time when it was the last.
    /// `None` if there was no reference to drop.
    pub fn put(&self, now: u64) -> Option<u32> {
        let left = self.refcnt.load(Ordering::Relaxed).checked_sub(1)?;
        self.refcnt.store(left, Ordering::Relaxed);
        if left == 0 {
            self.last_use.store(now, Ordering::Relaxed);
        }
        Some(left)
    }

    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::Relaxed);
        self.get();
    }

    /// Undo one [`Self::pin`]. `None` if the slot holds no pin.
    pub fn unpin(&self, now: u64) -> Option<u32> {
        let left = self.pins.load(Ordering::Relaxed).checked_sub(1)?;
        self.pins.store(left, Ordering::Relaxed);
        self.put(now)
    }
}

/// A cached block whose content lock is held by the caller.
///
/// Dropping the handle releases it; [`BufferCache::release`] does the same
/// explicitly.
pub struct Buf<'a> {
    pub(crate) cache: &'a BufferCache,
    pub(crate) index: usize,
    pub(crate) guard: ManuallyDrop<SleepLockGuard<'a, BufData>>,
}

impl<'a> Buf<'a> {
    pub(crate) fn new(cache: &'a BufferCache, index: usize, guard: SleepLockGuard<'a, BufData>) -> Self {
        Self {
            cache,
            index,
            guard: ManuallyDrop::new(guard),
        }
    }

    pub(crate) fn slot_ref(&self) -> &'a BufSlot {
        &self.cache.slots[self.index]
    }

    pub fn dev(&self) -> u32 {
        self.slot_ref().dev.load(Ordering::Relaxed)
    }

    pub fn blockno(&self) -> u32 {
        self.slot_ref().blockno.load(Ordering::Relaxed)
    }

    /// Index of the underlying slot
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Whether the content was loaded from the device
    pub fn is_valid(&self) -> bool {
        self.slot_ref().valid.load(Ordering::Acquire)
    }

    pub fn data(&self) -> &[u8; BSIZE] {
        &self.guard.0
    }

    pub fn data_mut(&mut self) -> &mut [u8; BSIZE] {
        &mut self.guard.0
    }

    fn get_ref<T: OnDisk>(&self, offset: usize) -> &T {
        let type_size = mem::size_of::<T>();
        assert!(offset + type_size <= BSIZE);
        let addr = self.guard.0.as_ptr() as usize + offset;
        assert_eq!(addr % mem::align_of::<T>(), 0, "misaligned block access");
        unsafe { &*(addr as *const T) }
    }

    fn get_mut<T: OnDisk>(&mut self, offset: usize) -> &mut T {
        let type_size = mem::size_of::<T>();
        assert!(offset + type_size <= BSIZE);
        let addr = self.guard.0.as_mut_ptr() as usize + offset;
        assert_eq!(addr % mem::align_of::<T>(), 0, "misaligned block access");
        unsafe { &mut *(addr as *mut T) }
    }

    /// Run `f` on the `T` stored at `offset`
    pub fn read<T: OnDisk, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get_ref(offset))
    }

    /// Run `f` on the `T` stored at `offset`, allowing it to change.
    /// The change reaches the device only through [`BufferCache::write`].
    pub fn modify<T: OnDisk, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }
}

impl Drop for Buf<'_> {
    fn drop(&mut self) {
        let slot = self.slot_ref();
        if !slot.data.holding() {
            log_error!("brelse: slot {} released by a non-holder", self.index);
            panic!("brelse");
        }
        // SAFETY: the guard is never touched again after this point
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.cache.put(self.index);
    }
}

/// A pin on a cached block, taken with [`BufferCache::pin`].
///
/// The slot keeps its block and cannot be evicted until the pin is passed to
/// [`BufferCache::unpin`] or dropped. Unpinning takes only the slot's bucket
/// lock, never the content lock.
#[must_use = "dropping a pin unpins the block"]
pub struct Pinned<'a> {
    pub(crate) cache: &'a BufferCache,
    pub(crate) index: usize,
}

impl Pinned<'_> {
    /// Index of the pinned slot
    pub fn slot(&self) -> usize {
        self.index
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        self.cache.unpin_slot(self.index);
    }
}
