//! Long-term lock for content that may be held across device I/O.
//!
//! Unlike [`spin::Mutex`] a waiter gives up the processor between attempts,
//! and the lock remembers which task holds it so callers can check
//! [`SleepLock::holding`].

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scheduler hooks the sleep lock needs from the kernel
#[crate_interface::def_interface]
pub trait SchedIf {
    /// Id of the running task, never 0
    fn current_tid() -> usize;
    /// Give up the processor
    fn yield_now();
}

const NO_HOLDER: usize = 0;

pub struct SleepLock<T: ?Sized> {
    name: &'static str,
    locked: AtomicBool,
    holder: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for SleepLock<T> {}
unsafe impl<T: ?Sized + Send> Send for SleepLock<T> {}

pub struct SleepLockGuard<'a, T: ?Sized> {
    lock: &'a SleepLock<T>,
}

impl<T> SleepLock<T> {
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            locked: AtomicBool::new(false),
            holder: AtomicUsize::new(NO_HOLDER),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SleepLock<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block until the lock is free, yielding while it is held elsewhere
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                crate_interface::call_interface!(SchedIf::yield_now());
            }
        }
        self.holder.store(crate_interface::call_interface!(SchedIf::current_tid()), Ordering::Relaxed);
        SleepLockGuard { lock: self }
    }

    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        self.holder.store(crate_interface::call_interface!(SchedIf::current_tid()), Ordering::Relaxed);
        Some(SleepLockGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Whether the running task is the one holding the lock
    pub fn holding(&self) -> bool {
        self.is_locked() && self.holder.load(Ordering::Relaxed) == crate_interface::call_interface!(SchedIf::current_tid())
    }
}

impl<T: ?Sized> Deref for SleepLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.holder.store(NO_HOLDER, Ordering::Relaxed);
        self.lock.locked.store(false, Ordering::Release);
    }
}
