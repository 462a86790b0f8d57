#![cfg_attr(not(test), no_std)]

mod sleeplock;
pub use sleeplock::{SchedIf, SleepLock, SleepLockGuard};
pub use spin::{Mutex, MutexGuard};
