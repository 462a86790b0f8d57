//! Buffer cache.
//!
//! Keeps in-memory copies of disk blocks so repeated access skips the
//! device, and is the synchronization point for a block used by several
//! tasks at once.
//!
//! * To get a buffer for a block, call [`BufferCache::read`].
//! * After changing its data, call [`BufferCache::write`] to write it through.
//! * When done, call [`BufferCache::release`] or drop the [`Buf`].
//! * To keep a block cached across release and relock, hold a [`Pinned`]
//!   from [`BufferCache::pin`].
//! * Only one task at a time can hold a buffer, so do not keep it longer
//!   than necessary.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

#[macro_use]
extern crate logger;

mod bcache;
mod bucket;
mod buf;
mod stats;

pub use bcache::{BufferCache, CacheConfig};
pub use buf::{Buf, BufData, OnDisk, Pinned};
pub use config::BSIZE;
pub use device::{BlockDevice, DeviceError};
pub use stats::CacheStats;

#[cfg(test)]
mod test_support;
