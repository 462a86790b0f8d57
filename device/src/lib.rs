#![cfg_attr(not(test), no_std)]
extern crate alloc;
pub mod block_dev;
mod ram_disk;

pub use block_dev::{BlockDevice, DeviceError};
pub use ram_disk::RamDisk;
