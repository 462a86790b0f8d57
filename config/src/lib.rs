#![no_std]

//! Constants used by the block cache

/// Number of buffer slots in the block cache
pub const NBUF: usize = 30;
/// Number of hash buckets the slots are sharded over
pub const BUCKET_NUM: usize = 13;
/// Size of one cached disk block in bytes
pub const BSIZE: usize = 1024;
/// Max number of blocks one file system operation may hold at once
pub const MAXOPBLOCKS: usize = 10;

const _: () = assert!(NBUF >= MAXOPBLOCKS);
const _: () = assert!(BUCKET_NUM > 0);
