#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use buffer::{BlockDevice, BufferCache, CacheConfig, DeviceError};
use crate_interface::impl_interface;
use device::RamDisk;
use log::{LevelFilter, Record};
use logger::LogIf;
use sync::SchedIf;
use time::Ticks;

static NEXT_TID: AtomicUsize = AtomicUsize::new(1);
std::thread_local! {
    static TID: usize = NEXT_TID.fetch_add(1, Ordering::Relaxed);
}

struct SchedIfImpl;

#[impl_interface]
impl SchedIf for SchedIfImpl {
    fn current_tid() -> usize {
        TID.with(|tid| *tid)
    }
    fn yield_now() {
        std::thread::yield_now();
    }
}

struct LogIfImpl;

#[impl_interface]
impl LogIf for LogIfImpl {
    fn print_log(record: &Record) {
        println!("{}: {}", record.level(), record.args());
    }
}

/// RAM disk with slow, counted reads
pub struct SlowDisk {
    pub inner: RamDisk,
    delay: Duration,
    reads: AtomicUsize,
}

impl SlowDisk {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: RamDisk::new(&[0, 1], 4096),
            delay,
            reads: AtomicUsize::new(0),
        }
    }
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BlockDevice for SlowDisk {
    fn read_block(&self, dev: u32, block_id: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        std::thread::sleep(self.delay);
        self.inner.read_block(dev, block_id, buf)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_block(&self, dev: u32, block_id: u32, buf: &[u8]) -> Result<(), DeviceError> {
        self.inner.write_block(dev, block_id, buf)
    }
}

pub fn setup(nbuf: usize, nbucket: usize, delay: Duration) -> (BufferCache, Arc<SlowDisk>, &'static Ticks) {
    static LOG: Once = Once::new();
    LOG.call_once(|| {
        let _ = logger::init_logger(LevelFilter::Info);
    });
    let disk = Arc::new(SlowDisk::new(delay));
    let ticks: &'static Ticks = Box::leak(Box::new(Ticks::new()));
    let bc = BufferCache::with_ticks(CacheConfig { nbuf, nbucket }, disk.clone(), ticks);
    (bc, disk, ticks)
}
