use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use crate_interface::impl_interface;
use device::{BlockDevice, DeviceError, RamDisk};
use log::{LevelFilter, Record};
use logger::LogIf;
use sync::SchedIf;
use time::Ticks;

use crate::{BufferCache, CacheConfig};

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

/// RAM disk that counts successful transfers and can fail on demand
pub struct CountingDisk {
    inner: RamDisk,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_read: AtomicBool,
}

impl CountingDisk {
    pub fn new(devs: &[u32], nblocks: u32) -> Self {
        Self {
            inner: RamDisk::new(devs, nblocks),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_read: AtomicBool::new(false),
        }
    }
    pub fn inner(&self) -> &RamDisk {
        &self.inner
    }
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
    pub fn fail_next_read(&self) {
        self.fail_read.store(true, Ordering::SeqCst);
    }
}

impl BlockDevice for CountingDisk {
    fn read_block(&self, dev: u32, block_id: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        if self.fail_read.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Io { dev, block_id });
        }
        self.inner.read_block(dev, block_id, buf)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_block(&self, dev: u32, block_id: u32, buf: &[u8]) -> Result<(), DeviceError> {
        self.inner.write_block(dev, block_id, buf)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn ticks() -> &'static Ticks {
    Box::leak(Box::new(Ticks::new()))
}

pub fn cache(nbuf: usize, nbucket: usize) -> (BufferCache, Arc<CountingDisk>) {
    static LOG: Once = Once::new();
    LOG.call_once(|| {
        let _ = logger::init_logger(LevelFilter::Debug);
    });
    let disk = Arc::new(CountingDisk::new(&[0, 1, 2], 1024));
    let bc = BufferCache::with_ticks(CacheConfig { nbuf, nbucket }, disk.clone(), ticks());
    (bc, disk)
}
