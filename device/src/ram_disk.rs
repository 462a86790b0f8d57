use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};
use config::BSIZE;
use spin::Mutex;

use crate::{BlockDevice, DeviceError};

/// Memory-backed block device.
///
/// Holds any number of device ids, each `nblocks` long. Blocks never written
/// read back as zeroes.
pub struct RamDisk {
    nblocks: u32,
    devs: Vec<u32>,
    blocks: Mutex<BTreeMap<(u32, u32), Box<[u8; BSIZE]>>>,
}

impl RamDisk {
    ///
    pub fn new(devs: &[u32], nblocks: u32) -> Self {
        Self {
            nblocks,
            devs: devs.to_vec(),
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    fn check(&self, dev: u32, block_id: u32) -> Result<(), DeviceError> {
        if !self.devs.contains(&dev) {
            return Err(DeviceError::NoSuchDevice(dev));
        }
        if block_id >= self.nblocks {
            return Err(DeviceError::OutOfRange { dev, block_id });
        }
        Ok(())
    }

    /// Copy of a block's current content, bypassing any cache
    pub fn snapshot(&self, dev: u32, block_id: u32) -> [u8; BSIZE] {
        match self.blocks.lock().get(&(dev, block_id)) {
            Some(block) => **block,
            None => [0; BSIZE],
        }
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, dev: u32, block_id: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.check(dev, block_id)?;
        match self.blocks.lock().get(&(dev, block_id)) {
            Some(block) => buf.copy_from_slice(&block[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&self, dev: u32, block_id: u32, buf: &[u8]) -> Result<(), DeviceError> {
        self.check(dev, block_id)?;
        let mut block = Box::new([0u8; BSIZE]);
        block.copy_from_slice(buf);
        self.blocks.lock().insert((dev, block_id), block);
        Ok(())
    }
}
