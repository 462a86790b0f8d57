use core::any::Any;
use core::fmt;

/// Failure reported by a block device transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The device does not exist
    NoSuchDevice(u32),
    /// Block number past the end of the device
    OutOfRange { dev: u32, block_id: u32 },
    /// The transfer itself failed
    Io { dev: u32, block_id: u32 },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoSuchDevice(dev) => write!(f, "no such device {}", dev),
            DeviceError::OutOfRange { dev, block_id } => {
                write!(f, "block {} out of range on device {}", block_id, dev)
            }
            DeviceError::Io { dev, block_id } => {
                write!(f, "i/o error on device {} block {}", dev, block_id)
            }
        }
    }
}

/// Synchronous block transfer used by the buffer cache.
///
/// `buf` is always exactly one block long.
pub trait BlockDevice: Send + Sync + Any {
    ///Read a block from the device into `buf`
    fn read_block(&self, dev: u32, block_id: u32, buf: &mut [u8]) -> Result<(), DeviceError>;
    ///Write `buf` to a block on the device
    fn write_block(&self, dev: u32, block_id: u32, buf: &[u8]) -> Result<(), DeviceError>;
}
