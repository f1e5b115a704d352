use crate::error::ErrorKind;
use crate::util::{crc16, BlockMagic, BLOCK_MAGIC};
use alloc::vec;
use alloc::vec::Vec;
use log::error;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone, Copy)]
#[repr(C)]
pub(crate) struct BlockHeader {
    magic: BlockMagic,
    counter: U32<LittleEndian>,
    crc: U16<LittleEndian>,
    reserved: U16<LittleEndian>,
    flags: U32<LittleEndian>,
}

pub(crate) const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

/// What a sector holds, as far as the log can tell from its bytes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Magic and CRC check out.
    Valid { counter: u32 },
    /// Every byte equals the erased value.
    Erased,
    Corrupt,
}

pub fn is_erased(sector: &[u8], erased_value: u8) -> bool {
    sector.iter().all(|b| *b == erased_value)
}

pub fn is_valid(sector: &[u8]) -> bool {
    valid_counter(sector).is_some()
}

fn valid_counter(sector: &[u8]) -> Option<u32> {
    let (header, payload) =
        LayoutVerified::<_, BlockHeader>::new_unaligned_from_prefix(sector)?;
    if header.magic == BLOCK_MAGIC && header.crc.get() == crc16(payload) {
        Some(header.counter.get())
    } else {
        None
    }
}

/// Classify one serialized sector. Validity wins over the erased check.
pub fn classify(sector: &[u8], erased_value: u8) -> BlockState {
    if let Some(counter) = valid_counter(sector) {
        BlockState::Valid { counter }
    } else if is_erased(sector, erased_value) {
        BlockState::Erased
    } else {
        BlockState::Corrupt
    }
}

/// One sector worth of bytes: header followed by payload.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    bytes: Vec<u8>,
}

impl Block {
    pub(crate) fn new(sector_size: usize) -> Self {
        Block {
            bytes: vec![0u8; sector_size],
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len() - HEADER_SIZE
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[HEADER_SIZE..]
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub(crate) fn state(&self, erased_value: u8) -> BlockState {
        classify(&self.bytes, erased_value)
    }

    /// Stamp magic, counter and the payload CRC into the header.
    pub(crate) fn seal(&mut self, counter: u32) -> Result<(), ErrorKind> {
        let (mut header, payload) =
            LayoutVerified::<_, BlockHeader>::new_unaligned_from_prefix(&mut self.bytes[..])
                .ok_or_else(|| {
                    error!("Block too small for header.");
                    ErrorKind::Fail
                })?;
        let crc = crc16(payload);
        header.magic = BLOCK_MAGIC;
        header.counter.set(counter);
        header.crc.set(crc);
        header.reserved.set(0);
        header.flags.set(0);
        Ok(())
    }
}

/// A block plus the byte cursor used by the write or read path.
#[derive(Debug, Clone)]
pub(crate) struct Buffer {
    pub(crate) block: Block,
    pub(crate) index: usize,
}

impl Buffer {
    pub(crate) fn new(sector_size: usize) -> Self {
        Buffer {
            block: Block::new(sector_size),
            index: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.block.clear();
        self.index = 0;
    }
}
