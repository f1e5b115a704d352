use crate::block::HEADER_SIZE;
use crate::error::ErrorKind;
use crate::SENTINEL;
use log::error;

/// Index of one sector within the device, `0..sector_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per sector; one sector holds exactly one block.
    pub sector_size: usize,
    pub sector_count: u32,
    /// Sectors wiped by the smallest erase the device can perform.
    pub erase_granularity: u32,
    /// Byte value read back from erased memory.
    pub erased_value: u8,
}

impl Geometry {
    /// Bytes of record data a single block carries.
    pub fn payload_size(&self) -> usize {
        self.sector_size.saturating_sub(HEADER_SIZE)
    }

    pub(crate) fn validate(&self) -> Result<(), ErrorKind> {
        if self.sector_count < 2 {
            error!(
                "geometry needs an anchor and one log sector, got {} sectors",
                self.sector_count
            );
            return Err(ErrorKind::Fail);
        }
        // Room for the header plus the anchor sentinel and its terminator.
        if self.sector_size < HEADER_SIZE + SENTINEL.len() + 1 {
            error!("sector size {} too small for a block", self.sector_size);
            return Err(ErrorKind::Fail);
        }
        if self.erase_granularity != 1 {
            error!(
                "erase granularity of {} sectors unsupported",
                self.erase_granularity
            );
            return Err(ErrorKind::Fail);
        }
        Ok(())
    }
}

/// Sector addressed non-volatile memory.
///
/// Reads and writes always move one whole sector. Implementations report hard device errors as
/// `ErrorKind::Fail`; the log never retries.
pub trait Storage {
    fn open(&mut self) -> Result<(), ErrorKind>;
    fn read(&mut self, sector: SectorId, data: &mut [u8]) -> Result<(), ErrorKind>;
    fn write(&mut self, sector: SectorId, data: &[u8]) -> Result<(), ErrorKind>;
    fn erase(&mut self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind>;
    fn close(&mut self) -> Result<(), ErrorKind>;
    fn geometry(&self) -> Geometry;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn open(&mut self) -> Result<(), ErrorKind> {
        (**self).open()
    }

    fn read(&mut self, sector: SectorId, data: &mut [u8]) -> Result<(), ErrorKind> {
        (**self).read(sector, data)
    }

    fn write(&mut self, sector: SectorId, data: &[u8]) -> Result<(), ErrorKind> {
        (**self).write(sector, data)
    }

    fn erase(&mut self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind> {
        (**self).erase(sector, num_sectors)
    }

    fn close(&mut self) -> Result<(), ErrorKind> {
        (**self).close()
    }

    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }
}
