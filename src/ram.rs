use crate::error::ErrorKind;
use crate::storage::{Geometry, SectorId, Storage};
use alloc::vec;
use alloc::vec::Vec;
use log::{error, trace};

/// Volatile storage held in memory.
///
/// With an erased value of 0xFF programming behaves like NOR flash: a write can only clear bits,
/// so a sector that was not erased first ends up holding the AND of old and new contents.
pub struct RamStorage {
    data: Vec<u8>,
    geometry: Geometry,
    erases: Vec<u32>,
}

impl RamStorage {
    pub fn new(sector_size: usize, sector_count: u32) -> Self {
        Self::with_erased_value(sector_size, sector_count, 0xFF)
    }

    pub fn with_erased_value(sector_size: usize, sector_count: u32, erased_value: u8) -> Self {
        RamStorage {
            data: vec![erased_value; sector_size * sector_count as usize],
            geometry: Geometry {
                sector_size,
                sector_count,
                erase_granularity: 1,
                erased_value,
            },
            erases: vec![0; sector_count as usize],
        }
    }

    pub fn sector(&self, sector: u32) -> &[u8] {
        let start = sector as usize * self.geometry.sector_size;
        &self.data[start..start + self.geometry.sector_size]
    }

    pub fn sector_mut(&mut self, sector: u32) -> &mut [u8] {
        let start = sector as usize * self.geometry.sector_size;
        &mut self.data[start..start + self.geometry.sector_size]
    }

    /// Number of times `sector` has been erased.
    pub fn erase_count(&self, sector: u32) -> u32 {
        self.erases[sector as usize]
    }

    fn check_range(&self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind> {
        let end = sector.0 as u64 + num_sectors as u64;
        if end > self.geometry.sector_count as u64 {
            error!(
                "sectors {}..{} out of range of {}",
                sector.0, end, self.geometry.sector_count
            );
            return Err(ErrorKind::Fail);
        }
        Ok(())
    }
}

impl Storage for RamStorage {
    fn open(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }

    fn read(&mut self, sector: SectorId, data: &mut [u8]) -> Result<(), ErrorKind> {
        self.check_range(sector, 1)?;
        let num_bytes = core::cmp::min(data.len(), self.geometry.sector_size);
        data[..num_bytes].copy_from_slice(&self.sector(sector.0)[..num_bytes]);
        trace!("ram rd sector: {}", sector.0);
        Ok(())
    }

    fn write(&mut self, sector: SectorId, data: &[u8]) -> Result<(), ErrorKind> {
        self.check_range(sector, 1)?;
        let nor = self.geometry.erased_value == 0xFF;
        let num_bytes = core::cmp::min(data.len(), self.geometry.sector_size);
        let dst = self.sector_mut(sector.0);
        for (d, s) in dst[..num_bytes].iter_mut().zip(data) {
            *d = if nor { *d & *s } else { *s };
        }
        trace!("ram wr sector: {}", sector.0);
        Ok(())
    }

    fn erase(&mut self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind> {
        self.check_range(sector, num_sectors)?;
        for i in sector.0..sector.0 + num_sectors {
            let erased_value = self.geometry.erased_value;
            self.sector_mut(i).fill(erased_value);
            self.erases[i as usize] += 1;
        }
        trace!("ram erase sectors: {}..{}", sector.0, sector.0 + num_sectors);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn starts_erased() {
        let ram = RamStorage::new(32, 4);
        assert!(ram.sector(3).iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn write_without_erase_clears_bits_only() {
        let mut ram = RamStorage::new(4, 2);
        ram.write(SectorId(1), &[0xF0, 0x0F, 0xFF, 0x00]).unwrap();
        ram.write(SectorId(1), &[0x3C, 0x3C, 0x3C, 0x3C]).unwrap();
        assert_eq!(ram.sector(1), &[0x30, 0x0C, 0x3C, 0x00]);
        ram.erase(SectorId(1), 1).unwrap();
        ram.write(SectorId(1), &[0x3C, 0x3C, 0x3C, 0x3C]).unwrap();
        assert_eq!(ram.sector(1), &[0x3C; 4]);
        assert_eq!(ram.erase_count(1), 1);
        assert_eq!(ram.erase_count(0), 0);
    }

    #[test]
    fn zero_erased_value_overwrites() {
        let mut ram = RamStorage::with_erased_value(2, 2, 0x00);
        ram.write(SectorId(0), &[0xAA, 0x55]).unwrap();
        ram.write(SectorId(0), &[0x01, 0x02]).unwrap();
        assert_eq!(ram.sector(0), &[0x01, 0x02]);
    }

    #[test]
    fn out_of_range_fails() {
        let mut ram = RamStorage::new(8, 4);
        let mut data = [0u8; 8];
        assert_eq!(ram.read(SectorId(4), &mut data), Err(ErrorKind::Fail));
        assert_eq!(ram.write(SectorId(9), &data), Err(ErrorKind::Fail));
        assert_eq!(ram.erase(SectorId(2), 3), Err(ErrorKind::Fail));
        assert_eq!(ram.erase(SectorId(0), 4), Ok(()));
    }
}
