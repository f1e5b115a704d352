use crate::error::ErrorKind;
use crate::storage::{Geometry, SectorId, Storage};
use log::{error, info, trace};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Storage backed by a flash image on the host file system.
///
/// Sectors are written through to the file on every call, so dropping the log without closing it
/// leaves the image exactly as a power cut would leave real flash.
pub struct FileStorage {
    path: PathBuf,
    file: Option<File>,
    geometry: Geometry,
}

fn io_fail(what: &str, path: &Path, err: std::io::Error) -> ErrorKind {
    error!("{} {} failed: {}", what, path.display(), err);
    ErrorKind::Fail
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>, sector_size: usize, sector_count: u32) -> Self {
        FileStorage {
            path: path.as_ref().to_path_buf(),
            file: None,
            geometry: Geometry {
                sector_size,
                sector_count,
                erase_granularity: 1,
                erased_value: 0xFF,
            },
        }
    }

    fn image_len(&self) -> u64 {
        self.geometry.sector_size as u64 * self.geometry.sector_count as u64
    }

    fn seek_to(&mut self, sector: SectorId, num_sectors: u32) -> Result<&mut File, ErrorKind> {
        if sector.0 as u64 + num_sectors as u64 > self.geometry.sector_count as u64 {
            error!("sector out of range {}", sector.0);
            return Err(ErrorKind::Fail);
        }
        let offset = sector.0 as u64 * self.geometry.sector_size as u64;
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| {
            error!("image {} not open", path.display());
            ErrorKind::Fail
        })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| io_fail("seek", path, e))?;
        Ok(file)
    }
}

impl Storage for FileStorage {
    fn open(&mut self) -> Result<(), ErrorKind> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| io_fail("open", &self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| io_fail("stat", &self.path, e))?
            .len();
        if len == 0 {
            info!("creating erased image {}", self.path.display());
            let image = vec![self.geometry.erased_value; self.image_len() as usize];
            file.write_all(&image)
                .map_err(|e| io_fail("initialise", &self.path, e))?;
        } else if len != self.image_len() {
            error!(
                "image {} is {} bytes, expected {}",
                self.path.display(),
                len,
                self.image_len()
            );
            return Err(ErrorKind::Fail);
        }
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self, sector: SectorId, data: &mut [u8]) -> Result<(), ErrorKind> {
        let num_bytes = core::cmp::min(data.len(), self.geometry.sector_size);
        let file = self.seek_to(sector, 1)?;
        let res = file.read_exact(&mut data[..num_bytes]);
        res.map_err(|e| io_fail("read", &self.path, e))?;
        trace!("file rd sector: {}", sector.0);
        Ok(())
    }

    fn write(&mut self, sector: SectorId, data: &[u8]) -> Result<(), ErrorKind> {
        let num_bytes = core::cmp::min(data.len(), self.geometry.sector_size);
        let file = self.seek_to(sector, 1)?;
        let res = file.write_all(&data[..num_bytes]);
        res.map_err(|e| io_fail("write", &self.path, e))?;
        trace!("file wr sector: {}", sector.0);
        Ok(())
    }

    fn erase(&mut self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind> {
        let len = self.geometry.sector_size * num_sectors as usize;
        let erased = vec![self.geometry.erased_value; len];
        let file = self.seek_to(sector, num_sectors)?;
        let res = file.write_all(&erased);
        res.map_err(|e| io_fail("erase", &self.path, e))?;
        trace!("file erase sectors: {}..{}", sector.0, sector.0 + num_sectors);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ErrorKind> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|e| io_fail("sync", &self.path, e))?;
        }
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
    fn creates_erased_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvm.bin");
        let mut storage = FileStorage::new(&path, 32, 4);
        storage.open().unwrap();
        storage.close().unwrap();
        let image = std::fs::read(&path).unwrap();
        assert_eq!(image.len(), 128);
        assert!(image.iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn sectors_persist_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvm.bin");
        let mut storage = FileStorage::new(&path, 8, 4);
        storage.open().unwrap();
        storage.write(SectorId(2), b"abcdefgh").unwrap();
        storage.close().unwrap();

        let mut storage = FileStorage::new(&path, 8, 4);
        storage.open().unwrap();
        let mut data = [0u8; 8];
        storage.read(SectorId(2), &mut data).unwrap();
        assert_eq!(&data, b"abcdefgh");
        storage.erase(SectorId(2), 1).unwrap();
        storage.read(SectorId(2), &mut data).unwrap();
        assert_eq!(data, [0xFF; 8]);
    }

    #[test]
    fn rejects_mismatched_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvm.bin");
        std::fs::write(&path, [0u8; 100]).unwrap();
        let mut storage = FileStorage::new(&path, 32, 4);
        assert_eq!(storage.open(), Err(ErrorKind::Fail));
    }

    #[test]
    fn io_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("nvm.bin"), 8, 4);
        let mut data = [0u8; 8];
        assert_eq!(storage.read(SectorId(0), &mut data), Err(ErrorKind::Fail));
    }

    #[test]
    fn log_survives_reopen_on_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvm.bin");
        let mut log = crate::IronLog::open(FileStorage::new(&path, 64, 8)).unwrap();
        log.append_string("first boot").unwrap();
        log.close().unwrap();

        let mut log = crate::IronLog::open(FileStorage::new(&path, 64, 8)).unwrap();
        log.append_string("second boot").unwrap();
        log.write_sync().unwrap();
        log.read_sync().unwrap();
        assert_eq!(log.read_string(64).unwrap(), "second boot");
        assert_eq!(log.read_string(64).unwrap(), "first boot");
        assert_eq!(log.read_string(64), Err(ErrorKind::Empty));
        log.close().unwrap();
    }

    #[test]
    fn out_of_range_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("nvm.bin"), 8, 4);
        storage.open().unwrap();
        assert_eq!(storage.erase(SectorId(3), 2), Err(ErrorKind::Fail));
        assert_eq!(storage.write(SectorId(4), &[0u8; 8]), Err(ErrorKind::Fail));
    }
}
