use crate::{ErrorKind, Geometry, IronLog, SectorId, Storage};
use log::LevelFilter;

pub(crate) fn init() {
    let _ = env_logger::builder()
        .is_test(true)
        .format_timestamp_nanos()
        .filter_level(LevelFilter::Trace)
        .try_init();
}

/// Resync and read the whole history as text, newest first.
pub(crate) fn drain<T: Storage>(log: &mut IronLog<T>) -> Vec<String> {
    log.history()
        .map(|record| String::from_utf8(record.unwrap()).unwrap())
        .collect()
}

/// Like `drain` but skips corrupt blocks.
pub(crate) fn drain_lossy<T: Storage>(log: &mut IronLog<T>) -> Vec<String> {
    log.history()
        .filter_map(|record| record.ok())
        .map(|record| String::from_utf8(record).unwrap())
        .collect()
}

/// Wraps a storage and fails selected operations on demand.
pub(crate) struct FaultyStorage<S> {
    inner: S,
    pub(crate) fail_open: bool,
    pub(crate) fail_reads: bool,
    pub(crate) fail_read_sector: Option<u32>,
    pub(crate) fail_writes: bool,
    pub(crate) fail_erases: bool,
    pub(crate) closed: bool,
}

impl<S: Storage> FaultyStorage<S> {
    pub(crate) fn new(inner: S) -> Self {
        FaultyStorage {
            inner,
            fail_open: false,
            fail_reads: false,
            fail_read_sector: None,
            fail_writes: false,
            fail_erases: false,
            closed: false,
        }
    }
}

impl<S: Storage> Storage for FaultyStorage<S> {
    fn open(&mut self) -> Result<(), ErrorKind> {
        if self.fail_open {
            return Err(ErrorKind::Fail);
        }
        self.closed = false;
        self.inner.open()
    }

    fn read(&mut self, sector: SectorId, data: &mut [u8]) -> Result<(), ErrorKind> {
        if self.fail_reads || self.fail_read_sector == Some(sector.0) {
            return Err(ErrorKind::Fail);
        }
        self.inner.read(sector, data)
    }

    fn write(&mut self, sector: SectorId, data: &[u8]) -> Result<(), ErrorKind> {
        if self.fail_writes {
            return Err(ErrorKind::Fail);
        }
        self.inner.write(sector, data)
    }

    fn erase(&mut self, sector: SectorId, num_sectors: u32) -> Result<(), ErrorKind> {
        if self.fail_erases {
            return Err(ErrorKind::Fail);
        }
        self.inner.erase(sector, num_sectors)
    }

    fn close(&mut self) -> Result<(), ErrorKind> {
        self.closed = true;
        self.inner.close()
    }

    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }
}
