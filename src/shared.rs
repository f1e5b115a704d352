use crate::error::ErrorKind;
use crate::storage::Storage;
use crate::IronLog;
use alloc::string::String;
use log::warn;
use spin::{Mutex, MutexGuard};

/// A log shared between one writer and one reader running in different contexts.
///
/// Every call holds the lock for its whole duration. Taking the lock gives up with `Fail` after
/// `Config::lock_spins` attempts; retrying is up to the caller.
pub struct SharedLog<T: Storage> {
    inner: Mutex<IronLog<T>>,
    lock_spins: u32,
}

impl<T: Storage> SharedLog<T> {
    pub fn new(log: IronLog<T>) -> Self {
        let lock_spins = log.config().lock_spins;
        SharedLog {
            inner: Mutex::new(log),
            lock_spins,
        }
    }

    pub fn open(storage: T) -> Result<Self, ErrorKind> {
        IronLog::open(storage).map(Self::new)
    }

    /// Take the lock, spinning at most `lock_spins` times.
    pub fn lock(&self) -> Result<MutexGuard<'_, IronLog<T>>, ErrorKind> {
        for _ in 0..self.lock_spins {
            if let Some(guard) = self.inner.try_lock() {
                return Ok(guard);
            }
            core::hint::spin_loop();
        }
        warn!("timed out waiting for log lock");
        Err(ErrorKind::Fail)
    }

    pub fn append(&self, record: &[u8]) -> Result<(), ErrorKind> {
        self.lock()?.append(record)
    }

    pub fn append_string(&self, text: &str) -> Result<(), ErrorKind> {
        self.lock()?.append_string(text)
    }

    pub fn write_sync(&self) -> Result<(), ErrorKind> {
        self.lock()?.write_sync()
    }

    pub fn read_sync(&self) -> Result<(), ErrorKind> {
        self.lock()?.read_sync()
    }

    pub fn read_record(&self, out: &mut [u8]) -> Result<usize, ErrorKind> {
        self.lock()?.read_record(out)
    }

    pub fn read_string(&self, max_len: usize) -> Result<String, ErrorKind> {
        self.lock()?.read_string(max_len)
    }

    pub fn format(&self) -> Result<(), ErrorKind> {
        self.lock()?.format()
    }

    pub fn close(self) -> Result<T, ErrorKind> {
        self.inner.into_inner().close()
    }
}
