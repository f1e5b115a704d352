//! Log structured record store for raw, sector erasable non-volatile memory.
//!
//! Records are null terminated byte strings packed into sector sized blocks. Every block carries a
//! magic number, a monotonic counter and a CRC-16 of its payload, which is all the log needs to
//! find its head again after an unclean reset. Sector 0 anchors the media; sectors
//! `1..sector_count` form the circular log.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

mod block;
mod config;
mod error;
#[cfg(feature = "std")]
mod file;
mod mount;
mod ram;
mod read;
mod shared;
mod storage;
mod util;
mod write;

#[cfg(test)]
mod tests_util;

pub use block::{classify, is_erased, is_valid, BlockState};
pub use config::{Config, WrapPolicy};
pub use error::ErrorKind;
#[cfg(feature = "std")]
pub use file::FileStorage;
pub use ram::RamStorage;
pub use read::History;
pub use shared::SharedLog;
pub use storage::{Geometry, SectorId, Storage};
pub use util::crc16;

use block::{Block, Buffer};
use log::{error, info};

/// Payload of the anchor block written to sector 0 by `format`.
pub const SENTINEL: &str = "NVM STRING LOGGER";

pub(crate) const ANCHOR_SECTOR: u32 = 0;

/// Snapshot of the log's position on the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Sector the next flushed block goes to.
    pub write_block: u32,
    /// Sector the reader loads once its current block runs out.
    pub read_block: u32,
    /// Counter the next flushed block is stamped with.
    pub write_counter: u32,
}

/// An open log. Owns its storage exclusively until `close`.
pub struct IronLog<T: Storage> {
    storage: T,
    geometry: Geometry,
    config: Config,
    write: Buffer,
    read: Buffer,
    scratch: Block,
    write_block_index: u32,
    read_block_index: u32,
    write_counter: u32,
    /// Counter of the newest block the reader may still load; every load must be strictly older.
    read_counter: u32,
    /// Sector loads left before the reader has walked the whole ring.
    read_budget: u32,
    /// Set under `WrapPolicy::Stop` once no free sector remains.
    exhausted: bool,
}

impl<T: Storage> IronLog<T> {
    pub fn open(storage: T) -> Result<Self, ErrorKind> {
        Self::open_with_config(storage, Config::default())
    }

    /// Open the storage and locate the head of the log, formatting media that carries no anchor.
    pub fn open_with_config(mut storage: T, config: Config) -> Result<Self, ErrorKind> {
        storage.open().map_err(|e| {
            error!("storage open failed: {}", e);
            e
        })?;
        let geometry = storage.geometry();
        geometry.validate()?;
        info!(
            "opening log on {} sectors of {} bytes",
            geometry.sector_count, geometry.sector_size
        );

        let sector_size = geometry.sector_size;
        let mut log = IronLog {
            storage,
            geometry,
            config,
            write: Buffer::new(sector_size),
            read: Buffer::new(sector_size),
            scratch: Block::new(sector_size),
            write_block_index: 1,
            read_block_index: 1,
            write_counter: 0,
            read_counter: 0,
            read_budget: 0,
            exhausted: false,
        };
        log.mount()?;
        Ok(log)
    }

    /// Erase the whole device and lay down a fresh anchor block.
    ///
    /// On failure the in-memory state no longer matches the media; retry `format` or reopen.
    pub fn format(&mut self) -> Result<(), ErrorKind> {
        info!("formatting {} sectors", self.geometry.sector_count);
        self.storage
            .erase(SectorId(0), self.geometry.sector_count)
            .map_err(|e| {
                error!("erase failed: {}", e);
                ErrorKind::Fail
            })?;

        self.write.clear();
        self.read.clear();
        self.write_block_index = 1;
        self.write_counter = 0;
        self.exhausted = false;

        self.scratch.clear();
        let sentinel = SENTINEL.as_bytes();
        self.scratch
            .payload_mut()
            .get_mut(..sentinel.len())
            .ok_or(ErrorKind::Fail)?
            .copy_from_slice(sentinel);
        self.scratch.seal(0)?;
        self.storage
            .write(SectorId(ANCHOR_SECTOR), self.scratch.as_bytes())?;

        self.sync_reader();
        Ok(())
    }

    /// Flush buffered records and close the storage, handing it back.
    ///
    /// The storage is closed even when the flush fails; the flush error is reported first.
    pub fn close(mut self) -> Result<T, ErrorKind> {
        let flushed = self.flush();
        if let Err(e) = flushed {
            error!("final flush failed: {}", e);
        }
        let closed = self.storage.close();
        flushed?;
        closed?;
        Ok(self.storage)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Largest record body a block can hold, terminator excluded.
    pub fn max_record_len(&self) -> usize {
        self.geometry.payload_size() - 1
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            write_block: self.write_block_index,
            read_block: self.read_block_index,
            write_counter: self.write_counter,
        }
    }

    /// Sector after `index` in the ring, skipping the anchor.
    pub(crate) fn next_sector(&self, index: u32) -> u32 {
        if index + 1 >= self.geometry.sector_count {
            1
        } else {
            index + 1
        }
    }

    /// Sector before `index` in the ring, skipping the anchor.
    pub(crate) fn prev_sector(&self, index: u32) -> u32 {
        if index > 1 {
            index - 1
        } else {
            self.geometry.sector_count - 1
        }
    }
}
