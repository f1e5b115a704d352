use crate::block::BlockState;
use crate::error::ErrorKind;
use crate::storage::{SectorId, Storage};
use crate::util::counter_newer;
use crate::IronLog;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, error, trace, warn};

/// End of the record data in `payload[..end]`, dropping the zero padding behind the last
/// record along with that record's terminator.
fn trim_end(payload: &[u8], mut end: usize) -> usize {
    while end > 0 && payload[end - 1] == 0 {
        end -= 1;
    }
    end
}

impl<T: Storage> IronLog<T> {
    /// Point the reader at the newest record, buffered ones included, so the following reads walk
    /// the history backwards from there.
    pub fn read_sync(&mut self) -> Result<(), ErrorKind> {
        self.sync_reader();
        Ok(())
    }

    pub(crate) fn sync_reader(&mut self) {
        self.read
            .block
            .as_bytes_mut()
            .copy_from_slice(self.write.block.as_bytes());
        self.read.index = trim_end(self.read.block.payload(), self.write.index);
        self.read_block_index = self.prev_sector(self.write_block_index);
        self.read_counter = self.write_counter;
        self.read_budget = self.geometry.sector_count - 1;
        trace!(
            "read sync block: {} index: {}",
            self.read_block_index,
            self.read.index
        );
    }

    /// Load the sector under the read cursor and step the cursor back one sector.
    ///
    /// Returns the block counter when the block is valid. Erased blocks report `Erased`, corrupt
    /// ones `Fail`; neither leaves anything to parse in the read buffer.
    pub(crate) fn read_block(&mut self) -> Result<u32, ErrorKind> {
        let index = self.read_block_index;
        self.read_block_index = self.prev_sector(index);
        self.read_budget = self.read_budget.saturating_sub(1);
        self.read.index = 0;

        self.storage
            .read(SectorId(index), self.read.block.as_bytes_mut())
            .map_err(|e| {
                error!("read sector {} failed: {}", index, e);
                e
            })?;
        match self.read.block.state(self.geometry.erased_value) {
            BlockState::Valid { counter } => {
                let capacity = self.read.block.capacity();
                self.read.index = trim_end(self.read.block.payload(), capacity);
                trace!("rd block {} from sector {}", counter, index);
                Ok(counter)
            }
            BlockState::Erased => Err(ErrorKind::Erased),
            BlockState::Corrupt => {
                warn!("sector {} is corrupt", index);
                Err(ErrorKind::Fail)
            }
        }
    }

    /// Copy the next older record into `out`, returning its length.
    ///
    /// `Empty` once the history is exhausted. A corrupt block yields `Fail` and is skipped by the
    /// next call. A record longer than `out` yields `Fail` and stays unread.
    pub fn read_record(&mut self, out: &mut [u8]) -> Result<usize, ErrorKind> {
        while self.read.index == 0 {
            if self.read_budget == 0 {
                return Err(ErrorKind::Empty);
            }
            match self.read_block() {
                Ok(counter) if counter_newer(self.read_counter, counter) => {
                    self.read_counter = counter;
                }
                Ok(counter) => {
                    debug!(
                        "block {} is not older than {}, history ends",
                        counter, self.read_counter
                    );
                    self.read.index = 0;
                    self.read_budget = 0;
                    return Err(ErrorKind::Empty);
                }
                Err(ErrorKind::Erased) => {
                    self.read_budget = 0;
                    return Err(ErrorKind::Empty);
                }
                Err(e) => return Err(e),
            }
        }

        let payload = self.read.block.payload();
        let end = self.read.index;
        let mut start = end;
        while start > 0 && payload[start - 1] != 0 {
            start -= 1;
        }
        let len = end - start;
        if len > out.len() {
            warn!("record of {} bytes exceeds buffer of {}", len, out.len());
            return Err(ErrorKind::Fail);
        }
        out[..len].copy_from_slice(&payload[start..end]);
        self.read.index = start.saturating_sub(1);
        Ok(len)
    }

    /// Read the next older record as UTF-8 text of at most `max_len` bytes.
    pub fn read_string(&mut self, max_len: usize) -> Result<String, ErrorKind> {
        let mut record = vec![0u8; max_len];
        let len = self.read_record(&mut record)?;
        record.truncate(len);
        String::from_utf8(record).map_err(|_| {
            warn!("record is not valid utf-8");
            ErrorKind::Fail
        })
    }

    /// Resync the reader and iterate the history newest first.
    pub fn history(&mut self) -> History<'_, T> {
        self.sync_reader();
        History { log: self }
    }
}

/// Records newest first. Corrupt blocks show up as `Err` items and iteration carries on past them.
pub struct History<'a, T: Storage> {
    log: &'a mut IronLog<T>,
}

impl<'a, T: Storage> Iterator for History<'a, T> {
    type Item = Result<Vec<u8>, ErrorKind>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = vec![0u8; self.log.max_record_len()];
        match self.log.read_record(&mut record) {
            Ok(len) => {
                record.truncate(len);
                Some(Ok(record))
            }
            Err(ErrorKind::Empty) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
