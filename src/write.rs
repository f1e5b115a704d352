use crate::block::BlockState;
use crate::config::WrapPolicy;
use crate::error::ErrorKind;
use crate::storage::{SectorId, Storage};
use crate::IronLog;
use log::{debug, error, trace, warn};

impl<T: Storage> IronLog<T> {
    /// Append one record. The terminating null is added here.
    ///
    /// Records never span blocks: when the record does not fit behind the buffered ones the
    /// buffer is flushed first. A record that cannot fit even an empty block fails with `Full`.
    pub fn append(&mut self, record: &[u8]) -> Result<(), ErrorKind> {
        if record.is_empty() || record.contains(&0) {
            warn!("rejecting record of {} bytes holding a null", record.len());
            return Err(ErrorKind::Fail);
        }
        let size = record.len() + 1;
        let capacity = self.write.block.capacity();
        if size > capacity {
            warn!("record of {} bytes exceeds block capacity {}", size, capacity);
            return Err(ErrorKind::Full);
        }
        if self.write.index + size > capacity {
            self.flush()?;
        }

        let start = self.write.index;
        let payload = self.write.block.payload_mut();
        payload[start..start + record.len()].copy_from_slice(record);
        payload[start + record.len()] = 0;
        self.write.index += size;
        trace!("wr record len: {} buffer index: {}", size, self.write.index);
        Ok(())
    }

    pub fn append_string(&mut self, text: &str) -> Result<(), ErrorKind> {
        self.append(text.as_bytes())
    }

    /// Force the buffered records out to the device.
    pub fn write_sync(&mut self) -> Result<(), ErrorKind> {
        self.flush()
    }

    /// Write the buffer to the next sector of the ring, erasing it first unless it already reads
    /// as erased. Nothing changes in memory unless the block made it to the device.
    pub(crate) fn flush(&mut self) -> Result<(), ErrorKind> {
        if self.write.index == 0 {
            return Ok(());
        }
        if self.exhausted {
            warn!("no free sector left for block {}", self.write_counter);
            return Err(ErrorKind::Full);
        }

        let target = self.write_block_index;
        let counter = self.write_counter;
        self.write.block.seal(counter)?;

        self.storage
            .read(SectorId(target), self.scratch.as_bytes_mut())?;
        if self.scratch.state(self.geometry.erased_value) != BlockState::Erased {
            debug!("erasing sector {} before write", target);
            self.storage.erase(SectorId(target), 1).map_err(|e| {
                error!("erase sector {} failed: {}", target, e);
                e
            })?;
        }
        self.storage
            .write(SectorId(target), self.write.block.as_bytes())
            .map_err(|e| {
                error!("write sector {} failed: {}", target, e);
                e
            })?;
        debug!("flushed block {} to sector {}", counter, target);

        self.write.clear();
        self.write_counter = counter.wrapping_add(1);
        self.write_block_index = self.next_sector(target);
        if self.write_block_index == 1 {
            match self.config.wrap {
                WrapPolicy::Wrap => debug!("write cursor wrapped"),
                WrapPolicy::Stop => {
                    warn!("log is full");
                    self.exhausted = true;
                }
            }
        }
        Ok(())
    }
}
