use crate::block::BlockState;
use crate::config::WrapPolicy;
use crate::error::ErrorKind;
use crate::storage::{SectorId, Storage};
use crate::util::counter_newer;
use crate::{IronLog, ANCHOR_SECTOR};
use log::{debug, error, info, warn};

#[derive(Debug)]
enum MountState {
    Probing,
    Formatting,
    Searching,
    Ready(Boundary),
}

/// Where the written run of the ring ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
    /// Newest valid block as `(sector, counter)`.
    last: Option<(u32, u32)>,
    /// First sector after it, `sector_count` when the run ends at the top of the ring.
    next: u32,
}

impl Boundary {
    const EMPTY: Boundary = Boundary {
        last: None,
        next: 1,
    };
}

impl<T: Storage> IronLog<T> {
    pub(crate) fn mount(&mut self) -> Result<(), ErrorKind> {
        let mut state = MountState::Probing;
        loop {
            debug!("mount state: {:?}", state);
            state = match state {
                MountState::Probing => match self.probe(ANCHOR_SECTOR)? {
                    BlockState::Valid { .. } => MountState::Searching,
                    other => {
                        warn!("anchor sector is {:?}, formatting", other);
                        MountState::Formatting
                    }
                },
                MountState::Formatting => {
                    self.format()?;
                    MountState::Ready(Boundary::EMPTY)
                }
                MountState::Searching => MountState::Ready(self.search()?),
                MountState::Ready(boundary) => return self.settle(boundary),
            };
        }
    }

    /// Read and classify one sector into the scratch block. Only hard device errors fail.
    fn probe(&mut self, sector: u32) -> Result<BlockState, ErrorKind> {
        self.storage
            .read(SectorId(sector), self.scratch.as_bytes_mut())
            .map_err(|e| {
                error!("probe of sector {} failed: {}", sector, e);
                e
            })?;
        let state = self.scratch.state(self.geometry.erased_value);
        debug!("probe sector {}: {:?}", sector, state);
        Ok(state)
    }

    /// Binary search the ring for the newest block.
    ///
    /// From sector 1 onwards valid blocks carry increasing counters up to the newest one. Past it
    /// lies an erased sector, a torn write, or a block from the previous pass whose counter is
    /// older than anything before the boundary.
    fn search(&mut self) -> Result<Boundary, ErrorKind> {
        let count = self.geometry.sector_count;
        let (mut lower, mut lower_counter) = match self.probe(1)? {
            BlockState::Valid { counter } => (1, counter),
            // Erased is either a fresh log or a power cut between erase and write while wrapping.
            head => match self.origin_past_bad_head(head)? {
                Ok(origin) => origin,
                Err(boundary) => return Ok(boundary),
            },
        };

        let mut upper = count;
        while upper - lower > 1 {
            let mid = lower + (upper - lower) / 2;
            match self.probe(mid)? {
                BlockState::Valid { counter } if counter_newer(counter, lower_counter) => {
                    lower = mid;
                    lower_counter = counter;
                }
                // A torn write is never followed by a newer block, rot inside the run is.
                BlockState::Corrupt if mid + 1 < upper => match self.probe(mid + 1)? {
                    BlockState::Valid { counter } if counter_newer(counter, lower_counter) => {
                        warn!("sector {} rotted inside the written run", mid);
                        lower = mid + 1;
                        lower_counter = counter;
                    }
                    _ => upper = mid,
                },
                _ => upper = mid,
            }
        }
        Ok(Boundary {
            last: Some((lower, lower_counter)),
            next: upper,
        })
    }

    /// Sector 1 holds no valid block: a fresh log, an interrupted write while wrapping, or rot in
    /// the first block.
    ///
    /// Returns a valid search origin, or the boundary outright when no search is needed.
    fn origin_past_bad_head(
        &mut self,
        head: BlockState,
    ) -> Result<Result<(u32, u32), Boundary>, ErrorKind> {
        let count = self.geometry.sector_count;
        let top = count - 1;
        if top == 1 {
            return Ok(Err(Boundary::EMPTY));
        }
        let second = self.probe(2)?;
        let tail = self.probe(top)?;
        let origin = match (second, tail) {
            (BlockState::Valid { counter }, BlockState::Valid { counter: tail_counter })
                if counter_newer(counter, tail_counter) =>
            {
                Ok((2, counter))
            }
            (_, BlockState::Valid { counter }) => Err(Boundary {
                last: Some((top, counter)),
                next: count,
            }),
            (BlockState::Valid { counter }, _) => Ok((2, counter)),
            _ => Err(Boundary::EMPTY),
        };
        match (head, origin) {
            (BlockState::Erased, Err(Boundary::EMPTY)) => debug!("log is empty"),
            _ => warn!("sector 1 is {:?}, resuming from {:?}", head, origin),
        }
        Ok(origin)
    }

    /// Move the write and read cursors to the boundary found on the media.
    fn settle(&mut self, boundary: Boundary) -> Result<(), ErrorKind> {
        let count = self.geometry.sector_count;
        self.write.clear();
        self.write_counter = boundary
            .last
            .map(|(_, counter)| counter.wrapping_add(1))
            .unwrap_or(0);
        self.exhausted = false;
        if boundary.next >= count {
            self.write_block_index = 1;
            self.exhausted = self.config.wrap == WrapPolicy::Stop;
        } else {
            self.write_block_index = boundary.next;
            if self.config.wrap == WrapPolicy::Stop {
                let next = self.probe(boundary.next)?;
                self.exhausted = matches!(next, BlockState::Valid { .. });
            }
        }
        if self.exhausted {
            warn!("log is full");
        }

        self.sync_reader();
        info!(
            "log ready, next block {} goes to sector {}",
            self.write_counter, self.write_block_index
        );
        Ok(())
    }
}
