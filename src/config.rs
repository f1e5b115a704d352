/// What the write path does once it reaches the last sector of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPolicy {
    /// Continue at sector 1, overwriting the oldest block.
    Wrap,
    /// Refuse further flushes with `ErrorKind::Full`.
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub wrap: WrapPolicy,
    /// Attempts `SharedLog` makes to take its lock before giving up with `ErrorKind::Fail`.
    pub lock_spins: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            wrap: WrapPolicy::Wrap,
            lock_spins: 1 << 20,
        }
    }
}

impl Config {
    pub fn with_wrap(mut self, wrap: WrapPolicy) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_lock_spins(mut self, lock_spins: u32) -> Self {
        self.lock_spins = lock_spins;
        self
    }
}
