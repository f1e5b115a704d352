use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device I/O error, bad magic or CRC, oversized read, lock timeout.
    Fail,
    /// The record can never fit in a block, or no free sector remains.
    Full,
    /// Sector holds nothing but the erased byte pattern.
    Erased,
    /// No further records to read.
    Empty,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::Fail => "operation failed",
            ErrorKind::Full => "no space for record",
            ErrorKind::Erased => "block is erased",
            ErrorKind::Empty => "no more records",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}
