use std::fmt;

/// A resource record whose type this crate cannot size.
///
/// Produced by the record scanner when it meets a type other than A, CNAME or SOA.
/// The record and everything after it in the message cannot be located, so the
/// scan stops here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedRecord {
    /// The raw record type, e.g. 41 for OPT.
    pub rtype: u16,

    /// Byte length of the record name as computed by the scanner.
    pub name_length: usize,

    /// The offending bytes: from the start of the record to the end of the message.
    pub data: Vec<u8>,
}

impl fmt::Display for UnsupportedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type {} name length {} data {:x?}",
            self.rtype, self.name_length, &self.data
        )
    }
}

/// A basic error type from this library.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The buffer is shorter than the fixed 12-byte header.
    MalformedHeader { len: usize },

    /// The question has no name terminator or misses its type/class trailer.
    TruncatedQuestion { available: usize },

    /// A label length byte that is not allowed in a question name.
    MalformedName { offset: usize, length: u8 },

    /// A resource record type that cannot be sized.
    UnknownRecordType(UnsupportedRecord),

    /// A computed slice exceeds the buffer bounds.
    OffsetOverrun {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A generic error message.
    Msg(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader { len } => {
                write!(f, "DNS header is too short: {} bytes", len)
            }
            Self::TruncatedQuestion { available } => {
                write!(f, "DNS question is truncated: {} bytes available", available)
            }
            Self::MalformedName { offset, length } => {
                write!(f, "bad label length 0x{:x} at offset {}", length, offset)
            }
            Self::UnknownRecordType(record) => write!(f, "unknown record type: {}", record),
            Self::OffsetOverrun {
                offset,
                needed,
                len,
            } => write!(
                f,
                "offset overrun at {}: {} bytes needed, buffer length {}",
                offset, needed, len
            ),
            Self::Msg(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

/// One and only `Result` type from this library crate.
pub type Result<T> = core::result::Result<T, Error>;

/// A simple macro to report all kinds of errors.
macro_rules! e_fmt {
  ($($arg:tt)+) => {
      $crate::Error::Msg(format!($($arg)+))
  };
}

/// Returns `Error::OffsetOverrun` unless `needed` bytes starting at `offset` fit in `len`.
pub(crate) fn check_bounds(offset: usize, needed: usize, len: usize) -> Result<()> {
    match offset.checked_add(needed) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::OffsetOverrun {
            offset,
            needed,
            len,
        }),
    }
}
