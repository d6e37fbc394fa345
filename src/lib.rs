//! A DNS message codec and rewriter for caching / filtering DNS proxies.
//!
//! This library parses one raw DNS message at a time, decodes the queried domain
//! name, and builds a rewritten outbound message with normalized TTLs and a capped
//! number of A records. It also converts between datagram (UDP) and stream (TCP/TLS)
//! framing and turns a cached response back into a fresh query.
//!
//! The processing is a single pass over one buffer:
//!```text
//!  raw bytes --> header --> question --> name --> resource records --> rewriter
//!                                                                        |
//!                               send_data (to client) <------------------+
//!                               cache_data, cache_ttl (to cache) <-------+
//!```
//! There is no I/O, no shared state and no async runtime. A [`DnsMessage`] owns
//! its buffer, so messages can be processed on any number of threads.
//!
//! # Usage
//!
//! ```rust
//! use dns_rewrite::{DnsMessage, RewriteConfig, Transport};
//!
//! // A response for "www.micro.com" with one A record (TTL 100).
//! let mut data = vec![
//!     0x12, 0x34, 0x81, 0x80, 0, 1, 0, 1, 0, 0, 0, 0, // header
//!     3, b'w', b'w', b'w', 5, b'm', b'i', b'c', b'r', b'o', 3, b'c', b'o', b'm', 0,
//!     0, 1, 0, 1, // type A, class IN
//! ];
//! data.extend_from_slice(&[0xc0, 0x0c, 0, 1, 0, 1, 0, 0, 0, 100, 0, 4, 10, 0, 0, 1]);
//!
//! let message = DnsMessage::parse(&data, Transport::Datagram).expect("valid message");
//! assert_eq!(message.question().name(), "www.micro.com");
//! assert_eq!(message.question().registrable_domain(), Some("micro.com"));
//!
//! let output = message.rewrite(None, &RewriteConfig::default()).expect("rewritten");
//! assert_eq!(output.cache_ttl, 300);
//! ```
//!
//! # Limitations
//!
//! Based on [RFC 1035](https://tools.ietf.org/html/rfc1035), with these limits:
//! - Only one question per message.
//! - Answer and authority records must be A, CNAME or SOA. Any other type stops the
//!   scan and is reported as [`Error::UnknownRecordType`].
//! - The additional section is kept as one opaque blob. Only the first entry is
//!   inspected, to detect an OPT record. An OPT record after glue records is not
//!   detected.
//! - When A records are dropped, only the answer count is patched, to the A record
//!   limit. Authority and additional counts are left as received.
//! - Compression pointers in record names are sized, never followed.

#![forbid(unsafe_code)]

// log for logging (optional).
#[cfg(feature = "logging")]
pub(crate) use log::{debug, trace};

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace {
        ($($arg:expr),*) => {
            {
                let _ = ($($arg),*); // avoid warnings about unused variables.
            }
        };
    }

    macro_rules! debug {
        ($($arg:expr),*) => {
            {
                let _ = ($($arg),*); // avoid warnings about unused variables.
            }
        };
    }
}

#[macro_use]
mod error;

mod diagnostics;
mod dns_parser;
mod framing;
mod record_scanner;
mod rewriter;

pub use diagnostics::{DiagnosticsSink, LogSink};
pub use dns_parser::{
    decode_name, encode_name, DnsHeader, DnsMessage, DnsQuestion, RRType, FLAGS_QR_MASK,
    FLAGS_QR_RESPONSE, FLAGS_RD, MSG_HEADER_LEN,
};
pub use error::{Error, Result, UnsupportedRecord};
pub use framing::{datagram_to_stream, peek_id, stream_to_datagram, Transport};
pub use record_scanner::{AdditionalRecords, RecordScanner, ResourceRecord, ScannedSections};
pub use rewriter::{clamp_ttl, RewriteConfig, RewriteOutput};

/// Re-export from `flume`, for building a diagnostics channel.
pub use flume::{Receiver, Sender};

/// TTL (seconds) that every shorter record TTL is raised to.
pub const MINIMUM_TTL: u32 = 300;

/// TTL (seconds) that every longer record TTL is lowered to.
pub const DEFAULT_TTL: u32 = 3600;

/// Max number of A records kept in a rewritten message.
pub const MAX_A_RECORD_COUNT: usize = 3;
