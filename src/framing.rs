//! Conversions between datagram (UDP) and stream (TCP/TLS) framing.
//!
//! A stream message carries a 2-byte big-endian length prefix that a datagram
//! does not have (RFC 1035 section 4.2.2).

use crate::{
    dns_parser::{u16_from_be_slice, DnsHeader, DnsMessage, MSG_HEADER_LEN},
    error::{check_bounds, Error, Result},
};

const LENGTH_PREFIX_LEN: usize = 2;

/// The transport a message was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// UDP: one message per datagram, no prefix.
    Datagram,

    /// TCP or TLS: each message is prefixed with its length.
    Stream,
}

impl Transport {
    /// Maps an IP protocol number (6 for TCP, 17 for UDP) to a transport.
    pub const fn from_protocol(protocol: u8) -> Option<Self> {
        match protocol {
            6 => Some(Self::Stream),
            17 => Some(Self::Datagram),
            _ => None,
        }
    }
}

/// Strips the length prefix of a stream message.
///
/// The returned slice has exactly the declared length. Bytes beyond it belong to
/// the next message on the stream and are not returned.
pub fn stream_to_datagram(data: &[u8]) -> Result<&[u8]> {
    check_bounds(0, LENGTH_PREFIX_LEN, data.len())?;
    let declared = u16_from_be_slice(data) as usize;
    check_bounds(LENGTH_PREFIX_LEN, declared, data.len())?;

    Ok(&data[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + declared])
}

/// Frames a datagram message for a stream, replacing its transaction id.
///
/// The output is the length of `data`, then `dns_id`, then `data` without its
/// own id bytes.
pub fn datagram_to_stream(data: &[u8], dns_id: u16) -> Result<Vec<u8>> {
    if data.len() < 2 {
        return Err(Error::MalformedHeader { len: data.len() });
    }
    let len = u16::try_from(data.len())
        .map_err(|_| e_fmt!("message of {} bytes is too long for a stream", data.len()))?;

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + data.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&dns_id.to_be_bytes());
    framed.extend_from_slice(&data[2..]);
    Ok(framed)
}

/// Reads the transaction id of a datagram message without parsing it.
pub fn peek_id(data: &[u8]) -> Result<u16> {
    if data.len() < 2 {
        return Err(Error::MalformedHeader { len: data.len() });
    }
    Ok(u16_from_be_slice(data))
}

impl DnsMessage {
    /// Builds a fresh query for the question of this message.
    ///
    /// The header is a standard query with recursion desired, id 0 and one
    /// question. The answer data is not carried over. The caller sets the real id
    /// later, e.g. with [datagram_to_stream].
    pub fn revert_response(&self) -> Vec<u8> {
        let question = self.question_bytes();

        let mut query = Vec::with_capacity(MSG_HEADER_LEN + question.len());
        query.extend_from_slice(&DnsHeader::query(0).to_bytes());
        query.extend_from_slice(question);
        query
    }

    /// Frames this message for a stream with `dns_id` as the transaction id.
    pub fn to_stream(&self, dns_id: u16) -> Result<Vec<u8>> {
        datagram_to_stream(self.data(), dns_id)
    }
}
