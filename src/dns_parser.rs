//! DNS parsing utility.
//!
//! [DnsMessage] is the logic representation of one incoming DNS message. It owns the
//! raw bytes and the decoded header and question. Resource records are located by
//! [RecordScanner](crate::RecordScanner) and kept as offsets into the same buffer.

#[cfg(feature = "logging")]
use crate::trace;

use crate::{
    diagnostics::DiagnosticsSink,
    error::{check_bounds, Error, Result, UnsupportedRecord},
    framing::{stream_to_datagram, Transport},
    record_scanner::{AdditionalRecords, RecordScanner, ResourceRecord, ScannedSections},
};
use std::{fmt, ops::Range};

/// DNS resource record types understood by this crate, stored as `u16`.
///
/// See [RFC 1035 section 3.2.2](https://datatracker.ietf.org/doc/html/rfc1035#section-3.2.2)
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[non_exhaustive]
#[repr(u16)]
pub enum RRType {
    /// DNS record type for IPv4 address
    A = 1,

    /// DNS record type for Canonical Name
    CNAME = 5,

    /// DNS record type for Start of Authority
    SOA = 6,

    /// EDNS pseudo record, only seen in the additional section
    OPT = 41,
}

impl RRType {
    /// Converts `u16` into `RRType` if possible.
    pub const fn from_u16(value: u16) -> Option<RRType> {
        match value {
            1 => Some(RRType::A),
            5 => Some(RRType::CNAME),
            6 => Some(RRType::SOA),
            41 => Some(RRType::OPT),
            _ => None,
        }
    }
}

impl fmt::Display for RRType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RRType::A => write!(f, "TYPE_A"),
            RRType::CNAME => write!(f, "TYPE_CNAME"),
            RRType::SOA => write!(f, "TYPE_SOA"),
            RRType::OPT => write!(f, "TYPE_OPT"),
        }
    }
}

/// Size of the fixed DNS message header.
pub const MSG_HEADER_LEN: usize = 12;

// Definitions for DNS message header "flags" field
//
// The "flags" field is 16-bit long, in this format:
// (RFC 1035 section 4.1.1)
//
//   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
//
pub const FLAGS_QR_MASK: u16 = 0x8000; // mask for query/response bit

/// Flag bit to indicate a response
pub const FLAGS_QR_RESPONSE: u16 = 0x8000;

/// Flag bit for Recursion Desired
pub const FLAGS_RD: u16 = 0x0100;

/// Length of the type and class fields following a question name.
const QUESTION_TRAILER_LEN: usize = 4;

/// Max length of one label in a domain name.
const MAX_LABEL_LEN: usize = 63;

/// The fixed 12-byte header of a DNS message.
///
/// The header format is based on RFC 1035 section 4.1.1:
/// https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
//
//                                  1  1  1  1  1  1
//    0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |                      ID                       |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |                    QDCOUNT                    |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |                    ANCOUNT                    |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |                    NSCOUNT                    |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//    |                    ARCOUNT                    |
//    +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub num_questions: u16,
    pub num_answers: u16,
    pub num_authorities: u16,
    pub num_additionals: u16,
}

impl DnsHeader {
    /// Decodes the header from the first 12 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MSG_HEADER_LEN {
            return Err(Error::MalformedHeader { len: data.len() });
        }

        let header = Self {
            id: u16_from_be_slice(&data[..2]),
            flags: u16_from_be_slice(&data[2..4]),
            num_questions: u16_from_be_slice(&data[4..6]),
            num_answers: u16_from_be_slice(&data[6..8]),
            num_authorities: u16_from_be_slice(&data[8..10]),
            num_additionals: u16_from_be_slice(&data[10..12]),
        };

        trace!(
            "read_header: id {}, {} questions {} answers {} authorities {} additionals",
            header.id,
            header.num_questions,
            header.num_answers,
            header.num_authorities,
            header.num_additionals
        );
        Ok(header)
    }

    /// A standard query header with recursion desired and one question.
    pub const fn query(id: u16) -> Self {
        Self {
            id,
            flags: FLAGS_RD,
            num_questions: 1,
            num_answers: 0,
            num_authorities: 0,
            num_additionals: 0,
        }
    }

    pub const fn is_query(&self) -> bool {
        (self.flags & FLAGS_QR_MASK) == 0
    }

    pub const fn is_response(&self) -> bool {
        (self.flags & FLAGS_QR_MASK) == FLAGS_QR_RESPONSE
    }

    pub fn to_bytes(&self) -> [u8; MSG_HEADER_LEN] {
        let mut bytes = [0u8; MSG_HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.id.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.flags.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.num_questions.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.num_answers.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.num_authorities.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.num_additionals.to_be_bytes());
        bytes
    }
}

/// The single question of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    name: String, // always lower case.
    registrable_domain: Option<String>,
    tld: Option<String>,
    qtype: u16,
    qclass: u16,

    /// Byte length of the encoded name, without the zero terminator.
    name_len: usize,
}

impl DnsQuestion {
    /// Decoded query name, e.g. "www.micro.com".
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last two labels of the name, e.g. "micro.com".
    /// `None` for a name with a single label.
    pub fn registrable_domain(&self) -> Option<&str> {
        self.registrable_domain.as_deref()
    }

    /// The last label with a leading dot, e.g. ".com".
    pub fn tld(&self) -> Option<&str> {
        self.tld.as_deref()
    }

    pub fn qtype(&self) -> u16 {
        self.qtype
    }

    pub fn qclass(&self) -> u16 {
        self.qclass
    }

    /// Byte length of the whole question: name, terminator, type and class.
    pub fn question_len(&self) -> usize {
        self.name_len + 1 + QUESTION_TRAILER_LEN
    }
}

/// Decodes the question that starts at `offset` of `data`.
fn read_question(data: &[u8], offset: usize) -> Result<DnsQuestion> {
    let available = data.len().saturating_sub(offset);
    let mut pos = offset;

    // Walk the labels up to the zero-length root label.
    loop {
        let Some(&length) = data.get(pos) else {
            return Err(Error::TruncatedQuestion { available });
        };
        if length == 0 {
            break;
        }
        if length & 0xC0 != 0 {
            // Question names are never compressed.
            return Err(Error::MalformedName {
                offset: pos,
                length,
            });
        }
        pos += 1 + length as usize;
    }

    let name_bytes = &data[offset..pos];
    let trailer = pos + 1;
    if data.len() < trailer + QUESTION_TRAILER_LEN {
        return Err(Error::TruncatedQuestion { available });
    }

    let qtype = u16_from_be_slice(&data[trailer..trailer + 2]);
    let qclass = u16_from_be_slice(&data[trailer + 2..trailer + 4]);
    let name = decode_name(name_bytes)?;
    let (registrable_domain, tld) = split_domain(&name);

    trace!("read_question: {} qtype {} qclass {}", &name, qtype, qclass);

    Ok(DnsQuestion {
        name,
        registrable_domain,
        tld,
        qtype,
        qclass,
        name_len: name_bytes.len(),
    })
}

/// Decodes a sequence of length-prefixed labels into a lower case dotted name.
///
/// The sequence ends at a zero length byte or at the end of `raw`. Compression
/// pointers are not accepted.
///
/// See https://datatracker.ietf.org/doc/html/rfc1035#section-3.1 for
/// domain name encoding.
pub fn decode_name(raw: &[u8]) -> Result<String> {
    let mut name = String::new();
    let mut offset = 0;

    while offset < raw.len() {
        let length = raw[offset];
        if length == 0 {
            break;
        }
        if length & 0xC0 != 0 {
            return Err(Error::MalformedName { offset, length });
        }

        offset += 1;
        let ending = offset + length as usize;
        check_bounds(offset, length as usize, raw.len())?;

        if !name.is_empty() {
            name.push('.');
        }
        name.extend(raw[offset..ending].iter().map(|&b| char::from(b)));
        offset = ending;
    }

    Ok(name.to_lowercase())
}

/// Encodes a dotted name into length-prefixed labels, ending with a zero byte.
///
/// A trailing "." is ignored. An empty name encodes as the root name.
pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    let name = name.strip_suffix('.').unwrap_or(name);
    let mut encoded = Vec::with_capacity(name.len() + 2);

    if !name.is_empty() {
        for label in name.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(e_fmt!(
                    "encode_name: invalid label length {} in {}",
                    label.len(),
                    name
                ));
            }
            encoded.push(label.len() as u8);
            encoded.extend_from_slice(label.as_bytes());
        }
    }

    encoded.push(0);
    Ok(encoded)
}

/// Returns the registrable domain ("micro.com") and the TLD (".com") of `name`,
/// if it has at least two labels.
fn split_domain(name: &str) -> (Option<String>, Option<String>) {
    let Some((rest, tld)) = name.rsplit_once('.') else {
        return (None, None);
    };
    let sld = rest.rsplit('.').next().unwrap_or(rest);

    (Some(format!("{}.{}", sld, tld)), Some(format!(".{}", tld)))
}

/// One DNS message: a query or a response.
///
/// The message owns its bytes. Resource records refer to them by offset, use
/// [record_bytes](DnsMessage::record_bytes) to get the slice of a record.
#[derive(Debug, Clone)]
pub struct DnsMessage {
    data: Vec<u8>,
    header: DnsHeader,
    question: DnsQuestion,
    sections: ScannedSections,
}

impl DnsMessage {
    /// Parses a message received on `transport`.
    ///
    /// The 2-byte length prefix of stream messages is stripped first.
    pub fn parse(data: &[u8], transport: Transport) -> Result<Self> {
        let datagram = match transport {
            Transport::Datagram => data,
            Transport::Stream => stream_to_datagram(data)?,
        };
        Self::new(datagram.to_vec())
    }

    /// Parses a datagram message, i.e. without any length prefix.
    ///
    /// The header, the question and its name are always decoded. Resource records
    /// are only scanned for responses.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let header = DnsHeader::decode(&data)?;
        let question = read_question(&data, MSG_HEADER_LEN)?;

        let sections = if header.is_response() {
            let start = MSG_HEADER_LEN + question.question_len();
            RecordScanner::new(&data, start).scan(
                header.num_answers,
                header.num_authorities,
                header.num_additionals,
            )?
        } else {
            ScannedSections::default()
        };

        Ok(Self {
            data,
            header,
            question,
            sections,
        })
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn header(&self) -> &DnsHeader {
        &self.header
    }

    pub const fn is_query(&self) -> bool {
        self.header.is_query()
    }

    pub const fn is_response(&self) -> bool {
        self.header.is_response()
    }

    pub fn question(&self) -> &DnsQuestion {
        &self.question
    }

    /// The whole message bytes, as a datagram.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The original question bytes: name, terminator, type and class.
    pub fn question_bytes(&self) -> &[u8] {
        &self.data[self.question_range()]
    }

    /// The encoded question name, without the zero terminator.
    pub fn question_name_bytes(&self) -> &[u8] {
        let start = MSG_HEADER_LEN;
        &self.data[start..start + self.question.name_len]
    }

    fn question_range(&self) -> Range<usize> {
        MSG_HEADER_LEN..MSG_HEADER_LEN + self.question.question_len()
    }

    pub fn answers(&self) -> &[ResourceRecord] {
        &self.sections.answers
    }

    pub fn authorities(&self) -> &[ResourceRecord] {
        &self.sections.authorities
    }

    pub fn additional(&self) -> Option<&AdditionalRecords> {
        self.sections.additional.as_ref()
    }

    /// Returns the bytes of the additional section, empty if there is none.
    pub fn additional_bytes(&self) -> &[u8] {
        match &self.sections.additional {
            Some(additional) => &self.data[additional.range()],
            None => &[],
        }
    }

    /// Returns true if the additional section starts with an OPT (EDNS) record.
    ///
    /// Only the first additional entry is inspected: an OPT record that follows
    /// glue records is not detected.
    pub fn has_opt(&self) -> bool {
        self.sections
            .additional
            .as_ref()
            .is_some_and(AdditionalRecords::has_opt)
    }

    /// Returns the exact bytes of `record` in this message.
    pub fn record_bytes(&self, record: &ResourceRecord) -> &[u8] {
        &self.data[record.range()]
    }

    /// Returns false if the scan stopped early at a record of unsupported type.
    pub fn is_complete(&self) -> bool {
        self.sections.unsupported.is_none()
    }

    /// The record that stopped the scan, if any.
    pub fn unsupported_record(&self) -> Option<&UnsupportedRecord> {
        self.sections.unsupported.as_ref()
    }

    /// Forwards the unsupported record (if any) to `sink`.
    /// Returns true if something was reported.
    pub fn report_unsupported<S: DiagnosticsSink + ?Sized>(&self, sink: &S) -> bool {
        match &self.sections.unsupported {
            Some(record) => {
                sink.record_parse_error(record);
                true
            }
            None => false,
        }
    }
}

pub(crate) const fn u16_from_be_slice(bytes: &[u8]) -> u16 {
    let u8_array: [u8; 2] = [bytes[0], bytes[1]];
    u16::from_be_bytes(u8_array)
}

pub(crate) const fn u32_from_be_slice(s: &[u8]) -> u32 {
    let u8_array: [u8; 4] = [s[0], s[1], s[2], s[3]];
    u32::from_be_bytes(u8_array)
}

#[cfg(test)]
mod tests {
    use super::{decode_name, encode_name, split_domain, DnsHeader, DnsMessage, RRType};
    use crate::{Error, Transport};
    use test_log::test;

    fn query_for(name: &str) -> Vec<u8> {
        let mut data = DnsHeader::query(0xbeef).to_bytes().to_vec();
        data.extend(encode_name(name).unwrap());
        data.extend_from_slice(&[0, 1, 0, 1]);
        data
    }

    #[test]
    fn test_header_decode() {
        let data = [0x12, 0x34, 0x81, 0x80, 0, 1, 0, 2, 0, 3, 0, 4];
        let header = DnsHeader::decode(&data).unwrap();
        assert_eq!(header.id, 0x1234);
        assert!(header.is_response());
        assert!(!header.is_query());
        assert_eq!(header.num_questions, 1);
        assert_eq!(header.num_answers, 2);
        assert_eq!(header.num_authorities, 3);
        assert_eq!(header.num_additionals, 4);
        assert_eq!(header.to_bytes(), data);
    }

    #[test]
    fn test_header_only_qr_bit_matters() {
        // Opcode, RD, RA and RCODE bits set, QR clear.
        let data = [0, 1, 0x7f, 0xff, 0, 1, 0, 0, 0, 0, 0, 0];
        let header = DnsHeader::decode(&data).unwrap();
        assert!(header.is_query());
    }

    #[test]
    fn test_header_too_short() {
        let result = DnsHeader::decode(&[0u8; 11]);
        assert_eq!(result, Err(Error::MalformedHeader { len: 11 }));
        if let Err(e) = result {
            println!("{}", e);
        }
    }

    #[test]
    fn test_query_header_bytes() {
        let bytes = DnsHeader::query(0).to_bytes();
        assert_eq!(bytes, [0, 0, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_query() {
        let data = query_for("WWW.Micro.com");
        let msg = DnsMessage::parse(&data, Transport::Datagram).unwrap();
        assert!(msg.is_query());
        assert_eq!(msg.id(), 0xbeef);

        let question = msg.question();
        assert_eq!(question.name(), "www.micro.com");
        assert_eq!(question.registrable_domain(), Some("micro.com"));
        assert_eq!(question.tld(), Some(".com"));
        assert_eq!(question.qtype(), RRType::A as u16);
        assert_eq!(question.qclass(), 1);
        assert_eq!(question.question_len(), 15 + 4);
        assert_eq!(msg.question_bytes(), &data[12..]);
        assert_eq!(msg.question_name_bytes().len(), 14);
        assert!(msg.answers().is_empty());
        assert!(msg.is_complete());
    }

    #[test]
    fn test_single_label_name() {
        let msg = DnsMessage::new(query_for("localhost")).unwrap();
        assert_eq!(msg.question().name(), "localhost");
        assert_eq!(msg.question().registrable_domain(), None);
        assert_eq!(msg.question().tld(), None);
    }

    #[test]
    fn test_truncated_question() {
        let mut data = query_for("micro.com");
        data.truncate(data.len() - 2);
        assert!(matches!(
            DnsMessage::new(data),
            Err(Error::TruncatedQuestion { .. })
        ));

        // No terminator at all.
        let mut data = DnsHeader::query(1).to_bytes().to_vec();
        data.extend_from_slice(&[5, b'm', b'i', b'c']);
        assert_eq!(
            DnsMessage::new(data).unwrap_err(),
            Error::TruncatedQuestion { available: 4 }
        );
    }

    #[test]
    fn test_compressed_question_name() {
        let mut data = DnsHeader::query(1).to_bytes().to_vec();
        data.extend_from_slice(&[0xc0, 0x0c, 0, 0, 1, 0, 1]);
        assert_eq!(
            DnsMessage::new(data).unwrap_err(),
            Error::MalformedName {
                offset: 12,
                length: 0xc0
            }
        );
    }

    #[test]
    fn test_decode_name() {
        let raw = [3, b'w', b'w', b'w', 5, b'M', b'i', b'c', b'r', b'o', 3, b'c', b'o', b'm'];
        assert_eq!(decode_name(&raw).unwrap(), "www.micro.com");

        // A label running past the end.
        let raw = [3, b'w', b'w', b'w', 9, b'm'];
        assert!(matches!(
            decode_name(&raw),
            Err(Error::OffsetOverrun { .. })
        ));

        assert_eq!(decode_name(&[]).unwrap(), "");
    }

    #[test]
    fn test_name_round_trip() {
        for name in ["www.micro.com", "a.b.c.d.example.org", "localhost", "Mixed.Case.NET"] {
            let encoded = encode_name(name).unwrap();
            let decoded = decode_name(&encoded).unwrap();
            assert_eq!(decoded, name.to_lowercase());

            // decoding is idempotent.
            let again = decode_name(&encode_name(&decoded).unwrap()).unwrap();
            assert_eq!(again, decoded);
        }

        // random names made of [a-z0-9-]
        for _ in 0..200 {
            let labels: Vec<String> = (0..fastrand::usize(1..5))
                .map(|_| {
                    (0..fastrand::usize(1..=63))
                        .map(|_| fastrand::alphanumeric().to_ascii_lowercase())
                        .collect()
                })
                .collect();
            let name = labels.join(".");
            let decoded = decode_name(&encode_name(&name).unwrap()).unwrap();
            assert_eq!(decoded, name);
        }
    }

    #[test]
    fn test_encode_name_invalid() {
        assert!(encode_name("a..b").is_err());
        assert!(encode_name(&"x".repeat(64)).is_err());
        assert_eq!(encode_name("micro.com.").unwrap(), encode_name("micro.com").unwrap());
        assert_eq!(encode_name("").unwrap(), vec![0]);
    }

    #[test]
    fn test_split_domain() {
        assert_eq!(
            split_domain("sd.micro.co.uk"),
            (Some("co.uk".to_string()), Some(".uk".to_string()))
        );
        assert_eq!(
            split_domain("micro.com"),
            (Some("micro.com".to_string()), Some(".com".to_string()))
        );
        assert_eq!(split_domain("com"), (None, None));
    }
}
