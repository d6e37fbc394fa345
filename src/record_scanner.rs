//! Locates resource records in a message without decoding their data.
//!
//! Each record is classified by name length, type and TTL, and sized so that it
//! can be sliced out of the message buffer and re-emitted later.

#[cfg(feature = "logging")]
use crate::trace;

use crate::{
    dns_parser::{u16_from_be_slice, u32_from_be_slice, RRType},
    error::{check_bounds, Error, Result, UnsupportedRecord},
};
use std::ops::Range;

// RFC 1035: https://datatracker.ietf.org/doc/html/rfc1035#section-3.2.1
//
// All RRs have the same top level format shown below:
//                               1  1  1  1  1  1
// 0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |                                               |
// /                                               /
// /                      NAME                     /
// |                                               |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |                      TYPE                     |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |                     CLASS                     |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |                      TTL                      |
// |                                               |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |                   RDLENGTH                    |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
// /                     RDATA                     /
// /                                               /
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+

/// TYPE, CLASS, TTL and RDLENGTH fields after the name.
const RR_HEADER_REMAIN: usize = 10;

/// RDATA length of an A record.
const IPV4_ADDR_LEN: usize = 4;

// Offsets relative to the end of the name.
const TYPE_OFFSET: usize = 0;
const TTL_OFFSET: usize = 4;
const RDLENGTH_OFFSET: usize = 8;

/// One answer or authority record, located in the message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRecord {
    rtype: RRType,
    ttl: u32,
    name_length: usize,
    offset: usize,
    total_length: usize,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RRType {
        self.rtype
    }

    /// TTL in seconds, as declared in the message.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Byte length of the name field: 2 for a bare compression pointer.
    pub fn name_length(&self) -> usize {
        self.name_length
    }

    /// Offset of the record in the message.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `name_length + 10 + rdata length`
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.total_length
    }

    /// Offset of the TTL field, relative to the start of the record.
    pub(crate) fn ttl_field(&self) -> Range<usize> {
        let start = self.name_length + TTL_OFFSET;
        start..start + 4
    }
}

/// The additional section, kept as one opaque blob.
///
/// Its entries are not sized: the blob runs from the end of the authority
/// section to the end of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditionalRecords {
    offset: usize,
    len: usize,
    count: u16,
    has_opt: bool,
}

impl AdditionalRecords {
    /// Number of records declared in the header.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// True if the first entry is an OPT (EDNS) record.
    ///
    /// Later entries are not located, so an OPT record placed after glue
    /// records leaves this false.
    pub fn has_opt(&self) -> bool {
        self.has_opt
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Result of scanning the answer, authority and additional sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedSections {
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additional: Option<AdditionalRecords>,

    /// Set when the scan stopped at a record it cannot size.
    pub unsupported: Option<UnsupportedRecord>,
}

/// Walks the records of one message. The scanner owns the cursor; every
/// successful read advances it by exactly the size of one record.
pub struct RecordScanner<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> RecordScanner<'a> {
    /// Creates a scanner over `data` with the first record at `start`.
    pub fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            data,
            cursor: start,
        }
    }

    /// Offset of the next record.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Scans all sections using the counts from the header.
    ///
    /// A record of unsupported type ends the scan: its size is unknown, so are the
    /// offsets of everything after it. The records found so far are kept and the
    /// failure is stored in [ScannedSections::unsupported]. Any other error aborts.
    pub fn scan(
        mut self,
        num_answers: u16,
        num_authorities: u16,
        num_additionals: u16,
    ) -> Result<ScannedSections> {
        let mut sections = ScannedSections::default();

        let scanned = self
            .scan_section(num_answers, &mut sections.answers)
            .and_then(|_| self.scan_section(num_authorities, &mut sections.authorities));

        match scanned {
            Ok(()) => {}
            Err(Error::UnknownRecordType(record)) => {
                trace!("scan stopped at record type {}", record.rtype);
                sections.unsupported = Some(record);
                return Ok(sections);
            }
            Err(e) => return Err(e),
        }

        sections.additional = self.scan_additional(num_additionals)?;
        Ok(sections)
    }

    /// Reads `count` records into `records`.
    pub fn scan_section(&mut self, count: u16, records: &mut Vec<ResourceRecord>) -> Result<()> {
        trace!("scan_section: {} records at {}", count, self.cursor);
        for _ in 0..count {
            let record = self.next_record()?;
            records.push(record);
        }
        Ok(())
    }

    /// Sizes the record at the cursor and advances past it.
    pub fn next_record(&mut self) -> Result<ResourceRecord> {
        let data = self.data;
        let offset = self.cursor;
        let name_length = record_name_length(data, offset)?;

        let fields = offset + name_length;
        check_bounds(fields, RR_HEADER_REMAIN, data.len())?;

        let ty = u16_from_be_slice(&data[fields + TYPE_OFFSET..]);
        let (rtype, rdata_len) = match RRType::from_u16(ty) {
            Some(RRType::A) => (RRType::A, IPV4_ADDR_LEN),
            Some(rtype @ (RRType::CNAME | RRType::SOA)) => (
                rtype,
                u16_from_be_slice(&data[fields + RDLENGTH_OFFSET..]) as usize,
            ),
            _ => {
                return Err(Error::UnknownRecordType(UnsupportedRecord {
                    rtype: ty,
                    name_length,
                    data: data[offset..].to_vec(),
                }));
            }
        };

        let ttl = u32_from_be_slice(&data[fields + TTL_OFFSET..]);
        let total_length = name_length + RR_HEADER_REMAIN + rdata_len;
        check_bounds(offset, total_length, data.len())?;

        let record = ResourceRecord {
            rtype,
            ttl,
            name_length,
            offset,
            total_length,
        };
        trace!("next_record: {:?}", &record);

        self.cursor += total_length;
        Ok(record)
    }

    /// Takes the rest of the message as the additional section.
    ///
    /// Only the type of the first entry is peeked, to detect OPT. When the header
    /// declares no additional records the cursor must be at the end of the data.
    pub fn scan_additional(&mut self, count: u16) -> Result<Option<AdditionalRecords>> {
        let offset = self.cursor;
        let len = self.data.len().saturating_sub(offset);

        if count == 0 {
            if len != 0 {
                return Err(Error::OffsetOverrun {
                    offset,
                    needed: 0,
                    len: self.data.len(),
                });
            }
            return Ok(None);
        }

        let name_length = record_name_length(self.data, offset)?;
        let type_at = offset + name_length + TYPE_OFFSET;
        check_bounds(type_at, 2, self.data.len())?;
        let ty = u16_from_be_slice(&self.data[type_at..]);
        let has_opt = ty == RRType::OPT as u16;

        trace!(
            "scan_additional: {} records, {} bytes, opt {}",
            count,
            len,
            has_opt
        );

        self.cursor += len;
        Ok(Some(AdditionalRecords {
            offset,
            len,
            count,
            has_opt,
        }))
    }
}

/// Returns the byte length of the name at `offset`.
///
/// A name is a sequence of labels ending with either a zero byte or a
/// compression pointer. Pointers are not followed.
pub(crate) fn record_name_length(data: &[u8], offset: usize) -> Result<usize> {
    let mut pos = offset;
    loop {
        check_bounds(pos, 1, data.len())?;
        let length = data[pos];

        match length & 0xC0 {
            0x00 if length == 0 => return Ok(pos + 1 - offset),
            0x00 => pos += 1 + length as usize,
            0xC0 => {
                check_bounds(pos, 2, data.len())?;
                return Ok(pos + 2 - offset);
            }
            _ => return Err(Error::MalformedName { offset: pos, length }),
        }
    }
}
