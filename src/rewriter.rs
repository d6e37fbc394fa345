//! Builds the outbound message from a parsed response.
//!
//! Record TTLs are clamped into `[minimum_ttl, maximum_ttl]` and at most
//! `max_a_records` A records are kept. When records are dropped, the answer count
//! in the header is set to `max_a_records`. The transaction id can be replaced for
//! a different client.

#[cfg(feature = "logging")]
use crate::debug;

use crate::{
    dns_parser::{DnsMessage, RRType, MSG_HEADER_LEN},
    error::{Error, Result},
    record_scanner::ResourceRecord,
    DEFAULT_TTL, MAX_A_RECORD_COUNT, MINIMUM_TTL,
};

/// TTL and record limits applied by [DnsMessage::rewrite].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteConfig {
    minimum_ttl: u32,
    maximum_ttl: u32,
    max_a_records: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            minimum_ttl: MINIMUM_TTL,
            maximum_ttl: DEFAULT_TTL,
            max_a_records: MAX_A_RECORD_COUNT,
        }
    }
}

impl RewriteConfig {
    /// Returns an error if `minimum_ttl > maximum_ttl` or `max_a_records` is 0.
    pub fn new(minimum_ttl: u32, maximum_ttl: u32, max_a_records: usize) -> Result<Self> {
        if minimum_ttl > maximum_ttl {
            return Err(e_fmt!(
                "minimum TTL {} is greater than maximum TTL {}",
                minimum_ttl,
                maximum_ttl
            ));
        }
        if max_a_records == 0 {
            return Err(e_fmt!("max A record count must be at least 1"));
        }

        Ok(Self {
            minimum_ttl,
            maximum_ttl,
            max_a_records,
        })
    }

    pub fn minimum_ttl(&self) -> u32 {
        self.minimum_ttl
    }

    pub fn maximum_ttl(&self) -> u32 {
        self.maximum_ttl
    }

    pub fn max_a_records(&self) -> usize {
        self.max_a_records
    }

    /// The TTL written into a record declared with `ttl`.
    pub fn effective_ttl(&self, ttl: u32) -> u32 {
        ttl.clamp(self.minimum_ttl, self.maximum_ttl)
    }
}

/// Clamps `ttl` into `[MINIMUM_TTL, DEFAULT_TTL]`.
pub fn clamp_ttl(ttl: u32) -> u32 {
    RewriteConfig::default().effective_ttl(ttl)
}

/// The result of [DnsMessage::rewrite].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    /// The message to send to the client.
    pub send_data: Vec<u8>,

    /// The message to store in a cache: no additional records, original id.
    pub cache_data: Vec<u8>,

    /// Effective TTL of the last emitted record, 0 if no record was emitted.
    pub cache_ttl: u32,

    /// Number of A records in the output.
    pub a_record_count: usize,

    /// Number of A records dropped over the limit.
    pub dropped: usize,
}

impl DnsMessage {
    /// Rewrites this message for sending.
    ///
    /// `dns_id` replaces the transaction id in `send_data`, used when a cached
    /// response is served to a client with a different id.
    ///
    /// Fails if the record scan stopped at an unsupported record: a partially
    /// parsed message is never re-emitted.
    pub fn rewrite(&self, dns_id: Option<u16>, config: &RewriteConfig) -> Result<RewriteOutput> {
        if let Some(record) = self.unsupported_record() {
            return Err(Error::UnknownRecordType(record.clone()));
        }

        let mut header = [0u8; MSG_HEADER_LEN];
        header.copy_from_slice(&self.data()[..MSG_HEADER_LEN]);

        let mut records = Vec::with_capacity(self.data().len());
        let mut a_record_count = 0;
        let mut dropped = 0;
        let mut cache_ttl = 0;

        for record in self.answers().iter().chain(self.authorities()) {
            if record.rtype() == RRType::A {
                if a_record_count >= config.max_a_records() {
                    dropped += 1;
                    continue;
                }
                a_record_count += 1;
            }

            let ttl = config.effective_ttl(record.ttl());
            self.write_record(record, ttl, &mut records);
            cache_ttl = ttl;
        }

        // Only the answer count is patched, authority and additional counts are kept.
        if dropped > 0 {
            let capped = u16::try_from(config.max_a_records()).unwrap_or(u16::MAX);
            debug!(
                "{}: dropped {} A records, answer count set to {}",
                self.question().name(),
                dropped,
                capped
            );
            header[6..8].copy_from_slice(&capped.to_be_bytes());
        }

        let question = self.question_bytes();

        let mut cache_data =
            Vec::with_capacity(MSG_HEADER_LEN + question.len() + records.len());
        cache_data.extend_from_slice(&header[..10]);
        cache_data.extend_from_slice(&[0, 0]); // no additional records in cache
        cache_data.extend_from_slice(question);
        cache_data.extend_from_slice(&records);

        if let Some(id) = dns_id {
            header[..2].copy_from_slice(&id.to_be_bytes());
        }

        let additional = self.additional_bytes();
        let mut send_data = Vec::with_capacity(cache_data.len() + additional.len());
        send_data.extend_from_slice(&header);
        send_data.extend_from_slice(question);
        send_data.extend_from_slice(&records);
        send_data.extend_from_slice(additional);

        Ok(RewriteOutput {
            send_data,
            cache_data,
            cache_ttl,
            a_record_count,
            dropped,
        })
    }

    /// Appends `record` to `out` with its TTL field replaced by `ttl`.
    fn write_record(&self, record: &ResourceRecord, ttl: u32, out: &mut Vec<u8>) {
        let bytes = self.record_bytes(record);
        let ttl_field = record.ttl_field();

        out.extend_from_slice(&bytes[..ttl_field.start]);
        out.extend_from_slice(&ttl.to_be_bytes());
        out.extend_from_slice(&bytes[ttl_field.end..]);
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_ttl, RewriteConfig};
    use crate::{DEFAULT_TTL, MINIMUM_TTL};
    use test_log::test;

    #[test]
    fn test_clamp_ttl() {
        assert_eq!(clamp_ttl(0), MINIMUM_TTL);
        assert_eq!(clamp_ttl(100), 300);
        assert_eq!(clamp_ttl(299), 300);
        assert_eq!(clamp_ttl(300), 300);
        assert_eq!(clamp_ttl(1800), 1800);
        assert_eq!(clamp_ttl(3600), 3600);
        assert_eq!(clamp_ttl(3601), DEFAULT_TTL);
        assert_eq!(clamp_ttl(7200), 3600);
        assert_eq!(clamp_ttl(u32::MAX), 3600);
    }

    #[test]
    fn test_clamp_ttl_random() {
        for _ in 0..10_000 {
            let t = fastrand::u32(..);
            let expected = if t < 300 {
                300
            } else if t > 3600 {
                3600
            } else {
                t
            };
            assert_eq!(clamp_ttl(t), expected, "ttl {}", t);
        }
    }

    #[test]
    fn test_config() {
        let config = RewriteConfig::default();
        assert_eq!(config.minimum_ttl(), 300);
        assert_eq!(config.maximum_ttl(), 3600);
        assert_eq!(config.max_a_records(), 3);

        let config = RewriteConfig::new(60, 600, 1).unwrap();
        assert_eq!(config.effective_ttl(30), 60);
        assert_eq!(config.effective_ttl(86400), 600);

        assert!(RewriteConfig::new(600, 60, 1).is_err());
        let result = RewriteConfig::new(60, 600, 0);
        assert!(result.is_err());
        if let Err(e) = result {
            println!("{}", e);
        }
    }
}
