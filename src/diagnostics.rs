//! Reporting of records the scanner could not size.
//!
//! Parsing never writes to a sink by itself. The caller decides whether to
//! forward [UnsupportedRecord]s, see [DnsMessage::report_unsupported](crate::DnsMessage::report_unsupported).

#[cfg(feature = "logging")]
use crate::debug;

use crate::error::UnsupportedRecord;
use flume::{Sender, TrySendError};

/// A consumer of record parse failures, e.g. a log or a channel to a collector.
pub trait DiagnosticsSink {
    fn record_parse_error(&self, record: &UnsupportedRecord);
}

/// Sends a copy of each record into a channel without blocking.
///
/// If the channel is full or closed, the record is dropped.
impl DiagnosticsSink for Sender<UnsupportedRecord> {
    fn record_parse_error(&self, record: &UnsupportedRecord) {
        if let Err(e) = self.try_send(record.clone()) {
            match e {
                TrySendError::Full(_) => debug!("diagnostics channel is full, record dropped"),
                TrySendError::Disconnected(_) => {
                    debug!("diagnostics channel is closed, record dropped")
                }
            }
        }
    }
}

/// Writes each record to the log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record_parse_error(&self, record: &UnsupportedRecord) {
        debug!(
            "record parse error: rtype {} nlen {} data {:x?}",
            record.rtype,
            record.name_length,
            &record.data
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosticsSink, LogSink};
    use crate::UnsupportedRecord;
    use test_log::test;

    fn opt_record() -> UnsupportedRecord {
        UnsupportedRecord {
            rtype: 41,
            name_length: 1,
            data: vec![0, 0, 41, 0x10, 0, 0, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = flume::bounded(1);
        tx.record_parse_error(&opt_record());
        // The channel is full now: this one is dropped.
        tx.record_parse_error(&opt_record());

        assert_eq!(rx.try_recv().unwrap(), opt_record());
        assert!(rx.try_recv().is_err());

        drop(rx);
        tx.record_parse_error(&opt_record());
    }

    #[test]
    fn test_log_sink() {
        LogSink.record_parse_error(&opt_record());
        let sink: &dyn DiagnosticsSink = &LogSink;
        sink.record_parse_error(&opt_record());
    }
}
