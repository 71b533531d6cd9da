use std::fmt;
use std::io::{Read, Write};

use tracing::debug;

use crate::client::resolve_client_host;
use crate::error::ConvertError;
use crate::filter::Filter;
use crate::format::Line;
use crate::headers::NormalizedHeaders;
use crate::record::LogRecord;

/// A progress line is written to the diagnostic output every this many records.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Record counters for one input stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total: u64,
    pub included: u64,
    pub excluded: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} ({} included, {} excluded)",
            self.total, self.included, self.excluded
        )
    }
}

/// Turns Caddy access log records into GoAccess lines, dropping the ones the [`Filter`]
/// rejects.
#[derive(Debug, Default, Clone)]
pub struct Converter {
    filter: Filter,
}

impl Converter {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }

    /// Returns `None` when the record is filtered out.
    pub fn convert<'a>(&self, record: &'a LogRecord) -> Option<Line<'a>> {
        let request = &record.request;
        let request_headers = NormalizedHeaders::new(&request.headers);
        let client_host = resolve_client_host(&request.remote_addr, &request_headers);

        if let Some(exclusion) = self.filter.exclusion(&request.host, &request.uri, client_host) {
            debug!(host = %request.host, uri = %request.uri, client_host, %exclusion, "Excluding record");
            return None;
        }

        let response_headers = NormalizedHeaders::new(&record.response_headers);
        Some(Line::project(record, client_host, &request_headers, &response_headers))
    }

    /// Converts every record of `reader`, in order, writing one line per kept record to `out`
    /// and a progress line to `diag` every [`PROGRESS_INTERVAL`] records.
    ///
    /// Records are decoded one at a time, so `reader` may be arbitrarily long; wrap it in a
    /// `BufReader` if it isn't buffered already. Decoding stops at the first malformed record.
    /// Lines written before that stay written.
    pub fn run(
        &self,
        reader: impl Read,
        mut out: impl Write,
        mut diag: impl Write,
    ) -> Result<Stats, ConvertError> {
        let mut stats = Stats::default();

        let records = serde_json::Deserializer::from_reader(reader).into_iter::<LogRecord>();
        for record in records {
            let record = record.map_err(|err| ConvertError::from_json(err, stats.total + 1))?;

            match self.convert(&record) {
                Some(line) => {
                    writeln!(out, "{line}")?;
                    stats.included += 1;
                }
                None => stats.excluded += 1,
            }
            stats.total += 1;

            if stats.total % PROGRESS_INTERVAL == 0 {
                writeln!(diag, "{stats}")?;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
fn record(host: &str, uri: &str, remote_addr: &str, xff: Option<&str>) -> LogRecord {
    let mut record = LogRecord::default();
    record.request.host = host.into();
    record.request.uri = uri.into();
    record.request.remote_addr = remote_addr.into();
    if let Some(xff) = xff {
        record.request.headers.insert("X-Forwarded-For".into(), vec![xff.into()]);
    }
    record
}

#[test]
fn test_convert() {
    let converter = Converter::new(Filter {
        include_hosts: "api.".into(),
        exclude_client: "10.".into(),
        exclude_urls: "/healthz".into(),
    });
    let t = |record: LogRecord, expected: Option<&str>| {
        let line = converter.convert(&record).map(|line| line.client_host.to_string());
        assert_eq!(line.as_deref(), expected);
    };

    t(record("api.example.com", "/", "192.0.2.1:5000", None), Some("192.0.2.1"));
    t(record("www.example.com", "/", "192.0.2.1:5000", None), None);
    t(record("api.example.com", "/healthz", "192.0.2.1:5000", None), None);
    t(record("api.example.com", "/", "10.0.0.1:443", None), None);
    // Behind a proxy on 10.0.0.0/8, the forwarded client is what gets filtered
    t(record("api.example.com", "/", "10.0.0.1:443", Some("203.0.113.5, 10.0.0.1")), Some("203.0.113.5"));
    t(record("api.example.com", "/", "192.0.2.1:5000", Some("10.1.1.1")), None);
}

#[test]
fn test_convert_leaves_record_untouched() {
    let converter = Converter::default();
    let mut original = record("example.com", "/", "10.0.0.1:443", Some("203.0.113.5"));
    original.request.headers.insert("Accept".into(), vec!["a".into(), "b".into()]);
    original.request.headers.insert("accept".into(), vec![]);
    let copy = original.clone();

    assert!(converter.convert(&original).is_some());
    assert_eq!(original, copy);
}

#[test]
fn test_stats_display() {
    let stats = Stats { total: 2000, included: 1500, excluded: 500 };
    assert_eq!(stats.to_string(), "processed 2000 (1500 included, 500 excluded)");
}
