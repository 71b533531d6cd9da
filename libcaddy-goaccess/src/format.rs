use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::headers::NormalizedHeaders;
use crate::record::LogRecord;

/// Value for GoAccess's `--log-format` matching the lines [`Line`] prints.
///
/// The `\t` are literal backslash-t sequences; GoAccess expands them itself.
//
// TS VHost ClientIP Method URI Status Size Referer UserAgent MimeType Duration
// %x %v    %h       %m     %U  %s     %b   %R      %u        %M       %T
pub const LOG_FORMAT: &str = r"%x\t%v\t%h\t%m\t%U\t%s\t%b\t%R\t%u\t%M\t%T";

/// RFC 2045 token characters.
const TOKEN: &str = r"[!#$%&'*+\-.0-9A-Z^_`a-z{|}~]+";

/// `type` or `type/subtype`.
static MEDIA_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{TOKEN}(?:/{TOKEN})?$")).unwrap());

/// One `name=value` parameter, the value being a token or a quoted string.
static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"^\s*({TOKEN})\s*=\s*(?:({TOKEN})|"((?:[^"\\]|\\.)*)")\s*$"#)).unwrap()
});

/// Media type of a `Content-Type` value, lowercased and without parameters.
///
/// Yields `""` for a missing or malformed media type, and when a parameter is repeated with a
/// different value. Otherwise malformed parameters are ignored, so `text/html; charset` still
/// gives `text/html`.
pub fn mime_type(content_type: Option<&str>) -> Cow<'_, str> {
    let Some(content_type) = content_type else {
        return Cow::Borrowed("");
    };
    let (media_type, parameters) = content_type.split_once(';').unwrap_or((content_type, ""));
    let media_type = media_type.trim();
    if !MEDIA_TYPE.is_match(media_type) || has_conflicting_parameters(parameters) {
        return Cow::Borrowed("");
    }
    if media_type.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(media_type.to_ascii_lowercase())
    } else {
        Cow::Borrowed(media_type)
    }
}

/// Whether a parameter name (case-insensitive) appears twice with different values. Scanning
/// stops at the first malformed parameter.
fn has_conflicting_parameters(parameters: &str) -> bool {
    let mut seen = HashMap::new();
    for parameter in parameters.split(';') {
        let Some(caps) = PARAMETER.captures(parameter) else {
            break;
        };
        let name = caps[1].to_ascii_lowercase();
        let value = match caps.get(2) {
            Some(token) => token.as_str().to_string(),
            None => unquote(&caps[3]),
        };
        match seen.entry(name) {
            Entry::Occupied(entry) if *entry.get() != value => return true,
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    false
}

/// Body of a quoted string with its backslash escapes resolved.
fn unquote(quoted: &str) -> String {
    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(chars.next()),
            c => value.push(c),
        }
    }
    value
}

/// One output line, ready to be printed with `{}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    pub timestamp: i64,
    pub host: &'a str,
    pub client_host: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub status: i64,
    pub size: i64,
    pub referer: &'a str,
    pub user_agent: &'a str,
    pub mime_type: Cow<'a, str>,
    pub duration: f64,
}

impl<'a> Line<'a> {
    pub fn project(
        record: &'a LogRecord,
        client_host: &'a str,
        request_headers: &NormalizedHeaders<'a>,
        response_headers: &NormalizedHeaders<'a>,
    ) -> Self {
        Line {
            // Truncated, not rounded
            timestamp: record.timestamp as i64,
            host: &record.request.host,
            client_host,
            method: &record.request.method,
            uri: &record.request.uri,
            status: record.status,
            size: record.size,
            referer: request_headers.get("referer").unwrap_or_default(),
            user_agent: request_headers.get("user-agent").unwrap_or_default(),
            mime_type: mime_type(response_headers.get("content-type")),
            duration: record.duration,
        }
    }
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // f64's Display is the shortest exact round-trip form, without exponent
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.timestamp,
            self.host,
            self.client_host,
            self.method,
            self.uri,
            self.status,
            self.size,
            self.referer,
            self.user_agent,
            self.mime_type,
            self.duration,
        )
    }
}

#[test]
fn test_log_format() {
    assert_eq!(LOG_FORMAT, "%x\\t%v\\t%h\\t%m\\t%U\\t%s\\t%b\\t%R\\t%u\\t%M\\t%T");
    assert_eq!(LOG_FORMAT.split(r"\t").count(), 11);
}

#[test]
fn test_mime_type() {
    let t = |input: Option<&str>, expected: &str| assert_eq!(mime_type(input), expected);

    t(Some("text/html; charset=utf-8"), "text/html");
    t(Some("application/json"), "application/json");
    t(Some("  Text/HTML ;charset=UTF-8"), "text/html");
    t(Some("image/svg+xml"), "image/svg+xml");
    t(Some("text"), "text");
    t(Some("text/html; charset"), "text/html");
    t(Some("text/"), "");
    t(Some("/html"), "");
    t(Some("text/html/x"), "");
    t(Some("text html"), "");
    t(Some(""), "");
    t(Some("; charset=utf-8"), "");
    t(None, "");
}

#[test]
fn test_mime_type_repeated_parameters() {
    let t = |input: &str, expected: &str| assert_eq!(mime_type(Some(input)), expected);

    t("text/html; charset=a; charset=b", "");
    t("text/html; Charset=a; charset=\"b\"", "");
    t("text/html; charset=a; CHARSET=a", "text/html");
    t("text/html; charset=\"a\"; charset=a", "text/html");
    t(r#"text/html; q="a\"b"; q="a\"b""#, "text/html");
    t("text/html; charset=utf-8;", "text/html");
    t("text/html; charset=a; boundary=b", "text/html");
    // Nothing after a malformed parameter is looked at
    t("text/html; bogus; charset=a; charset=b", "text/html");
}

#[test]
fn test_project() -> anyhow::Result<()> {
    let record: LogRecord = serde_json::from_str(
        r#"{"ts":1700000000.789,"request":{"remote_addr":"10.0.0.1:443","method":"GET","host":"example.com","uri":"/a?b=c","headers":{"Referer":["https://example.com/"],"User-Agent":["curl/8.4.0","ignored"]}},"duration":0.001234,"size":512,"status":404,"resp_headers":{"Content-Type":["text/html; charset=utf-8"]}}"#,
    )?;
    let request_headers = NormalizedHeaders::new(&record.request.headers);
    let response_headers = NormalizedHeaders::new(&record.response_headers);
    let line = Line::project(&record, "10.0.0.1", &request_headers, &response_headers);

    assert_eq!(line.timestamp, 1700000000);
    assert_eq!(line.mime_type, "text/html");
    assert_eq!(line.duration.to_string().parse::<f64>()?, 0.001234);
    assert_eq!(
        line.to_string(),
        "1700000000\texample.com\t10.0.0.1\tGET\t/a?b=c\t404\t512\thttps://example.com/\tcurl/8.4.0\ttext/html\t0.001234"
    );
    Ok(())
}

#[test]
fn test_project_empty() {
    let record = LogRecord::default();
    let headers = NormalizedHeaders::default();
    let line = Line::project(&record, "", &headers, &headers);

    assert_eq!(line.to_string(), "0\t\t\t\t\t0\t0\t\t\t\t0");
    assert_eq!(line.to_string().split('\t').count(), 11);
}

#[test]
fn test_number_formatting() {
    let t = |timestamp: f64, duration: f64, expected: &str| {
        let record = LogRecord { timestamp, duration, ..LogRecord::default() };
        let headers = NormalizedHeaders::default();
        let line = Line::project(&record, "", &headers, &headers).to_string();
        let fields: Vec<_> = line.split('\t').collect();
        assert_eq!(format!("{} {}", fields[0], fields[10]), expected);
    };

    t(1700000000.789, 0.001234, "1700000000 0.001234");
    t(1700000000.999999, 1.0, "1700000000 1");
    t(1646861401.5241024, 0.000929675, "1646861401 0.000929675");
    t(1.5, 0.1 + 0.2, "1 0.30000000000000004");
    t(0.0, 1e-7, "0 0.0000001");
    t(0.0, 12.5, "0 12.5");
}
