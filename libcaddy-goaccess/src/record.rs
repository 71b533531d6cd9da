use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Header names exactly as Caddy logged them, each with every value in the order received.
///
/// Sorted so that collapsing differently-cased names in [`crate::NormalizedHeaders`] is
/// deterministic.
pub type Headers = BTreeMap<String, Vec<String>>;

/// One line of Caddy's `http.log.access` logger.
///
/// Unknown keys are ignored, and missing or `null` keys take their zero value.
#[derive(Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogRecord {
    #[serde(rename = "ts", deserialize_with = "null_as_default")]
    pub timestamp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub logger: String,
    #[serde(rename = "msg", deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub request: Request,
    #[serde(deserialize_with = "null_as_default")]
    pub duration: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub size: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
    #[serde(rename = "resp_headers", deserialize_with = "deserialize_headers")]
    pub response_headers: Headers,
}

#[derive(Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Request {
    #[serde(deserialize_with = "null_as_default")]
    pub remote_addr: String,
    #[serde(deserialize_with = "null_as_default")]
    pub proto: String,
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub uri: String,
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: Headers,
    #[serde(deserialize_with = "null_as_default")]
    pub tls: Tls,
}

#[derive(Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Tls {
    #[serde(deserialize_with = "null_as_default")]
    pub resumed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub version: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub cipher_suite: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub proto: String,
    #[serde(deserialize_with = "null_as_default")]
    pub proto_mutual: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub server_name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A `null` map, value list or value is read as empty.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Headers, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Vec<Option<String>>>>> =
        Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, values)| {
            let values = values.unwrap_or_default().into_iter().map(Option::unwrap_or_default);
            (name, values.collect())
        })
        .collect())
}

#[test]
fn test_deserialize() -> anyhow::Result<()> {
    let log: LogRecord = serde_json::from_str(
        r#"{"level":"info","ts":1646861401.5241024,"logger":"http.log.access.log0","msg":"handled request","request":{"remote_addr":"127.0.0.1:41342","proto":"HTTP/2.0","method":"GET","host":"example.com","uri":"/","headers":{"User-Agent":["curl/7.82.0"],"Accept":["*/*"]},"tls":{"resumed":false,"version":772,"cipher_suite":4865,"proto":"h2","proto_mutual":true,"server_name":"example.com"}},"user_id":"","duration":0.000929675,"size":10900,"status":200,"resp_headers":{"Server":["Caddy"],"Content-Type":["text/html; charset=utf-8"]}}"#,
    )?;

    assert_eq!(log.timestamp, 1646861401.5241024);
    assert_eq!(log.logger, "http.log.access.log0");
    assert_eq!(log.request.remote_addr, "127.0.0.1:41342");
    assert_eq!(log.request.headers["User-Agent"], ["curl/7.82.0"]);
    assert_eq!(log.request.tls.cipher_suite, 4865);
    assert!(log.request.tls.proto_mutual);
    assert_eq!(log.duration, 0.000929675);
    assert_eq!(log.size, 10900);
    assert_eq!(log.status, 200);
    assert_eq!(log.response_headers["Content-Type"], ["text/html; charset=utf-8"]);
    Ok(())
}

#[test]
fn test_missing_fields() -> anyhow::Result<()> {
    let log: LogRecord = serde_json::from_str(r#"{"request":{"host":"example.com"}}"#)?;

    assert_eq!(log.request.host, "example.com");
    assert_eq!(log.request.uri, "");
    assert!(log.request.headers.is_empty());
    assert_eq!(log.status, 0);
    assert_eq!(log.timestamp, 0.0);
    Ok(())
}

#[test]
fn test_null_fields() -> anyhow::Result<()> {
    let log: LogRecord = serde_json::from_str(
        r#"{"ts":null,"msg":null,"request":{"host":"a","uri":null,"headers":null,"tls":null},"size":null,"status":404,"resp_headers":{"Content-Type":null,"Server":[null,"Caddy"]}}"#,
    )?;

    assert_eq!(log.timestamp, 0.0);
    assert_eq!(log.message, "");
    assert_eq!(log.request.host, "a");
    assert_eq!(log.request.uri, "");
    assert!(log.request.headers.is_empty());
    assert_eq!(log.request.tls, Tls::default());
    assert_eq!(log.size, 0);
    assert_eq!(log.status, 404);
    assert_eq!(log.response_headers["Content-Type"], Vec::<String>::new());
    assert_eq!(log.response_headers["Server"], ["", "Caddy"]);

    let log: LogRecord = serde_json::from_str(r#"{"request":null,"resp_headers":null}"#)?;
    assert_eq!(log, LogRecord::default());
    Ok(())
}
