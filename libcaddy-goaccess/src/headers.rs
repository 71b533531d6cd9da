use std::collections::HashMap;

use crate::record::Headers;

/// Single-valued, case-insensitive view over a [`Headers`] map.
///
/// Only the first value of each header is kept, and names with no values are dropped. When
/// several names differ only in case, they are visited in the map's byte order and the last
/// one wins, so `x-test` shadows `X-Test`. Don't rely on which one survives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizedHeaders<'a> {
    map: HashMap<String, &'a str>,
}

impl<'a> NormalizedHeaders<'a> {
    pub fn new(headers: &'a Headers) -> Self {
        let mut map = HashMap::with_capacity(headers.len());
        for (name, values) in headers {
            let Some(first) = values.first() else {
                continue;
            };
            map.insert(name.to_lowercase(), first.as_str());
        }
        Self { map }
    }

    /// `name` must already be lowercase.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.map.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a str)> + '_ {
        self.map.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

#[cfg(test)]
fn headers<const N: usize>(entries: [(&str, &[&str]); N]) -> Headers {
    entries
        .into_iter()
        .map(|(name, values)| {
            let values = values.iter().map(|v| v.to_string()).collect();
            (name.to_string(), values)
        })
        .collect()
}

#[test]
fn test_first_value() {
    let h = headers([("X-Test", &["a", "b"]), ("Accept", &["*/*"])]);
    let normalized = NormalizedHeaders::new(&h);

    assert_eq!(normalized.len(), 2);
    assert_eq!(normalized.get("x-test"), Some("a"));
    assert_eq!(normalized.get("accept"), Some("*/*"));
    assert_eq!(normalized.get("X-Test"), None);
}

#[test]
fn test_empty_values_skipped() {
    let h = headers([("Referer", &[]), ("User-Agent", &["curl/8.0"])]);
    let normalized = NormalizedHeaders::new(&h);

    assert_eq!(normalized.get("referer"), None);
    assert_eq!(normalized.get("user-agent"), Some("curl/8.0"));
    assert!(NormalizedHeaders::new(&Headers::new()).is_empty());
}

#[test]
fn test_idempotent() {
    let h = headers([("x-forwarded-for", &["203.0.113.5"]), ("referer", &["https://a/"])]);
    let once = NormalizedHeaders::new(&h);

    let again: Headers = once
        .iter()
        .map(|(name, value)| (name.to_string(), vec![value.to_string()]))
        .collect();
    assert_eq!(NormalizedHeaders::new(&again), once);
    assert_eq!(h, again);
}

#[test]
fn test_case_collapse() {
    let h = headers([("X-Test", &["upper"]), ("x-test", &["lower"]), ("X-TEST", &["shout"])]);
    let normalized = NormalizedHeaders::new(&h);

    // "X-TEST" < "X-Test" < "x-test" byte-wise
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized.get("x-test"), Some("lower"));
}
