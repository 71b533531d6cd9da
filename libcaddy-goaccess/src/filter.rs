use std::fmt;

/// Prefix rules deciding which records make it into the output. An empty prefix disables its
/// rule.
///
/// Matching is byte-exact and anchored at the start: no case folding, no substring search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Keep only requests whose `Host` starts with this.
    pub include_hosts: String,
    /// Drop requests whose resolved client address starts with this.
    pub exclude_client: String,
    /// Drop requests whose URI starts with this.
    pub exclude_urls: String,
}

/// Which rule rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Host,
    Url,
    Client,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Exclusion::Host => "host not included",
            Exclusion::Url => "url excluded",
            Exclusion::Client => "client excluded",
        })
    }
}

impl Filter {
    /// Returns the first rule that rejects the request, checking host, then URL, then client.
    pub fn exclusion(&self, host: &str, uri: &str, client_host: &str) -> Option<Exclusion> {
        if !self.include_hosts.is_empty() && !host.starts_with(&self.include_hosts) {
            return Some(Exclusion::Host);
        }
        if !self.exclude_urls.is_empty() && uri.starts_with(&self.exclude_urls) {
            return Some(Exclusion::Url);
        }
        if !self.exclude_client.is_empty() && client_host.starts_with(&self.exclude_client) {
            return Some(Exclusion::Client);
        }
        None
    }
}

#[test]
fn test_disabled() {
    let filter = Filter::default();
    assert_eq!(filter.exclusion("", "", ""), None);
    assert_eq!(filter.exclusion("www.example.com", "/admin", "10.0.0.1"), None);
}

#[test]
fn test_rules() {
    let t = |filter: Filter, expected: Option<Exclusion>| {
        assert_eq!(filter.exclusion("api.example.com", "/healthz", "10.0.0.1"), expected);
    };

    let include = |p: &str| Filter { include_hosts: p.into(), ..Filter::default() };
    let urls = |p: &str| Filter { exclude_urls: p.into(), ..Filter::default() };
    let client = |p: &str| Filter { exclude_client: p.into(), ..Filter::default() };

    t(include("api."), None);
    t(include("api.example.com"), None);
    t(include("www."), Some(Exclusion::Host));
    t(include("API."), Some(Exclusion::Host));
    t(include("example.com"), Some(Exclusion::Host));
    t(urls("/health"), Some(Exclusion::Url));
    t(urls("/static"), None);
    t(urls("healthz"), None);
    t(client("10."), Some(Exclusion::Client));
    t(client("192.168."), None);
    t(client("0.1"), None);
}

#[test]
fn test_short_circuit() {
    let filter = Filter {
        include_hosts: "api.".into(),
        exclude_client: "10.".into(),
        exclude_urls: "/".into(),
    };
    assert_eq!(filter.exclusion("www.example.com", "/", "10.0.0.1"), Some(Exclusion::Host));
    assert_eq!(filter.exclusion("api.example.com", "/", "10.0.0.1"), Some(Exclusion::Url));
    assert_eq!(filter.exclusion("api.example.com", "x", "10.0.0.1"), Some(Exclusion::Client));
    assert_eq!(filter.exclusion("api.example.com", "x", "127.0.0.1"), None);
}
