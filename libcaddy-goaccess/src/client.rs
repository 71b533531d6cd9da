use crate::headers::NormalizedHeaders;

/// Picks the address GoAccess should see as the client.
///
/// The left-most `X-Forwarded-For` entry wins over the connection's peer address. The value is
/// passed through as-is, without checking that it is an IP address. When `remote_addr` is not
/// a valid `host:port` pair it is used unchanged.
pub fn resolve_client_host<'a>(remote_addr: &'a str, headers: &NormalizedHeaders<'a>) -> &'a str {
    if let Some(xff) = headers.get("x-forwarded-for").filter(|v| !v.is_empty()) {
        let first = xff.split_once(',').map_or(xff, |(first, _)| first);
        return first.trim();
    }
    split_host(remote_addr).unwrap_or(remote_addr)
}

/// Host part of `host:port`, `[host]:port` or `[host%zone]:port`.
fn split_host(addr: &str) -> Option<&str> {
    let (host, _port) = addr.rsplit_once(':')?;
    match host.strip_prefix('[') {
        Some(inner) => {
            let inner = inner.strip_suffix(']')?;
            (!inner.contains(['[', ']'])).then_some(inner)
        }
        None => (!host.contains([':', '[', ']'])).then_some(host),
    }
}

#[cfg(test)]
fn resolve(remote_addr: &str, xff: Option<&str>) -> String {
    let mut headers = crate::Headers::new();
    if let Some(xff) = xff {
        headers.insert("X-Forwarded-For".to_string(), vec![xff.to_string()]);
    }
    resolve_client_host(remote_addr, &NormalizedHeaders::new(&headers)).to_string()
}

#[test]
fn test_remote_addr() {
    assert_eq!(resolve("10.0.0.1:443", None), "10.0.0.1");
    assert_eq!(resolve("[2001:db8::1]:8080", None), "2001:db8::1");
    assert_eq!(resolve("[fe80::1%eth0]:80", None), "fe80::1%eth0");
    assert_eq!(resolve("localhost:", None), "localhost");
}

#[test]
fn test_malformed_remote_addr() {
    assert_eq!(resolve("not-a-valid-addr", None), "not-a-valid-addr");
    assert_eq!(resolve("2001:db8::1", None), "2001:db8::1");
    assert_eq!(resolve("[::1]x:80", None), "[::1]x:80");
    assert_eq!(resolve("", None), "");
}

#[test]
fn test_forwarded_for() {
    assert_eq!(resolve("10.0.0.1:443", Some("203.0.113.5, 10.0.0.1")), "203.0.113.5");
    assert_eq!(resolve("10.0.0.1:443", Some("  198.51.100.7  ")), "198.51.100.7");
    assert_eq!(resolve("not-a-valid-addr", Some("unknown,1.2.3.4")), "unknown");
    assert_eq!(resolve("10.0.0.1:443", Some("")), "10.0.0.1");
}
