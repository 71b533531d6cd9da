use anyhow::Result;
use libcaddy_goaccess::{ConvertError, Converter, Filter, LOG_FORMAT, PROGRESS_INTERVAL, Stats};

const PROXIED: &str = r#"{"level":"info","ts":1700000000.789,"logger":"http.log.access","msg":"handled request","request":{"remote_addr":"10.0.0.1:443","proto":"HTTP/1.1","method":"GET","host":"www.example.com","uri":"/index.html","headers":{"X-Forwarded-For":["203.0.113.5, 10.0.0.1"],"Referer":["https://www.example.com/"],"User-Agent":["Mozilla/5.0"]},"tls":{"resumed":false,"version":772,"cipher_suite":4865,"proto":"h2","server_name":"www.example.com"}},"duration":0.001234,"size":1024,"status":200,"resp_headers":{"Content-Type":["text/html; charset=utf-8"]}}"#;

const INTERNAL: &str = r#"{"ts":1700000001.5,"request":{"remote_addr":"192.168.1.20:51234","method":"POST","host":"www.example.com","uri":"/api","headers":{}},"duration":0.5,"size":0,"status":204,"resp_headers":{}}"#;

fn run(converter: &Converter, input: &str) -> (Result<Stats, ConvertError>, String, String) {
    let mut out = Vec::new();
    let mut diag = Vec::new();
    let result = converter.run(input.as_bytes(), &mut out, &mut diag);
    (
        result,
        String::from_utf8(out).unwrap(),
        String::from_utf8(diag).unwrap(),
    )
}

#[test]
fn test_exclude_client_end_to_end() -> Result<()> {
    let converter = Converter::new(Filter {
        exclude_client: "192.168.".into(),
        ..Filter::default()
    });
    let input = format!("{PROXIED}\n{INTERNAL}\n");

    let (stats, out, diag) = run(&converter, &input);
    let stats = stats?;

    assert_eq!(stats, Stats { total: 2, included: 1, excluded: 1 });
    assert_eq!(
        out,
        "1700000000\twww.example.com\t203.0.113.5\tGET\t/index.html\t200\t1024\thttps://www.example.com/\tMozilla/5.0\ttext/html\t0.001234\n"
    );
    assert_eq!(diag, "");
    Ok(())
}

#[test]
fn test_concatenated_without_newlines() -> Result<()> {
    let input = format!("  {INTERNAL}{PROXIED}\r\n\t{INTERNAL}  ");

    let (stats, out, _) = run(&Converter::default(), &input);

    assert_eq!(stats?, Stats { total: 3, included: 3, excluded: 0 });
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("1700000001\twww.example.com\t192.168.1.20\tPOST\t/api\t204\t0\t"));
    assert!(lines[1].starts_with("1700000000\t"));
    assert!(lines.iter().all(|line| line.split('\t').count() == LOG_FORMAT.split(r"\t").count()));
    Ok(())
}

#[test]
fn test_empty_input() -> Result<()> {
    let (stats, out, diag) = run(&Converter::default(), " \n ");
    assert_eq!(stats?, Stats::default());
    assert_eq!(out, "");
    assert_eq!(diag, "");
    Ok(())
}

#[test]
fn test_progress() -> Result<()> {
    let converter = Converter::new(Filter {
        include_hosts: "api.".into(),
        ..Filter::default()
    });
    let records = 2 * PROGRESS_INTERVAL + 1;
    let input: String = (0..records)
        .map(|i| if i % 4 == 0 { PROXIED.replace("www.", "api.") } else { INTERNAL.to_string() })
        .collect();

    let (stats, out, diag) = run(&converter, &input);

    assert_eq!(stats?, Stats { total: 2001, included: 501, excluded: 1500 });
    assert_eq!(out.lines().count(), 501);
    assert_eq!(
        diag,
        "processed 1000 (250 included, 750 excluded)\nprocessed 2000 (500 included, 1500 excluded)\n"
    );
    Ok(())
}

#[test]
fn test_decode_error_keeps_earlier_lines() {
    let input = format!("{PROXIED}\n{INTERNAL}\n{{\"ts\": oops}}\n{PROXIED}\n");

    let (result, out, _) = run(&Converter::default(), &input);

    match result {
        Err(ConvertError::InvalidRecord { index, .. }) => assert_eq!(index, 3),
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn test_wrong_field_type() {
    let input = r#"{"status":"200"}"#;
    let (result, out, _) = run(&Converter::default(), input);

    assert!(matches!(result, Err(ConvertError::InvalidRecord { index: 1, .. })));
    assert_eq!(out, "");
}

#[test]
fn test_null_fields_are_not_fatal() -> Result<()> {
    let input = r#"{"ts":1,"request":{"host":"a","uri":null,"headers":null},"resp_headers":null}"#;

    let (stats, out, _) = run(&Converter::default(), input);

    assert_eq!(stats?, Stats { total: 1, included: 1, excluded: 0 });
    assert_eq!(out, "1\ta\t\t\t\t0\t0\t\t\t\t0\n");
    Ok(())
}
