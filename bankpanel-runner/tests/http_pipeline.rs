//! FDIC pipeline driven through the real HTTP client against a local server.

use bankpanel_core::data::{read_panel_rows, FdicClient, SilentProgress};
use bankpanel_runner::{run_fdic_pipeline, PipelineConfig};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;

/// Serves the directory, a persistent 500 for every Acme financials query and
/// one valid filing for anyone else. Runs until the test process exits.
fn serve_bankfind() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let directory = json!({
        "data": [
            {"data": {"NAMEHCR": "Acme Holding", "ZIP": "10001"}},
            {"data": {"NAMEHCR": "Beta Bank", "ZIP": "20002"}}
        ],
        "totals": {"count": 2}
    })
    .to_string();
    let beta = json!({
        "data": [{"data": {
            "ID": "b1", "NAMEHCR": "Beta Bank", "ZIP": "20002", "REPDTE": "20210331",
            "CLCODE": 21, "ASSET": 40.0
        }}],
        "totals": {"count": 1}
    })
    .to_string();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
            }

            let (status, body) = if request_line.contains("/institutions") {
                (200, directory.as_str())
            } else if request_line.contains("Acme") {
                (500, "")
            } else {
                (200, beta.as_str())
            };
            let response = format!(
                "HTTP/1.1 {status} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
    });
    format!("http://{addr}/")
}

#[test]
fn one_failing_institution_does_not_trip_the_provider() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.fdic.base_url = serve_bankfind();
    config.output.dir = tmp.path().to_path_buf();
    config.pool.workers = 1;
    config.transport.base_delay_ms = 0;
    config.transport.min_request_interval_ms = 0;
    // Retry budget larger than the breaker threshold.
    assert!(config.transport.max_retries + 1 > config.transport.breaker_failure_threshold);

    let client = FdicClient::new(
        config.fdic.base_url.as_str(),
        &config.transport_settings(),
        Arc::new(config.circuit_breaker()),
        Arc::new(config.throttle()),
    )
    .unwrap();

    let summary = run_fdic_pipeline(&client, &config, &SilentProgress).unwrap();
    assert_eq!(summary.institutions, 2);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].name, "Acme Holding");
    assert!(summary.failures[0].error.contains("500"));

    let rows = read_panel_rows(&config.fdic_path()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Beta Bank");
    assert_eq!(rows[0].total_assets, Some(40.0));
}
