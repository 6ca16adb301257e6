//! Black-box CLI integration test: `beacon issues list` driven end to end
//! through the compiled binary against a hand-rolled loopback HTTP server.
//!
//! A tiny raw-socket listener stands in for the service instead of pulling
//! in a mock-HTTP crate, since the full `reqwest`/`tokio` stack is already
//! a dependency and a real socket exercises the transport unmodified.

use assert_cmd::Command;
use predicates::str::contains;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

/// Minimal canned HTTP/1.1 responder: reads and discards the request line
/// and headers, then writes back a fixed status/body keyed on the request
/// path. Good enough for one request per connection, which is all this
/// client ever sends per endpoint in a single-page `list` invocation.
fn serve_one(stream: TcpStream) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("read request line");

    let mut line = String::new();
    loop {
        line.clear();
        reader.read_line(&mut line).expect("read header line");
        if line == "\r\n" || line.is_empty() {
            break;
        }
    }

    let mut stream = stream;
    if request_line.contains("/users/me/regions/") {
        write_response(&mut stream, 404, &[], "{}");
    } else if request_line.contains("/projects/acme/frontend/issues/") {
        let body = serde_json::json!([
            {
                "id": "1",
                "shortId": "FRONTEND-1",
                "title": "Something broke in checkout",
                "level": "error",
                "count": "42",
                "userCount": 7,
                "firstSeen": "2026-01-01T00:00:00Z",
                "lastSeen": "2026-01-02T00:00:00Z",
                "project": {"slug": "frontend"},
                "permalink": "https://beacon.sh/organizations/acme/issues/1/"
            }
        ])
        .to_string();
        write_response(&mut stream, 200, &[], &body);
    } else {
        write_response(&mut stream, 404, &[], "{}");
    }
}

fn write_response(stream: &mut TcpStream, status: u16, extra_headers: &[&str], body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let mut headers = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for h in extra_headers {
        headers.push_str(h);
        headers.push_str("\r\n");
    }
    headers.push_str("\r\n");
    stream.write_all(headers.as_bytes()).expect("write headers");
    stream.write_all(body.as_bytes()).expect("write body");
    stream.flush().expect("flush response");
}

fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback port");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        // Two requests expected per invocation: the region-directory
        // probe, then the issues page itself.
        for stream in listener.incoming().take(2) {
            if let Ok(stream) = stream {
                serve_one(stream);
            }
        }
    });

    format!("http://{addr}")
}

#[test]
fn issues_list_json_reports_one_issue_for_explicit_target() {
    let base_url = spawn_server();
    let config_dir = tempfile::tempdir().expect("tempdir");

    let mut cmd = Command::cargo_bin("beacon").expect("find beacon binary");
    cmd.arg("issues")
        .arg("list")
        .arg("acme/frontend")
        .arg("--json")
        .env("BEACON_CONFIG_DIR", config_dir.path())
        .env("BEACON_BASE_URL", &base_url)
        .env("BEACON_AUTH_TOKEN", "test-token")
        .env_remove("BEACON_ORG")
        .env_remove("BEACON_PROJECT");

    cmd.assert().success().stdout(contains("FRONTEND-1")).stdout(contains("\"hasMore\":false"));
}

#[test]
fn issues_list_rejects_bare_numeric_target() {
    let config_dir = tempfile::tempdir().expect("tempdir");

    let mut cmd = Command::cargo_bin("beacon").expect("find beacon binary");
    cmd.arg("issues")
        .arg("list")
        .arg("424242")
        .env("BEACON_CONFIG_DIR", config_dir.path())
        .env("BEACON_AUTH_TOKEN", "test-token");

    cmd.assert().failure().stderr(contains("not a listable target"));
}
