use std::cell::RefCell;
use std::path::PathBuf;

use subsector_override::catalog::Catalog;
use subsector_override::client::*;
use subsector_override::form::FormState;
use subsector_override::payload::{build_payload, RequestPayload};

/// Replays a canned response and remembers what was posted.
struct FakeTransport {
    response: Result<RawResponse, TransportError>,
    posted: RefCell<Vec<(String, Vec<u8>)>>,
}

impl FakeTransport {
    fn replying(status: u16, body: &[u8]) -> Self {
        FakeTransport {
            response: Ok(RawResponse {
                status,
                body: body.to_vec(),
            }),
            posted: RefCell::new(Vec::new()),
        }
    }

    fn unreachable(message: &str) -> Self {
        FakeTransport {
            response: Err(TransportError(message.to_string())),
            posted: RefCell::new(Vec::new()),
        }
    }
}

impl Transport for &FakeTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse, TransportError> {
        self.posted.borrow_mut().push((url.to_string(), body));
        self.response.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Vec<String>,
}

impl Notifier for RecordingNotifier {
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

fn sample_payload() -> RequestPayload {
    let mut form = FormState::blank(&Catalog::default());
    form.year = "2030".into();
    form.weather_year = "2012".into();
    form.scenario = "baseline".into();
    form.set_percent("cement", "3.5").unwrap();
    build_payload(&form).0
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ═══════════════════════════════════════════════════════════════════════
// Error body parsing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_error_message_extraction() {
    assert_eq!(
        error_message(br#"{"error":"bad year"}"#),
        Some("bad year".to_string())
    );
    assert_eq!(error_message(br#"{"error":42}"#), Some("42".to_string()));
    assert_eq!(error_message(br#"{"error":null}"#), None);
    assert_eq!(error_message(br#"{"message":"nope"}"#), None);
    assert_eq!(error_message(b"<html>Internal Server Error</html>"), None);
    assert_eq!(error_message(b""), None);
}

#[test]
fn test_ok_range() {
    let resp = |status| RawResponse {
        status,
        body: Vec::new(),
    };
    assert!(resp(200).is_ok());
    assert!(resp(204).is_ok());
    assert!(!resp(199).is_ok());
    assert!(!resp(302).is_ok());
    assert!(!resp(500).is_ok());
}

// ═══════════════════════════════════════════════════════════════════════
// send()
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_send_posts_json_to_endpoint() {
    let transport = FakeTransport::replying(200, b"a,b\n1,2\n");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);

    let body = submitter.send(&sample_payload()).expect("send should succeed");
    assert_eq!(body, b"a,b\n1,2\n");

    let posted = transport.posted.borrow();
    assert_eq!(posted.len(), 1, "exactly one request per submit");
    assert_eq!(posted[0].0, "http://localhost:5000/process");
    let sent: serde_json::Value = serde_json::from_slice(&posted[0].1).unwrap();
    assert_eq!(sent["custom_values"]["__ALL_STATES__,cement"], 3.5);
    assert_eq!(sent["year"], "2030");
}

#[test]
fn test_send_server_error() {
    let transport = FakeTransport::replying(500, br#"{"error":"bad year"}"#);
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);

    let err = submitter.send(&sample_payload()).unwrap_err();
    assert!(matches!(err, SubmitError::Server { status: 500, .. }));
    assert_eq!(err.to_string(), "Error: bad year");
}

#[test]
fn test_send_malformed_error_body() {
    let transport = FakeTransport::replying(500, b"Internal Server Error");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);

    let err = submitter.send(&sample_payload()).unwrap_err();
    assert!(matches!(err, SubmitError::MalformedErrorBody { status: 500 }));
    assert_eq!(err.to_string(), "Error: server returned HTTP 500");
}

#[test]
fn test_send_network_failure() {
    let transport = FakeTransport::unreachable("connection refused");
    let submitter = Submitter::new(&transport, "http://localhost:1/process");

    let err = submitter.send(&sample_payload()).unwrap_err();
    assert!(matches!(err, SubmitError::Network { .. }));
    assert_eq!(
        err.to_string(),
        "Error: could not reach http://localhost:1/process: connection refused"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// submit(): download + alerts
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_submit_saves_download() {
    let dir = temp_dir("subsector_override_client_ok");
    let transport = FakeTransport::replying(200, b"subsector,texas\ncement,1.0\n");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);
    let mut notifier = RecordingNotifier::default();

    let path = submitter
        .submit(&sample_payload(), &dir, &mut notifier)
        .expect("submit should succeed");

    assert_eq!(path, dir.join("custom_output.csv"));
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"subsector,texas\ncement,1.0\n"
    );
    assert!(notifier.alerts.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_submit_saves_non_csv_body_unchanged() {
    let dir = temp_dir("subsector_override_client_opaque");
    let body = [0u8, 159, 146, 150, 255];
    let transport = FakeTransport::replying(200, &body);
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);

    let path = submitter
        .submit(&sample_payload(), &dir, &mut RecordingNotifier::default())
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), body);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_submit_alerts_server_message() {
    let dir = temp_dir("subsector_override_client_500");
    let transport = FakeTransport::replying(500, br#"{"error":"bad year"}"#);
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);
    let mut notifier = RecordingNotifier::default();

    assert!(submitter
        .submit(&sample_payload(), &dir, &mut notifier)
        .is_err());
    assert_eq!(notifier.alerts, vec!["Error: bad year".to_string()]);
    assert!(!dir.join("custom_output.csv").exists());
}

#[test]
fn test_submit_alerts_generic_message_for_non_json() {
    let dir = temp_dir("subsector_override_client_html");
    let transport = FakeTransport::replying(500, b"<h1>oops</h1>");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);
    let mut notifier = RecordingNotifier::default();

    let err = submitter
        .submit(&sample_payload(), &dir, &mut notifier)
        .unwrap_err();
    assert!(matches!(err, SubmitError::MalformedErrorBody { .. }));
    assert_eq!(notifier.alerts.len(), 1);
    assert!(notifier.alerts[0].starts_with("Error: "));
}

#[test]
fn test_submit_alerts_network_failure() {
    let dir = temp_dir("subsector_override_client_down");
    let transport = FakeTransport::unreachable("connection refused");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);
    let mut notifier = RecordingNotifier::default();

    assert!(submitter
        .submit(&sample_payload(), &dir, &mut notifier)
        .is_err());
    assert_eq!(notifier.alerts.len(), 1);
    assert!(notifier.alerts[0].contains("could not reach"));
}

#[test]
fn test_each_submit_is_independent() {
    let dir = temp_dir("subsector_override_client_repeat");
    let transport = FakeTransport::replying(200, b"x\n1\n");
    let submitter = Submitter::new(&transport, DEFAULT_ENDPOINT);
    let mut notifier = RecordingNotifier::default();
    let payload = sample_payload();

    let first = submitter.submit(&payload, &dir, &mut notifier).unwrap();
    let second = submitter.submit(&payload, &dir, &mut notifier).unwrap();

    assert_eq!(transport.posted.borrow().len(), 2);
    assert_ne!(first, second);
    assert_eq!(second, dir.join("custom_output (1).csv"));

    let _ = std::fs::remove_dir_all(&dir);
}
