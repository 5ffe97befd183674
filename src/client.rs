use crate::download;
use crate::payload::RequestPayload;
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use snafu::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/process";

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportError {}

pub trait Transport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse, TransportError>;
}

/// Blocking `reqwest` transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// `None` disables the request timeout entirely.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| TransportError(e.to_string()))?;
        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Errors & alerts
// ═══════════════════════════════════════════════════════════════════════

/// Every variant renders as the text shown to the user.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SubmitError {
    #[snafu(display("Error: could not encode request: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("Error: could not reach {endpoint}: {source}"))]
    Network {
        endpoint: String,
        source: TransportError,
    },

    #[snafu(display("Error: {message}"))]
    Server { status: u16, message: String },

    #[snafu(display("Error: server returned HTTP {status}"))]
    MalformedErrorBody { status: u16 },

    #[snafu(display("Error: could not save {}: {source}", path.display()))]
    Save {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Pulls the `error` field out of a failure body.
///
/// A string is taken verbatim; any other JSON value is shown in its JSON form.
pub fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("error")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Where user-facing failures are presented.
pub trait Notifier {
    fn alert(&mut self, message: &str);
}

// ═══════════════════════════════════════════════════════════════════════
// Submission
// ═══════════════════════════════════════════════════════════════════════

pub struct Submitter<T: Transport> {
    transport: T,
    endpoint: String,
}

impl<T: Transport> Submitter<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Submitter {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one request and returns the success body.
    pub fn send(&self, payload: &RequestPayload) -> Result<Vec<u8>, SubmitError> {
        let body = payload.to_json_bytes().context(EncodeSnafu)?;
        debug!("POST {} ({} bytes)", self.endpoint, body.len());

        let resp = self
            .transport
            .post_json(&self.endpoint, body)
            .context(NetworkSnafu {
                endpoint: self.endpoint.as_str(),
            })?;
        debug!("HTTP {} ({} bytes)", resp.status, resp.body.len());

        if resp.is_ok() {
            return Ok(resp.body);
        }
        match error_message(&resp.body) {
            Some(message) => ServerSnafu {
                status: resp.status,
                message,
            }
            .fail(),
            None => MalformedErrorBodySnafu {
                status: resp.status,
            }
            .fail(),
        }
    }

    /// Sends the payload and saves the body under `output_dir`.
    ///
    /// Failures are alerted through `notifier` before being returned.
    pub fn submit(
        &self,
        payload: &RequestPayload,
        output_dir: &Path,
        notifier: &mut dyn Notifier,
    ) -> Result<PathBuf, SubmitError> {
        info!(
            "Submitting year={} scenario={} weather_year={} ({} overrides)",
            payload.year,
            payload.scenario,
            payload.weather_year,
            payload.custom_values.len()
        );
        let result = self
            .send(payload)
            .and_then(|body| download::save_download(&body, output_dir));
        match &result {
            Ok(path) => info!("Saved response to {}", path.display()),
            Err(e) => notifier.alert(&e.to_string()),
        }
        result
    }
}
