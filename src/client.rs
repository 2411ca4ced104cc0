//! Blocking HTTP client for the Nature Remo cloud API.
//!
//! - Blocking client using `ureq` (no async).
//! - Bearer-token auth on every request.
//! - Every request is bounded by one global timeout; an expired request commits nothing.
//! - No retries: the caller decides what to do with a failure.

use crate::snapshot::{NormalizeError, Snapshot, normalize};
use http::StatusCode;
use log::debug;
use serde_json::Value;
use std::time::Duration;

pub const BASE_URL: &str = "https://api.nature.global/1/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Coarse classification of a failed API call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Auth,
    MalformedData,
    Unknown,
}

impl ErrorKind {
    /// Reason code shown to a user setting up an account.
    pub fn reason(self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "cannot_connect",
            ErrorKind::Auth => "invalid_auth",
            ErrorKind::MalformedData | ErrorKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot connect: {0}")]
    Connectivity(String),
    #[error("{path}: access token rejected (http {status})")]
    Auth { path: String, status: u16 },
    #[error("malformed response: {0}")]
    Malformed(#[from] NormalizeError),
    #[error("{0}")]
    Unknown(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Connectivity(_) => ErrorKind::Connectivity,
            ClientError::Auth { .. } => ErrorKind::Auth,
            ClientError::Malformed(_) => ErrorKind::MalformedData,
            ClientError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

pub struct RemoClient {
    agent: ureq::Agent,
    base_url: String,
    access_token: String,
}

impl RemoClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_options(BASE_URL, access_token, DEFAULT_TIMEOUT)
    }

    pub fn with_options(base_url: impl Into<String>, access_token: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        RemoClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Fetch `/appliances` and `/devices` and normalize them into one snapshot.
    ///
    /// Fails as a whole if either request fails; the second request is not issued
    /// when the first one fails.
    pub fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        debug!("Fetching appliance and device lists");
        let appliances = self.get_raw("/appliances")?;
        let devices = self.get_raw("/devices")?;
        Ok(normalize(appliances, devices)?)
    }

    /// GET any API path and return the decoded body as-is.
    pub fn get_raw(&self, path: &str) -> Result<Value, ClientError> {
        debug!("GET {}", path);
        let resp = self
            .agent
            .get(&self.url(path))
            .header("Accept", "application/json")
            .header("Authorization", &self.bearer())
            .call();
        read_json(path, resp)
    }

    /// POST form parameters to any API path and return the decoded body as-is.
    pub fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, ClientError> {
        debug!("POST {} {:?}", path, form);
        let resp = self
            .agent
            .post(&self.url(path))
            .header("Accept", "application/json")
            .header("Authorization", &self.bearer())
            .send_form(form.iter().copied());
        read_json(path, resp)
    }
}

fn read_json(path: &str, resp: Result<http::Response<ureq::Body>, ureq::Error>) -> Result<Value, ClientError> {
    let mut resp = resp.map_err(|e| transport_error(path, e))?;
    let status = resp.status();
    if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Auth {
            path: path.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let body = resp
            .body_mut()
            .read_to_string()
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(ClientError::Connectivity(format!("{}: http {}: {}", path, status, body)));
    }

    let body = resp.body_mut().read_to_string().map_err(|e| transport_error(path, e))?;
    serde_json::from_str(&body).map_err(|e| ClientError::Unknown(format!("{}: invalid JSON body: {}", path, e)))
}

fn transport_error(path: &str, err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => ClientError::Connectivity(format!("{}: {}", path, err)),
        other => ClientError::Unknown(format!("{}: {}", path, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::remo::{ApplianceId, DeviceId};
    use httpmock::prelude::*;
    use serde_json::json;

    const TOKEN: &str = "test-token";

    fn client_for(server: &MockServer) -> RemoClient {
        RemoClient::with_options(server.url("/1/"), TOKEN, Duration::from_secs(5))
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let c = RemoClient::with_options("https://api.nature.global/1/", TOKEN, DEFAULT_TIMEOUT);
        assert_eq!(c.url("/devices"), "https://api.nature.global/1/devices");
        assert_eq!(c.url("appliances"), "https://api.nature.global/1/appliances");
    }

    #[test]
    fn fetch_snapshot_sends_bearer_and_indexes_payloads() {
        let server = MockServer::start();
        let appliances = server.mock(|when, then| {
            when.method(GET)
                .path("/1/appliances")
                .header("Authorization", "Bearer test-token");
            then.status(200).json_body(json!([
                {"id": "a1", "type": "EL_SMART_METER", "nickname": "Meter",
                 "smart_meter": {"echonetlite_properties": [{"epc": 231, "val": "142"}]}}
            ]));
        });
        let devices = server.mock(|when, then| {
            when.method(GET)
                .path("/1/devices")
                .header("Authorization", "Bearer test-token");
            then.status(200).json_body(json!([
                {"id": "d1", "name": "Living",
                 "newest_events": {"te": {"val": 23.5, "created_at": "2024-01-01T00:00:00Z"}}}
            ]));
        });

        let snap = client_for(&server).fetch_snapshot().expect("snapshot");
        appliances.assert();
        devices.assert();
        assert!(snap.appliance(&ApplianceId("a1".into())).is_some());
        assert!(snap.device(&DeviceId("d1".into())).is_some());
    }

    #[test]
    fn forbidden_appliances_fails_whole_fetch_with_auth() {
        let server = MockServer::start();
        let appliances = server.mock(|when, then| {
            when.method(GET).path("/1/appliances");
            then.status(403).body("forbidden");
        });
        let devices = server.mock(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(200).json_body(json!([]));
        });

        let err = client_for(&server).fetch_snapshot().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.kind().reason(), "invalid_auth");
        appliances.assert();
        assert_eq!(devices.hits(), 0);
    }

    #[test]
    fn server_error_is_connectivity() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1/appliances");
            then.status(503).body("maintenance");
        });

        let err = client_for(&server).fetch_snapshot().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(err.kind().reason(), "cannot_connect");
    }

    #[test]
    fn slow_response_times_out_as_connectivity() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(200)
                .json_body(json!([]))
                .delay(Duration::from_millis(1500));
        });
        let client = RemoClient::with_options(server.url("/1/"), TOKEN, Duration::from_millis(200));

        let err = client.get_raw("/devices").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn unreachable_host_is_connectivity() {
        // Port 9 (discard) on loopback is not expected to accept connections.
        let client = RemoClient::with_options("http://127.0.0.1:9/1/", TOKEN, Duration::from_secs(2));
        let err = client.get_raw("/devices").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn non_json_body_is_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(200).body("<html>not json</html>");
        });

        let err = client_for(&server).get_raw("/devices").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn duplicate_ids_surface_as_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1/appliances");
            then.status(200).json_body(json!([]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/1/devices");
            then.status(200).json_body(json!([{"id": "d1"}, {"id": "d1"}]));
        });

        let err = client_for(&server).fetch_snapshot().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn get_raw_passes_body_through() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/1/appliances/a1/signals")
                .header("Authorization", "Bearer test-token");
            then.status(200).json_body(json!([{"id": "s1", "name": "on"}]));
        });

        let body = client_for(&server).get_raw("/appliances/a1/signals").unwrap();
        assert_eq!(body, json!([{"id": "s1", "name": "on"}]));
    }

    #[test]
    fn post_sends_form_and_returns_body() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/1/appliances/a1/light")
                .header("Authorization", "Bearer test-token")
                .body_contains("button=on");
            then.status(200).json_body(json!({"brightness": "100", "power": "on"}));
        });

        let body = client_for(&server)
            .post("/appliances/a1/light", &[("button", "on")])
            .unwrap();
        m.assert();
        assert_eq!(body["power"], json!("on"));
    }

    #[test]
    fn post_unauthorized_is_auth() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/1/signals/s1/send");
            then.status(401);
        });

        let err = client_for(&server).post("/signals/s1/send", &[]).unwrap_err();
        assert!(matches!(err, ClientError::Auth { status: 401, .. }));
    }
}
