//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for DSM sync integration
//! tests, including mock appliance setup and certificate fixtures.

use dsm_cert_sync::{ConnectionConfig, SyncConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// CGI endpoints below the default `/webapi` base path
pub const PATH_AUTH: &str = "/webapi/auth.cgi";
pub const PATH_ENTRY: &str = "/webapi/entry.cgi";
pub const PATH_QUERY: &str = "/webapi/query.cgi";

/// API names
pub const API_AUTH: &str = "SYNO.API.Auth";
pub const API_INFO: &str = "SYNO.API.Info";
pub const API_CRT: &str = "SYNO.Core.Certificate.CRT";
pub const API_IMPORT: &str = "SYNO.Core.Certificate";

/// Session id handed out by the mock login
pub const TEST_SID: &str = "mock-session-id";

/// Credentials accepted by the mock login
pub const TEST_USER: &str = "certbot";
pub const TEST_PASSWORD: &str = "hunter2";

/// Mock DSM appliance for integration tests
pub struct MockDsmServer {
    server: MockServer,
}

impl MockDsmServer {
    /// Create a new mock appliance
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of the mock appliance
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get a reference to the inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Connection settings pointing at this appliance with the test credentials
    pub fn connection(&self) -> ConnectionConfig {
        SyncConfig::builder()
            .server_url(self.url())
            .expect("Valid URL")
            .credentials(TEST_USER, TEST_PASSWORD)
            .build_connection()
            .expect("Valid config")
    }

    /// Mock a successful login for the test credentials
    pub async fn mock_login_success(&self) {
        Mock::given(method("GET"))
            .and(path(PATH_AUTH))
            .and(query_param("api", API_AUTH))
            .and(query_param("version", "3"))
            .and(query_param("method", "login"))
            .and(query_param("account", TEST_USER))
            .and(query_param("passwd", TEST_PASSWORD))
            .and(query_param("format", "sid"))
            .respond_with(success(json!({ "sid": TEST_SID })))
            .mount(&self.server)
            .await;
    }

    /// Mock a rejected login
    pub async fn mock_login_failure(&self, code: i64) {
        Mock::given(method("GET"))
            .and(path(PATH_AUTH))
            .and(query_param("method", "login"))
            .respond_with(failure(code))
            .mount(&self.server)
            .await;
    }

    /// Mock the certificate listing; requires the test session id
    pub async fn mock_list(&self, certificates: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(PATH_ENTRY))
            .and(query_param("api", API_CRT))
            .and(query_param("method", "list"))
            .and(query_param("_sid", TEST_SID))
            .respond_with(success(json!({ "certificates": certificates })))
            .mount(&self.server)
            .await;
    }

    /// Mock the detail call for one certificate
    pub async fn mock_get(&self, id: &str, payload: Value) {
        Mock::given(method("GET"))
            .and(path(PATH_ENTRY))
            .and(query_param("api", API_CRT))
            .and(query_param("method", "get"))
            .and(query_param("id", id))
            .and(query_param("_sid", TEST_SID))
            .respond_with(success(payload))
            .mount(&self.server)
            .await;
    }

    /// Mock an import that answers with `returned_id`, expected `times` times
    pub async fn mock_import(&self, returned_id: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(PATH_ENTRY))
            .and(query_param("api", API_IMPORT))
            .and(query_param("version", "1"))
            .and(query_param("method", "import"))
            .and(query_param("_sid", TEST_SID))
            .respond_with(success(json!({ "id": returned_id })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Mock the API discovery listing
    pub async fn mock_api_info(&self, apis: Value) {
        Mock::given(method("GET"))
            .and(path(PATH_QUERY))
            .and(query_param("api", API_INFO))
            .and(query_param("method", "query"))
            .and(query_param("query", "all"))
            .respond_with(success(apis))
            .mount(&self.server)
            .await;
    }

    /// Mock a `success: false` envelope for one API method
    pub async fn mock_remote_error(&self, api: &str, api_method: &str, code: i64) {
        Mock::given(path(PATH_ENTRY))
            .and(query_param("api", api))
            .and(query_param("method", api_method))
            .respond_with(failure(code))
            .mount(&self.server)
            .await;
    }

    /// Mock a raw response body for one API method
    pub async fn mock_raw(&self, api: &str, api_method: &str, response: ResponseTemplate) {
        Mock::given(path(PATH_ENTRY))
            .and(query_param("api", api))
            .and(query_param("method", api_method))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

/// A `success: true` envelope around `data`
pub fn success(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

/// A `success: false` envelope with `code`
pub fn failure(code: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "error": { "code": code, "errors": [{ "code": code, "key": "test" }] }
    }))
}

/// Test fixture helpers
pub mod fixtures {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use std::path::{Path, PathBuf};
    use time::format_description::FormatItem;
    use time::macros::format_description;
    use time::OffsetDateTime;

    const REMOTE_LAYOUT: &[FormatItem<'static>] = format_description!(
        "[month repr:short] [day padding:space] [hour]:[minute]:[second] [year] GMT"
    );

    /// Render an instant the way the appliance reports validity bounds
    pub fn remote_timestamp(instant: OffsetDateTime) -> String {
        instant
            .format(REMOTE_LAYOUT)
            .expect("Failed to format timestamp")
    }

    /// A certificate listing entry
    pub fn certificate_json(id: &str, desc: &str, valid_till: OffsetDateTime) -> Value {
        json!({
            "id": id,
            "desc": desc,
            "is_default": false,
            "valid_from": remote_timestamp(valid_till - time::Duration::days(90)),
            "valid_till": remote_timestamp(valid_till),
            "issuer": {
                "common_name": "R3",
                "country": "US",
                "organization": "Let's Encrypt"
            },
            "subject": {
                "common_name": "nas.example.com",
                "sub_alt_name": ["nas.example.com"]
            },
            "services": []
        })
    }

    /// Write a self-signed pair expiring at `not_after` into `dir`
    pub fn write_local_pair(dir: &Path, not_after: OffsetDateTime) -> (PathBuf, PathBuf) {
        let key_pair = KeyPair::generate().expect("Key generation failed");
        let mut params = CertificateParams::new(vec!["nas.example.com".to_string()])
            .expect("Invalid certificate params");
        params
            .distinguished_name
            .push(DnType::CommonName, "nas.example.com");
        params.not_before = not_after - time::Duration::days(90);
        params.not_after = not_after;
        let cert = params.self_signed(&key_pair).expect("Self-signing failed");

        let cert_path = dir.join("tls.crt");
        let key_path = dir.join("tls.key");
        std::fs::write(&cert_path, cert.pem()).expect("Failed to write certificate");
        std::fs::write(&key_path, key_pair.serialize_pem()).expect("Failed to write key");
        (cert_path, key_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock_server = MockDsmServer::start().await;
        assert!(!mock_server.url().is_empty());
        assert!(mock_server.url().starts_with("http://"));
    }

    #[test]
    fn test_remote_timestamp_layout() {
        assert_eq!(
            fixtures::remote_timestamp(datetime!(2025-01-02 15:04:05 UTC)),
            "Jan  2 15:04:05 2025 GMT"
        );
    }
}
