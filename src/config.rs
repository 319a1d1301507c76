// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration types for certificate synchronization.
//!
//! [`SyncConfigBuilder`] resolves everything the engine needs: where the
//! appliance lives, how to authenticate, which local files to read, how often
//! to check, and which remote certificate to manage. An optional TOML file
//! ([`FileConfig`]) can supply the same values; it never carries the password.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, SyncError};
use crate::reconcile::SyncTarget;

/// CGI base path used when the configured URL has none.
pub const DEFAULT_API_PATH: &str = "/webapi";

/// Default period between scheduled checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to open a session with the appliance.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Appliance API base URL, including the CGI base path (e.g. `/webapi`).
    pub server_url: Url,

    /// Account allowed to manage certificates.
    pub account: String,

    /// Account password.
    pub password: String,

    /// Trust anchor configuration for the appliance's TLS certificate.
    pub trust_anchors: TrustAnchors,

    /// Request timeout duration.
    pub timeout: Duration,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server_url", &self.server_url)
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("trust_anchors", &self.trust_anchors)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build the URL of a CGI endpoint below the API base path.
    pub fn api_url(&self, cgi_path: &str) -> Result<Url> {
        let base = self.server_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{}/{}", base, cgi_path.trim_start_matches('/')))?;
        Ok(url)
    }
}

/// Resolved configuration for one synchronization target.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Appliance connection settings.
    pub connection: ConnectionConfig,

    /// Path to the PEM certificate file.
    pub cert_path: PathBuf,

    /// Path to the PEM private key file.
    pub key_path: PathBuf,

    /// How often to check even without file changes.
    pub check_interval: Duration,

    /// Which remote certificate to manage.
    pub target: SyncTarget,
}

impl SyncConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }
}

/// Builder for [`SyncConfig`] and [`ConnectionConfig`].
#[derive(Default, Clone)]
pub struct SyncConfigBuilder {
    server_url: Option<Url>,
    account: Option<String>,
    password: Option<String>,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    check_interval: Option<Duration>,
    target_id: Option<String>,
    target_description: Option<String>,
    trust_anchors: Option<TrustAnchors>,
    timeout: Option<Duration>,
}

impl SyncConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the appliance URL.
    ///
    /// A URL without a path (e.g. `https://nas.local:5001`) gets the default
    /// `/webapi` CGI base path.
    pub fn server_url(mut self, url: impl AsRef<str>) -> std::result::Result<Self, url::ParseError> {
        let mut url = Url::parse(url.as_ref())?;
        if url.path().is_empty() || url.path() == "/" {
            url.set_path(DEFAULT_API_PATH);
        }
        self.server_url = Some(url);
        Ok(self)
    }

    /// Set the login credentials.
    pub fn credentials(mut self, account: impl Into<String>, password: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self.password = Some(password.into());
        self
    }

    /// Set the local certificate file.
    pub fn cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(path.into());
        self
    }

    /// Set the local private key file.
    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set how often to check the certificate.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Select the remote certificate by id. Empty ids are ignored.
    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into()).filter(|id: &String| !id.is_empty());
        self
    }

    /// Select the remote certificate by description. Empty descriptions are ignored.
    pub fn target_description(mut self, description: impl Into<String>) -> Self {
        self.target_description = Some(description.into()).filter(|d: &String| !d.is_empty());
        self
    }

    /// Verify the appliance against Mozilla's root CA store.
    pub fn trust_webpki_roots(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::WebPki);
        self
    }

    /// Verify the appliance against explicit CA certificates (PEM-encoded).
    pub fn trust_explicit(mut self, ca_certs: Vec<Vec<u8>>) -> Self {
        self.trust_anchors = Some(TrustAnchors::Explicit(ca_certs));
        self
    }

    /// Accept any appliance certificate.
    pub fn trust_any_insecure(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::InsecureAcceptAny);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build only the connection settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL or credentials are missing.
    pub fn build_connection(self) -> Result<ConnectionConfig> {
        let server_url = self
            .server_url
            .ok_or_else(|| SyncError::config("server url is required"))?;
        let account = self
            .account
            .filter(|a| !a.is_empty())
            .ok_or_else(|| SyncError::config("account is required"))?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SyncError::config("password is required"))?;

        Ok(ConnectionConfig {
            server_url,
            account,
            password,
            trust_anchors: self.trust_anchors.unwrap_or(TrustAnchors::InsecureAcceptAny),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Build the full synchronization configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection settings, either file
    /// path, or both target selectors are missing.
    pub fn build(self) -> Result<SyncConfig> {
        let target = SyncTarget {
            id: self.target_id.clone(),
            description: self.target_description.clone(),
        };
        if target.is_empty() {
            return Err(SyncError::config(
                "a certificate id or description is required",
            ));
        }
        let cert_path = self
            .cert_path
            .clone()
            .ok_or_else(|| SyncError::config("certificate path is required"))?;
        let key_path = self
            .key_path
            .clone()
            .ok_or_else(|| SyncError::config("key path is required"))?;
        let check_interval = self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL);
        if check_interval.is_zero() {
            return Err(SyncError::config("check interval must be non-zero"));
        }

        Ok(SyncConfig {
            connection: self.build_connection()?,
            cert_path,
            key_path,
            check_interval,
            target,
        })
    }
}

/// Trust anchor configuration for the appliance's TLS certificate.
#[derive(Clone)]
pub enum TrustAnchors {
    /// Use Mozilla's root CA store (webpki-roots).
    WebPki,

    /// Use explicit CA certificates (PEM-encoded).
    Explicit(Vec<Vec<u8>>),

    /// Accept any server certificate.
    ///
    /// Appliances usually serve the very certificate being managed, which may
    /// be expired or self-signed at the time it needs replacing.
    InsecureAcceptAny,
}

impl std::fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebPki => write!(f, "WebPki"),
            Self::Explicit(certs) => write!(f, "Explicit({} certs)", certs.len()),
            Self::InsecureAcceptAny => write!(f, "InsecureAcceptAny"),
        }
    }
}

/// On-disk TOML configuration.
///
/// ```toml
/// url = "https://nas.local:5001"
/// user = "certbot"
/// cert = "/cert/tls.crt"
/// key = "/cert/tls.key"
/// freq_secs = 3600
/// desc = "nas.example.com"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Appliance URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Account name.
    #[serde(default)]
    pub user: Option<String>,

    /// Certificate file path.
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// Key file path.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Check interval in seconds.
    #[serde(default)]
    pub freq_secs: Option<u64>,

    /// Remote certificate id.
    #[serde(default)]
    pub id: Option<String>,

    /// Remote certificate description.
    #[serde(default)]
    pub desc: Option<String>,

    /// Verify the appliance certificate against the system roots.
    #[serde(default)]
    pub verify_tls: Option<bool>,

    /// PEM file with CA certificates trusted for the appliance.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has unknown keys.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| SyncError::config(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }
}
