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

//! Authenticated session with the appliance's web API.
//!
//! Every call goes to a CGI endpoint below the API base path and carries the
//! protocol parameters `api`, `version` and `method` in the query string. Once
//! logged in, the session id is appended as `_sid`. Responses share one
//! envelope:
//!
//! ```json
//! {"success": true, "data": { ... }}
//! {"success": false, "error": {"code": 105, "errors": ...}}
//! ```
//!
//! # Session id access
//!
//! The session id lives behind a readers-writer lock. Request builders take
//! the read side and may run concurrently; [`SessionClient::login`] takes the
//! write side only after the appliance accepted the credentials, so a failed
//! login never clobbers an existing session. No TTL is tracked: an expired
//! session surfaces as a remote error on the next call.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{Result, SyncError};
use crate::tls::build_http_client;

/// Authentication API.
pub const AUTH_API: &str = "SYNO.API.Auth";

/// API discovery API.
pub const INFO_API: &str = "SYNO.API.Info";

/// Query parameter carrying the session id.
pub const SESSION_PARAM: &str = "_sid";

/// Parameters whose values never appear in logs.
const REDACTED_PARAMS: &[&str] = &["passwd", SESSION_PARAM];

/// A call against one web API method.
///
/// Holds the named protocol fields plus caller parameters in insertion
/// order. Values are validated when the request is turned into a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    api: String,
    version: u32,
    path: String,
    method: String,
    params: Vec<(String, String)>,
}

impl ApiRequest {
    /// Create a request for `method` of `api` served by the CGI at `path`.
    pub fn new(
        api: impl Into<String>,
        version: u32,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            api: api.into(),
            version,
            path: path.into(),
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter. Setting the same name twice keeps the last value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    /// API name.
    pub fn api(&self) -> &str {
        &self.api
    }

    /// API version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// CGI path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// API method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Caller parameters in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    errors: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    sid: String,
}

/// An API advertised by the appliance's discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInfo {
    /// API name (the key of the discovery map).
    #[serde(default)]
    pub name: String,
    /// CGI path serving the API.
    pub path: String,
    /// Lowest supported version.
    #[serde(default)]
    pub min_version: u32,
    /// Highest supported version.
    #[serde(default)]
    pub max_version: u32,
}

/// Client for the appliance web API.
///
/// Owns the HTTP client, the credentials and the current session id.
#[derive(Debug)]
pub struct SessionClient {
    config: ConnectionConfig,
    http: reqwest::Client,
    sid: RwLock<Option<String>>,
}

impl SessionClient {
    /// Create a new client. No network traffic happens until [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Returns an error if TLS configuration fails.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let http = build_http_client(&config)?;

        Ok(Self {
            config,
            http,
            sid: RwLock::new(None),
        })
    }

    /// Get the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether a session id is currently held.
    pub fn has_session(&self) -> bool {
        self.sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Log in with the configured account and store the returned session id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Authentication`] wrapping the underlying failure.
    /// The previously stored session id, if any, is left untouched.
    pub async fn login(&self) -> Result<()> {
        let request = ApiRequest::new(AUTH_API, 3, "auth.cgi", "login")
            .param("account", self.config.account.as_str())
            .param("passwd", self.config.password.as_str())
            .param("format", "sid");

        let builder = self.get(&request).map_err(SyncError::authentication)?;
        let data: LoginData = self
            .execute(builder)
            .await
            .map_err(SyncError::authentication)?;

        if data.sid.is_empty() {
            return Err(SyncError::authentication(SyncError::MissingData {
                expected: "session id",
            }));
        }

        *self.sid.write().unwrap_or_else(PoisonError::into_inner) = Some(data.sid);
        tracing::debug!("Logged in as {}", self.config.account);
        Ok(())
    }

    /// Turn a request into a URL carrying the protocol parameters, the
    /// caller parameters and the session id (when logged in).
    ///
    /// # Errors
    ///
    /// Fails if the request has no path or any parameter value is empty.
    pub fn build_request(&self, request: &ApiRequest) -> Result<Url> {
        if request.path.is_empty() {
            return Err(SyncError::MissingPath);
        }
        let mut url = self.config.api_url(&request.path)?;

        let mut params: Vec<(&str, String)> = vec![
            ("api", request.api.clone()),
            ("version", request.version.to_string()),
            ("method", request.method.clone()),
        ];
        for (name, value) in &request.params {
            match params.iter_mut().find(|(n, _)| *n == name.as_str()) {
                Some(existing) => existing.1 = value.clone(),
                None => params.push((name.as_str(), value.clone())),
            }
        }

        let sid = self
            .sid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sid {
            Some(sid) => params.push((SESSION_PARAM, sid)),
            None => tracing::trace!("Building {} request without a session", request.api),
        }

        if let Some((name, _)) = params.iter().find(|(_, value)| value.is_empty()) {
            return Err(SyncError::empty_parameter(*name));
        }

        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(n, v)| (*n, v.as_str())));
        Ok(url)
    }

    /// Build a GET request for an API call.
    pub fn get(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder> {
        let url = self.build_request(request)?;
        tracing::debug!("GET {}", redact(&url));
        Ok(self.http.get(url))
    }

    /// Build a POST request for an API call.
    pub fn post(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder> {
        let url = self.build_request(request)?;
        tracing::debug!("POST {}", redact(&url));
        Ok(self.http.post(url))
    }

    /// Send a request and decode the envelope's `data` into `T`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Remote`] when the envelope reports `success: false`
    /// - [`SyncError::MissingData`] when `data` is absent
    /// - [`SyncError::Json`] when the body or `data` does not decode
    pub async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        match self.send(request).await? {
            Some(data) => Ok(serde_json::from_value(data)?),
            None => Err(SyncError::MissingData {
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Send a request whose `data`, if any, is not needed.
    pub async fn execute_unit(&self, request: reqwest::RequestBuilder) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    /// List the APIs the appliance advertises, sorted by name.
    pub async fn query_apis(&self) -> Result<Vec<ApiInfo>> {
        let request = ApiRequest::new(INFO_API, 1, "query.cgi", "query").param("query", "all");
        let apis: HashMap<String, ApiInfo> = self.execute(self.get(&request)?).await?;

        let mut apis: Vec<ApiInfo> = apis
            .into_iter()
            .map(|(name, info)| ApiInfo { name, ..info })
            .collect();
        apis.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apis)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<serde_json::Value>> {
        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)?;

        if !envelope.success {
            let error = envelope.error.unwrap_or_default();
            tracing::debug!("Remote call failed with code {}", error.code);
            return Err(SyncError::remote(error.code, error.errors));
        }

        Ok(envelope.data.filter(|data| !data.is_null()))
    }
}

/// Render a URL with secret query values masked.
fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if REDACTED_PARAMS.contains(&name.as_ref()) {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
