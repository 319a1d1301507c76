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

//! Error types for certificate synchronization.
//!
//! This module defines all error types that can occur while talking to the
//! appliance, loading the local certificate, and reconciling the two.

use thiserror::Error;

use crate::catalog::TimestampError;

/// Result type alias using [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during certificate synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP request or response error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Response body or `data` payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request parameter had an empty value.
    ///
    /// Empty values are rejected because the appliance treats them the same
    /// as an absent parameter.
    #[error("Cannot send empty parameter '{name}'")]
    EmptyParameter {
        /// Name of the offending parameter.
        name: String,
    },

    /// A request was built without a CGI path.
    #[error("Request path is required")]
    MissingPath,

    /// The appliance answered with `success: false`.
    #[error("Remote error {code}: {errors}")]
    Remote {
        /// Vendor error code.
        code: i64,
        /// Untyped error detail as returned by the appliance.
        errors: serde_json::Value,
    },

    /// The appliance reported success but omitted the expected `data` payload.
    #[error("Response carried no data, expected {expected}")]
    MissingData {
        /// Description of the value the caller expected.
        expected: &'static str,
    },

    /// Login was rejected or failed.
    #[error("Authentication failed: {source}")]
    Authentication {
        /// Underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// A remote timestamp did not match the appliance's fixed layout.
    #[error("Invalid remote timestamp: {0}")]
    InvalidTimestamp(#[from] TimestampError),

    /// Failed to parse the local X.509 certificate.
    #[error("Certificate parsing error: {0}")]
    CertificateParsing(String),

    /// Invalid PEM data.
    #[error("Invalid PEM data: {0}")]
    InvalidPem(String),

    /// DER encoding/decoding error.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// The private key does not belong to the certificate.
    #[error("Private key does not match certificate: {0}")]
    KeyMismatch(String),

    /// The configured certificate id does not exist on the appliance.
    #[error("No certificate found with id '{id}'")]
    CertificateNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A replace operation came back with a different certificate id.
    #[error("Certificate id changed from '{expected}' to '{actual}'")]
    IdentityChanged {
        /// The id that was sent for replacement.
        expected: String,
        /// The id the appliance returned.
        actual: String,
    },

    /// File watch backend error.
    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a TLS error with the given message.
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create a certificate parsing error with the given message.
    pub fn certificate_parsing(msg: impl Into<String>) -> Self {
        Self::CertificateParsing(msg.into())
    }

    /// Create an invalid PEM error.
    pub fn invalid_pem(msg: impl Into<String>) -> Self {
        Self::InvalidPem(msg.into())
    }

    /// Create an empty parameter error.
    pub fn empty_parameter(name: impl Into<String>) -> Self {
        Self::EmptyParameter { name: name.into() }
    }

    /// Create a remote error from the envelope's code and detail.
    pub fn remote(code: i64, errors: serde_json::Value) -> Self {
        Self::Remote { code, errors }
    }

    /// Wrap a failure that happened while logging in.
    pub fn authentication(source: SyncError) -> Self {
        Self::Authentication {
            source: Box::new(source),
        }
    }

    /// Create a certificate not found error.
    pub fn certificate_not_found(id: impl Into<String>) -> Self {
        Self::CertificateNotFound { id: id.into() }
    }

    /// Create an identity changed error.
    pub fn identity_changed(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IdentityChanged {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns the vendor error code if this is a remote error.
    ///
    /// Login failures are unwrapped so the code of the rejected auth call is
    /// reported.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            Self::Authentication { source } => source.remote_code(),
            _ => None,
        }
    }
}
