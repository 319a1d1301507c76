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

//! TLS and PEM helpers.
//!
//! Builds the HTTP client used to reach the appliance and parses the PEM
//! material read from local disk.

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::{ConnectionConfig, TrustAnchors};
use crate::error::{Result, SyncError};
use crate::USER_AGENT;

/// Build a reqwest Client with the appropriate TLS configuration.
pub fn build_http_client(config: &ConnectionConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .use_rustls_tls();

    match &config.trust_anchors {
        TrustAnchors::WebPki => {
            builder = builder.tls_built_in_root_certs(true);
        }
        TrustAnchors::Explicit(ca_certs) => {
            builder = builder.tls_built_in_root_certs(false);
            for ca_pem in ca_certs {
                let cert = reqwest::Certificate::from_pem(ca_pem)
                    .map_err(|e| SyncError::tls(format!("Failed to parse CA certificate: {}", e)))?;
                builder = builder.add_root_certificate(cert);
            }
        }
        TrustAnchors::InsecureAcceptAny => {
            builder = builder
                .tls_built_in_root_certs(false)
                .danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| SyncError::tls(format!("Failed to build HTTP client: {}", e)))
}

/// Parse PEM-encoded certificates.
///
/// A malformed block fails the whole parse, so a corrupt leaf is never
/// replaced by the next certificate in the chain.
pub fn parse_pem_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(pem_data);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SyncError::invalid_pem(format!("Failed to parse certificate PEM: {}", e)))?;

    if certs.is_empty() {
        return Err(SyncError::invalid_pem("No certificates found in PEM data"));
    }

    Ok(certs)
}

/// Parse a PEM-encoded private key.
pub fn parse_pem_private_key(pem_data: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(pem_data);

    // PKCS#8 first, then RSA, then EC
    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(key))) => {
                return Ok(PrivateKeyDer::Pkcs8(key));
            }
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(key))) => {
                return Ok(PrivateKeyDer::Pkcs1(key));
            }
            Ok(Some(rustls_pemfile::Item::Sec1Key(key))) => {
                return Ok(PrivateKeyDer::Sec1(key));
            }
            Ok(Some(_)) => {
                // Certificates bundled into the key file are skipped
                continue;
            }
            Ok(None) => {
                break;
            }
            Err(e) => {
                return Err(SyncError::invalid_pem(format!("Failed to parse PEM: {}", e)));
            }
        }
    }

    Err(SyncError::invalid_pem("No private key found in PEM data"))
}
