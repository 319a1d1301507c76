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

//! The certificate/key pair on local disk.
//!
//! Reloaded on every reconciliation attempt; the first certificate's
//! `notAfter` is the freshness fingerprint compared against the appliance.
//! A key that does not belong to that certificate fails the load, so a
//! renewal caught halfway (new certificate, old key) is never uploaded.

use der::Decode;
use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use std::path::Path;
use time::OffsetDateTime;
use x509_cert::Certificate;

use crate::error::{Result, SyncError};
use crate::tls::{parse_pem_certificates, parse_pem_private_key};

/// A parsed local certificate with the raw PEM it came from.
#[derive(Clone)]
pub struct LocalCertificate {
    /// Expiry of the leaf certificate, in whole seconds.
    pub not_after: OffsetDateTime,
    /// Subject distinguished name of the leaf certificate.
    pub subject: String,
    /// Certificate file contents (leaf first, chain may follow).
    pub cert_pem: Vec<u8>,
    /// Private key file contents.
    pub key_pem: Vec<u8>,
    /// File name sent with the certificate upload.
    pub cert_file_name: String,
    /// File name sent with the key upload.
    pub key_file_name: String,
}

impl std::fmt::Debug for LocalCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCertificate")
            .field("not_after", &self.not_after)
            .field("subject", &self.subject)
            .field("cert_file_name", &self.cert_file_name)
            .field("key_file_name", &self.key_file_name)
            .finish_non_exhaustive()
    }
}

impl LocalCertificate {
    /// Read and parse the certificate and key files.
    ///
    /// # Errors
    ///
    /// Fails if either file cannot be read, the certificate file holds no
    /// parsable certificate, the key file holds no private key, or the key
    /// does not belong to the certificate.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;

        let mut local = Self::from_pem(cert_pem, key_pem)?;
        local.cert_file_name = file_name(cert_path, "cert.pem");
        local.key_file_name = file_name(key_path, "key.pem");
        Ok(local)
    }

    /// Parse PEM contents that did not come from files.
    ///
    /// # Errors
    ///
    /// Besides parse failures, returns [`SyncError::KeyMismatch`] when the
    /// key does not belong to the leaf certificate.
    pub fn from_pem(cert_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Result<Self> {
        let cert_pem = cert_pem.into();
        let key_pem = key_pem.into();

        let chain = parse_pem_certificates(&cert_pem)?;
        let cert = match chain.first() {
            Some(leaf) => Certificate::from_der(leaf.as_ref())?,
            None => return Err(SyncError::invalid_pem("No certificates found in PEM data")),
        };
        let key = parse_pem_private_key(&key_pem)?;
        check_key_pair(chain, &key)?;

        let not_after = parse_x509_time(&cert.tbs_certificate.validity.not_after)?;

        Ok(Self {
            not_after,
            subject: cert.tbs_certificate.subject.to_string(),
            cert_pem,
            key_pem,
            cert_file_name: "cert.pem".to_string(),
            key_file_name: "key.pem".to_string(),
        })
    }
}

/// Reject a key whose public half differs from the leaf's SPKI.
fn check_key_pair(chain: Vec<CertificateDer<'static>>, key: &PrivateKeyDer<'static>) -> Result<()> {
    let signing_key = any_supported_type(key)
        .map_err(|e| SyncError::invalid_pem(format!("Unsupported private key: {e}")))?;

    CertifiedKey::new(chain, signing_key)
        .keys_match()
        .map_err(|e| SyncError::KeyMismatch(e.to_string()))
}

fn file_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Convert an X.509 validity time to an instant.
fn parse_x509_time(x509_time: &x509_cert::time::Time) -> Result<OffsetDateTime> {
    use x509_cert::time::Time;

    let duration = match x509_time {
        Time::UtcTime(utc) => utc.to_unix_duration(),
        Time::GeneralTime(r#gen) => r#gen.to_unix_duration(),
    };
    let secs = i64::try_from(duration.as_secs())
        .map_err(|_| SyncError::certificate_parsing("notAfter out of range"))?;

    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| SyncError::certificate_parsing(format!("notAfter out of range: {e}")))
}
