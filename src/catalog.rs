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

//! Remote certificate catalog.
//!
//! The appliance reports validity bounds as text in the layout
//! `"Mon _2 HH:MM:SS YYYY ZONE"` (day space-padded to two columns, though an
//! unpadded `Jan 2` is accepted too), e.g. `"Jan  2 15:04:05 2024 UTC"`. Entries
//! are decoded into a wire struct first and the timestamps converted with
//! [`parse_remote_timestamp`]; one bad entry fails the whole listing.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::Result;
use crate::session::{ApiRequest, SessionClient};

/// Certificate listing/detail API.
pub const CERTIFICATE_CRT_API: &str = "SYNO.Core.Certificate.CRT";

/// Layout of the date/time part, without the trailing zone.
const REMOTE_LAYOUT: &[FormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
);

/// Same layout with an unpadded single-digit day (`Jan 2`).
const REMOTE_LAYOUT_UNPADDED: &[FormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none] [hour]:[minute]:[second] [year]"
);

/// A remote timestamp that does not match the appliance's layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a \"Mon _2 15:04:05 2006 MST\" timestamp: {reason}")]
pub struct TimestampError {
    value: String,
    reason: String,
}

impl TimestampError {
    fn new(value: &str, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// The text that failed to parse.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Parse a timestamp in the appliance's `"Jan  2 15:04:05 2006 MST"` layout.
///
/// A single-digit day may also come unpadded (`Jan 2`). The zone must be an
/// alphabetic abbreviation of 3 to 5 letters and is read as UTC.
pub fn parse_remote_timestamp(value: &str) -> std::result::Result<OffsetDateTime, TimestampError> {
    let (datetime, zone) = value
        .rsplit_once(' ')
        .ok_or_else(|| TimestampError::new(value, "missing time zone"))?;

    if !(3..=5).contains(&zone.len()) || !zone.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(TimestampError::new(
            value,
            format!("unrecognized time zone '{}'", zone),
        ));
    }

    PrimitiveDateTime::parse(datetime, REMOTE_LAYOUT)
        .or_else(|e| {
            PrimitiveDateTime::parse(datetime, REMOTE_LAYOUT_UNPADDED).map_err(|_| e)
        })
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| TimestampError::new(value, e.to_string()))
}

/// Issuer of a remote certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIssuer {
    /// Issuer common name.
    #[serde(default)]
    pub common_name: String,
    /// Issuer country.
    #[serde(default)]
    pub country: String,
    /// Issuer organization.
    #[serde(default)]
    pub organization: String,
}

/// Subject of a remote certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSubject {
    /// Subject common name.
    #[serde(default)]
    pub common_name: String,
    /// Subject alternative names.
    #[serde(default, rename = "sub_alt_name")]
    pub alt_names: Vec<String>,
}

/// A certificate installed on the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCertificate {
    /// Appliance-assigned id; stays the same across replace operations.
    pub id: String,
    /// User-chosen label.
    pub description: String,
    /// Whether this is the appliance's default certificate.
    pub is_default: bool,
    /// Start of validity.
    pub valid_from: OffsetDateTime,
    /// End of validity.
    pub valid_till: OffsetDateTime,
    /// Issuer names.
    pub issuer: CertificateIssuer,
    /// Subject names.
    pub subject: CertificateSubject,
}

impl std::fmt::Display for RemoteCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) [{} - {}]",
            self.id, self.description, self.valid_from, self.valid_till
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawCertificate {
    id: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    is_default: bool,
    valid_from: String,
    valid_till: String,
    #[serde(default)]
    issuer: CertificateIssuer,
    #[serde(default)]
    subject: CertificateSubject,
}

impl TryFrom<RawCertificate> for RemoteCertificate {
    type Error = TimestampError;

    fn try_from(raw: RawCertificate) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            valid_from: parse_remote_timestamp(&raw.valid_from)?,
            valid_till: parse_remote_timestamp(&raw.valid_till)?,
            id: raw.id,
            description: raw.desc,
            is_default: raw.is_default,
            issuer: raw.issuer,
            subject: raw.subject,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CertificateListing {
    #[serde(default)]
    certificates: Vec<RawCertificate>,
}

fn decode_listing(listing: CertificateListing) -> Result<Vec<RemoteCertificate>> {
    let certs = listing
        .certificates
        .into_iter()
        .map(RemoteCertificate::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(certs)
}

impl SessionClient {
    /// List the certificates installed on the appliance, in listing order.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any entry has a malformed timestamp.
    pub async fn list_certificates(&self) -> Result<Vec<RemoteCertificate>> {
        let request = ApiRequest::new(CERTIFICATE_CRT_API, 1, "entry.cgi", "list");
        let listing: CertificateListing = self.execute(self.get(&request)?).await?;
        let certs = decode_listing(listing)?;
        tracing::debug!("Appliance has {} certificates", certs.len());
        Ok(certs)
    }

    /// Fetch the raw detail payload of one certificate.
    pub async fn get_certificate(&self, id: &str) -> Result<serde_json::Value> {
        let request = ApiRequest::new(CERTIFICATE_CRT_API, 1, "entry.cgi", "get").param("id", id);
        self.execute(self.get(&request)?).await
    }
}
