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

//! Certificate import.
//!
//! Creating and replacing a certificate are the same multipart POST to the
//! import endpoint. Without an `id` field the appliance creates a new entry;
//! with one it replaces that entry in place. The call is not transactional:
//! a failure can leave the appliance in an unknown state and nothing here
//! tries to roll back.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::catalog::RemoteCertificate;
use crate::error::Result;
use crate::local::LocalCertificate;
use crate::session::{ApiRequest, SessionClient};

/// Certificate import API.
pub const CERTIFICATE_API: &str = "SYNO.Core.Certificate";

/// Scalar fields sent alongside the key and certificate parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportAttributes {
    /// Existing certificate to replace; `None` creates a new one.
    pub id: Option<String>,
    /// Description to store.
    pub description: Option<String>,
    /// Whether the certificate should be marked as default.
    pub as_default: Option<bool>,
}

impl ImportAttributes {
    /// Attributes for creating a new certificate with the given description.
    pub fn create(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Attributes for replacing `existing`, keeping its id, description and
    /// default flag.
    pub fn replace(existing: &RemoteCertificate) -> Self {
        Self {
            id: Some(existing.id.clone()),
            description: Some(existing.description.clone()),
            as_default: Some(existing.is_default),
        }
    }

    /// Form fields in the order they are written.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(3);
        if let Some(ref id) = self.id {
            fields.push(("id", id.clone()));
        }
        if let Some(ref description) = self.description {
            fields.push(("desc", description.clone()));
        }
        if let Some(as_default) = self.as_default {
            fields.push(("as_default", as_default.to_string()));
        }
        fields
    }
}

#[derive(Debug, Deserialize)]
struct ImportData {
    id: String,
}

fn file_part(contents: &[u8], file_name: &str) -> Result<Part> {
    let part = Part::bytes(contents.to_vec())
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")?;
    Ok(part)
}

impl SessionClient {
    /// Upload a certificate/key pair and return the id the appliance assigned
    /// (or kept, for a replace).
    pub async fn import_certificate(
        &self,
        local: &LocalCertificate,
        attributes: &ImportAttributes,
    ) -> Result<String> {
        let request = ApiRequest::new(CERTIFICATE_API, 1, "entry.cgi", "import");

        let mut form = Form::new()
            .part("key", file_part(&local.key_pem, &local.key_file_name)?)
            .part("cert", file_part(&local.cert_pem, &local.cert_file_name)?);
        for (name, value) in attributes.fields() {
            form = form.text(name, value);
        }

        let data: ImportData = self.execute(self.post(&request)?.multipart(form)).await?;
        tracing::debug!("Import returned certificate id {}", data.id);
        Ok(data.id)
    }
}
