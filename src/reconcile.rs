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

//! One reconciliation attempt.
//!
//! An attempt loads the local pair, logs in, lists the remote certificates,
//! picks the target and then creates, replaces or leaves it alone:
//!
//! | Remote match | Selector    | Expiry equal | Action                   |
//! |--------------|-------------|--------------|--------------------------|
//! | none         | id          | -            | error                    |
//! | none         | description | -            | create                   |
//! | found        | any         | yes          | nothing                  |
//! | found        | any         | no           | replace, keeping the id  |
//!
//! Any failure ends the attempt; nothing is retried within it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::catalog::RemoteCertificate;
use crate::error::{Result, SyncError};
use crate::local::LocalCertificate;
use crate::session::SessionClient;
use crate::upload::ImportAttributes;

/// Which remote certificate to manage.
///
/// When both selectors are set the id wins and the description is only used
/// as a label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncTarget {
    /// Remote certificate id; must already exist on the appliance.
    pub id: Option<String>,
    /// Remote certificate description; created when missing.
    pub description: Option<String>,
}

impl SyncTarget {
    /// Target an existing certificate by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            description: None,
        }
    }

    /// Target a certificate by description.
    pub fn by_description(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: Some(description.into()),
        }
    }

    /// True if neither selector is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.description.is_none()
    }

    fn matches(&self, cert: &RemoteCertificate) -> bool {
        match (&self.id, &self.description) {
            (Some(id), _) => cert.id == *id,
            (None, Some(description)) => cert.description == *description,
            (None, None) => false,
        }
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.id, &self.description) {
            (Some(id), _) => write!(f, "id '{}'", id),
            (None, Some(description)) => write!(f, "description '{}'", description),
            (None, None) => write!(f, "<none>"),
        }
    }
}

/// Remote operations a reconciliation needs.
///
/// [`SessionClient`] is the production implementation.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Open (or refresh) the session.
    async fn login(&self) -> Result<()>;

    /// List installed certificates in the appliance's order.
    async fn list_certificates(&self) -> Result<Vec<RemoteCertificate>>;

    /// Import a certificate/key pair and return the resulting id.
    async fn import_certificate(
        &self,
        local: &LocalCertificate,
        attributes: &ImportAttributes,
    ) -> Result<String>;
}

#[async_trait]
impl CertificateStore for SessionClient {
    async fn login(&self) -> Result<()> {
        SessionClient::login(self).await
    }

    async fn list_certificates(&self) -> Result<Vec<RemoteCertificate>> {
        SessionClient::list_certificates(self).await
    }

    async fn import_certificate(
        &self,
        local: &LocalCertificate,
        attributes: &ImportAttributes,
    ) -> Result<String> {
        SessionClient::import_certificate(self, local, attributes).await
    }
}

/// Find the target in a listing. The first match in listing order wins.
pub fn find_match<'a>(
    certs: &'a [RemoteCertificate],
    target: &SyncTarget,
) -> Option<&'a RemoteCertificate> {
    let mut matches = certs.iter().filter(|cert| target.matches(cert));
    let first = matches.next()?;
    let others = matches.count();
    if others > 0 {
        warn!(
            "{} certificates match {}, using {}",
            others + 1,
            target,
            first.id
        );
    }
    Some(first)
}

/// What an attempt will do once the target has been looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// The remote certificate already has the local expiry.
    NoOp {
        /// Matched certificate id.
        id: String,
    },
    /// Upload a new certificate.
    Create(ImportAttributes),
    /// Overwrite an existing certificate.
    Replace {
        /// Id that must survive the import.
        id: String,
        /// Attributes carried over from the existing certificate.
        attributes: ImportAttributes,
    },
}

/// Decide what to do given the local expiry and the matched remote entry.
///
/// Expiry is compared in whole seconds, the resolution of the remote
/// timestamps.
///
/// # Errors
///
/// Returns [`SyncError::CertificateNotFound`] when an id selector matched
/// nothing.
pub fn decide(
    local_not_after: OffsetDateTime,
    matched: Option<&RemoteCertificate>,
    target: &SyncTarget,
) -> Result<SyncAction> {
    match matched {
        None => match (&target.id, &target.description) {
            (Some(id), _) => Err(SyncError::certificate_not_found(id.clone())),
            (None, Some(description)) => Ok(SyncAction::Create(ImportAttributes::create(
                description.clone(),
            ))),
            (None, None) => Err(SyncError::config(
                "a certificate id or description is required",
            )),
        },
        Some(existing)
            if existing.valid_till.unix_timestamp() == local_not_after.unix_timestamp() =>
        {
            Ok(SyncAction::NoOp {
                id: existing.id.clone(),
            })
        }
        Some(existing) => Ok(SyncAction::Replace {
            id: existing.id.clone(),
            attributes: ImportAttributes::replace(existing),
        }),
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Already up to date.
    NoOp {
        /// Certificate id.
        id: String,
    },
    /// A new certificate was created.
    Created {
        /// Id assigned by the appliance.
        id: String,
    },
    /// An existing certificate was replaced in place.
    Replaced {
        /// Certificate id.
        id: String,
    },
}

impl SyncOutcome {
    /// The id of the certificate now holding the local pair.
    pub fn id(&self) -> &str {
        match self {
            Self::NoOp { id } | Self::Created { id } | Self::Replaced { id } => id,
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp { id } => write!(f, "certificate {} already up to date", id),
            Self::Created { id } => write!(f, "created certificate {}", id),
            Self::Replaced { id } => write!(f, "replaced certificate {}", id),
        }
    }
}

/// Runs reconciliation attempts for one target.
pub struct Reconciler {
    store: Arc<dyn CertificateStore>,
    target: SyncTarget,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("target", &self.target)
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler for `target` using the pair at the given paths.
    pub fn new(
        store: Arc<dyn CertificateStore>,
        target: SyncTarget,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            target,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// The configured target.
    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// The local files whose changes should trigger an attempt.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        vec![self.cert_path.clone(), self.key_path.clone()]
    }

    /// Run one attempt.
    pub async fn reconcile(&self) -> Result<SyncOutcome> {
        let local = LocalCertificate::load(&self.cert_path, &self.key_path)?;
        debug!(
            "Local certificate {} is valid until {}",
            local.subject, local.not_after
        );

        self.store.login().await?;
        let certs = self.store.list_certificates().await?;
        let matched = find_match(&certs, &self.target);

        match decide(local.not_after, matched, &self.target)? {
            SyncAction::NoOp { id } => {
                debug!("Certificate {} is up to date", id);
                Ok(SyncOutcome::NoOp { id })
            }
            SyncAction::Create(attributes) => {
                info!("Uploading new certificate for {}", self.target);
                let id = self.store.import_certificate(&local, &attributes).await?;
                info!("Created certificate {}", id);
                Ok(SyncOutcome::Created { id })
            }
            SyncAction::Replace { id, attributes } => {
                if let Some(existing) = matched {
                    info!(
                        "Replacing certificate {} with one that expires on {}",
                        existing, local.not_after
                    );
                }
                let returned = self.store.import_certificate(&local, &attributes).await?;
                if returned != id {
                    return Err(SyncError::identity_changed(id, returned));
                }
                info!("Certificate {} is up to date", id);
                Ok(SyncOutcome::Replaced { id })
            }
        }
    }
}
