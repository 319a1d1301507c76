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

//! # dsm-cert-sync
//!
//! Keeps the TLS certificate installed on a Synology DSM appliance in step
//! with a certificate/key pair on local disk, typically one renewed by an
//! ACME client or a Kubernetes secret mount.
//!
//! ## Features
//!
//! - **Async-first design** using Tokio
//! - **DSM Web API session** handling: login, request building, response envelopes
//! - **Certificate catalog**: list and inspect installed certificates
//! - **Import**: create or replace a certificate via multipart upload
//! - **Reconciliation** keyed on certificate expiry
//! - **Scheduling** on a timer and on file changes, with a minimum spacing
//!
//! ## Quick Start
//!
//! ```no_run
//! use dsm_cert_sync::{SessionClient, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::builder()
//!         .server_url("https://nas.local:5001")?
//!         .credentials("certbot", "secret")
//!         .cert_path("/cert/tls.crt")
//!         .key_path("/cert/tls.key")
//!         .target_description("nas.example.com")
//!         .build()?;
//!
//!     let client = SessionClient::new(config.connection)?;
//!     client.login().await?;
//!
//!     for cert in client.list_certificates().await? {
//!         println!("{}", cert);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## One-shot reconciliation
//!
//! ```no_run
//! use std::sync::Arc;
//! use dsm_cert_sync::{Reconciler, SessionClient, SyncConfig, SyncOutcome};
//!
//! # async fn example(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SessionClient::new(config.connection)?);
//! let reconciler = Reconciler::new(client, config.target, config.cert_path, config.key_path);
//!
//! match reconciler.reconcile().await? {
//!     SyncOutcome::NoOp { id } => println!("{} is current", id),
//!     SyncOutcome::Created { id } => println!("created {}", id),
//!     SyncOutcome::Replaced { id } => println!("replaced {}", id),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod local;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod tls;
pub mod upload;
pub mod watch;


// Re-export main types at crate root for convenience
pub use catalog::{parse_remote_timestamp, RemoteCertificate, TimestampError};
pub use config::{ConnectionConfig, FileConfig, SyncConfig, SyncConfigBuilder, TrustAnchors};
pub use error::{Result, SyncError};
pub use local::LocalCertificate;
pub use reconcile::{CertificateStore, Reconciler, SyncOutcome, SyncTarget};
pub use scheduler::{SyncEvent, SyncEventHandler, SyncScheduler, Trigger};
pub use session::{ApiInfo, ApiRequest, SessionClient};
pub use upload::ImportAttributes;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("dsm-cert-sync/", env!("CARGO_PKG_VERSION"));
