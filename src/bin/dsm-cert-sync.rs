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

//! DSM certificate sync command-line tool
//!
//! Keeps a certificate on a Synology DSM appliance in sync with a local
//! certificate/key pair.
//!
//! # Usage
//!
//! ```text
//! dsm-cert-sync [OPTIONS] [COMMAND]
//!
//! Commands:
//!   run   Sync at startup, on every interval and on file changes (default)
//!   once  Run a single sync and exit
//!   list  List certificates installed on the appliance
//!   show  Print the appliance's record of one certificate
//!   apis  List the web APIs the appliance advertises
//!
//! Options:
//!   -c, --config <PATH>   Path to a TOML configuration file
//!       --url <URL>       Appliance URL
//!       --user <NAME>     Account name (password from DSM_PASSWORD)
//!       --cert <PATH>     Certificate file [default: /cert/tls.crt]
//!       --key <PATH>      Key file [default: /cert/tls.key]
//!       --freq <SECS>     Check interval [default: 3600]
//!       --id <ID>         Remote certificate id
//!       --desc <DESC>     Remote certificate description
//!   -v, --verbose         Enable verbose output
//!   -q, --quiet           Suppress non-error output
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Keep the certificate described "nas.example.com" current
//! DSM_PASSWORD=secret dsm-cert-sync --url https://nas.local:5001 --user certbot \
//!     --desc nas.example.com
//!
//! # Inspect the appliance
//! DSM_PASSWORD=secret dsm-cert-sync --url https://nas.local:5001 --user certbot list
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use dsm_cert_sync::{
    FileConfig, Reconciler, SessionClient, SyncConfig, SyncConfigBuilder, SyncError,
    SyncScheduler,
};

/// Environment variable holding the account password.
const PASSWORD_ENV: &str = "DSM_PASSWORD";

const DEFAULT_CERT_PATH: &str = "/cert/tls.crt";
const DEFAULT_KEY_PATH: &str = "/cert/tls.key";
const DEFAULT_FREQ_SECS: u64 = 3600;

/// DSM certificate sync command-line tool
#[derive(Parser)]
#[command(name = "dsm-cert-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a Synology DSM certificate in sync with a local pair", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Appliance URL, e.g. https://nas.local:5001
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    /// Account name; the password is read from DSM_PASSWORD
    #[arg(long, global = true, value_name = "NAME")]
    user: Option<String>,

    /// Certificate file (PEM)
    #[arg(long, global = true, value_name = "PATH")]
    cert: Option<PathBuf>,

    /// Private key file (PEM)
    #[arg(long, global = true, value_name = "PATH")]
    key: Option<PathBuf>,

    /// Check interval in seconds
    #[arg(long, global = true, value_name = "SECS")]
    freq: Option<u64>,

    /// Remote certificate id (must exist)
    #[arg(long, global = true, value_name = "ID")]
    id: Option<String>,

    /// Remote certificate description (created if missing)
    #[arg(long, global = true, value_name = "DESC")]
    desc: Option<String>,

    /// Verify the appliance certificate against the built-in roots
    #[arg(long, global = true)]
    verify_tls: bool,

    /// PEM file with the CA certificate trusted for the appliance
    #[arg(long, global = true, value_name = "PATH")]
    ca_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync at startup, on every interval and on file changes
    Run,

    /// Run a single sync and exit
    Once,

    /// List certificates installed on the appliance
    List,

    /// Print the appliance's record of one certificate
    Show {
        /// Certificate id
        #[arg(value_name = "ID")]
        cert_id: String,
    },

    /// List the web APIs the appliance advertises
    Apis,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_command(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let builder = config_builder(&cli)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(builder.build()?).await,
        Commands::Once => cmd_once(builder.build()?).await,
        Commands::List => cmd_list(builder).await,
        Commands::Show { cert_id } => cmd_show(builder, &cert_id).await,
        Commands::Apis => cmd_apis(builder).await,
    }
}

/// Merge the configuration file, command-line flags and environment.
/// Flags win over file values.
fn config_builder(cli: &Cli) -> Result<SyncConfigBuilder, Box<dyn std::error::Error>> {
    let file = match cli.config {
        Some(ref path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let url = cli
        .url
        .clone()
        .or(file.url)
        .ok_or_else(|| SyncError::config("--url is required"))?;
    let user = cli.user.clone().or(file.user).unwrap_or_default();
    let password = std::env::var(PASSWORD_ENV).unwrap_or_default();

    let mut builder = SyncConfig::builder()
        .server_url(&url)?
        .credentials(user, password)
        .cert_path(
            cli.cert
                .clone()
                .or(file.cert)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_PATH)),
        )
        .key_path(
            cli.key
                .clone()
                .or(file.key)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_PATH)),
        )
        .check_interval(Duration::from_secs(
            cli.freq.or(file.freq_secs).unwrap_or(DEFAULT_FREQ_SECS),
        ));

    if let Some(id) = cli.id.clone().or(file.id) {
        builder = builder.target_id(id);
    }
    if let Some(desc) = cli.desc.clone().or(file.desc) {
        builder = builder.target_description(desc);
    }
    if let Some(secs) = cli.timeout.or(file.timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    if let Some(ca_file) = cli.ca_file.clone().or(file.ca_file) {
        let ca_pem = std::fs::read(&ca_file).map_err(|e| {
            SyncError::config(format!("Failed to read {}: {e}", ca_file.display()))
        })?;
        builder = builder.trust_explicit(vec![ca_pem]);
    } else if cli.verify_tls || file.verify_tls.unwrap_or(false) {
        builder = builder.trust_webpki_roots();
    }

    Ok(builder)
}

async fn cmd_run(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(SessionClient::new(config.connection.clone())?);

    info!("Logging in to {}", config.connection.server_url);
    client.login().await?;
    let certs = client.list_certificates().await?;
    info!("{} certificates installed", certs.len());
    for cert in &certs {
        info!("{}", cert);
    }

    info!(
        "Keeping {} in sync with {}",
        config.target,
        config.cert_path.display()
    );
    let reconciler = Reconciler::new(client, config.target, config.cert_path, config.key_path);
    SyncScheduler::new(reconciler, config.check_interval)
        .run(shutdown_signal())
        .await?;
    Ok(())
}

async fn cmd_once(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(SessionClient::new(config.connection)?);
    let reconciler = Reconciler::new(client, config.target, config.cert_path, config.key_path);

    let outcome = reconciler.reconcile().await?;
    println!("{}", outcome);
    Ok(())
}

async fn cmd_list(builder: SyncConfigBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let client = SessionClient::new(builder.build_connection()?)?;
    client.login().await?;

    for cert in client.list_certificates().await? {
        println!("{}", cert);
    }
    Ok(())
}

async fn cmd_show(
    builder: SyncConfigBuilder,
    cert_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = SessionClient::new(builder.build_connection()?)?;
    client.login().await?;

    let record = client.get_certificate(cert_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_apis(builder: SyncConfigBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let client = SessionClient::new(builder.build_connection()?)?;

    println!("{:<40} {:<24} {:>4} {:>4}", "API", "PATH", "MIN", "MAX");
    for api in client.query_apis().await? {
        println!(
            "{:<40} {:<24} {:>4} {:>4}",
            api.name, api.path, api.min_version, api.max_version
        );
    }
    Ok(())
}

/// Completes on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
                    _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                }
                return;
            }
            Err(e) => error!("Failed to register a SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
    info!("SIGINT received, shutting down");
}
