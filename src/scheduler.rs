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

//! Scheduling of reconciliation attempts.
//!
//! [`SyncScheduler::run`] reconciles once at startup, then waits on four
//! sources in a single `select!`: the shutdown future, a periodic timer, file
//! change notifications and file watch errors. Attempts run inline in the
//! loop, so at most one is ever in flight. Attempts that would start less
//! than [`MIN_SYNC_SPACING`] after the previous one are skipped.
//!
//! A failed attempt ends the loop with its error. Watch errors are logged and
//! the loop continues; a closed watch channel or the shutdown future ends it
//! with `Ok(())`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dsm_cert_sync::{Reconciler, SessionClient, SyncConfig, SyncScheduler};
//!
//! # async fn example(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SessionClient::new(config.connection.clone())?);
//! let reconciler = Reconciler::new(client, config.target, config.cert_path, config.key_path);
//! let scheduler = SyncScheduler::new(reconciler, config.check_interval);
//!
//! scheduler
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::reconcile::{Reconciler, SyncOutcome};
use crate::watch::{is_relevant, FileWatch};

/// Minimum time between the starts of two attempts.
pub const MIN_SYNC_SPACING: Duration = Duration::from_secs(30);

/// What caused an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The initial attempt when the scheduler starts.
    Startup,
    /// The periodic timer.
    Timer,
    /// A change to the certificate or key file.
    FileChange,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Timer => write!(f, "timer"),
            Self::FileChange => write!(f, "file change"),
        }
    }
}

/// Events emitted while the scheduler runs.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// An attempt passed the spacing check and is starting.
    AttemptStarted {
        /// What caused it.
        trigger: Trigger,
    },

    /// A trigger arrived too soon after the previous attempt.
    AttemptSkipped {
        /// What caused it.
        trigger: Trigger,
        /// Time since the previous attempt started.
        since_last: Duration,
    },

    /// An attempt finished successfully.
    Synced(SyncOutcome),

    /// The file watch backend reported an error.
    WatchFailed {
        /// Error text.
        error: String,
    },
}

/// Handler for scheduler events.
pub trait SyncEventHandler: Send + Sync {
    /// Handle a scheduler event.
    fn handle_event(&self, event: SyncEvent);
}

/// Drives reconciliation for one target.
pub struct SyncScheduler {
    reconciler: Reconciler,
    check_interval: Duration,
    min_spacing: Duration,
    last_attempt: Mutex<Option<Instant>>,
    event_handler: Option<Arc<dyn SyncEventHandler>>,
}

impl SyncScheduler {
    /// Create a scheduler checking every `check_interval`.
    pub fn new(reconciler: Reconciler, check_interval: Duration) -> Self {
        Self {
            reconciler,
            check_interval,
            min_spacing: MIN_SYNC_SPACING,
            last_attempt: Mutex::new(None),
            event_handler: None,
        }
    }

    /// Set the event handler.
    pub fn with_event_handler(mut self, handler: Arc<dyn SyncEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// The reconciler driven by this scheduler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run an attempt unless the previous one started less than
    /// [`MIN_SYNC_SPACING`] ago.
    ///
    /// Returns `Ok(None)` when skipped. The spacing lock is held for the
    /// whole attempt, so concurrent callers are serialized.
    pub async fn try_sync(&self, trigger: Trigger) -> Result<Option<SyncOutcome>> {
        let mut last = self.last_attempt.lock().await;
        let now = Instant::now();

        if let Some(previous) = *last {
            let since_last = now.duration_since(previous);
            if since_last < self.min_spacing {
                warn!(
                    "Skipping {} check since the last one ran {:?} ago",
                    trigger, since_last
                );
                self.emit(SyncEvent::AttemptSkipped {
                    trigger,
                    since_last,
                });
                return Ok(None);
            }
        }
        *last = Some(now);

        debug!("Starting {} check", trigger);
        self.emit(SyncEvent::AttemptStarted { trigger });
        let outcome = self.reconciler.reconcile().await?;
        info!("Sync complete: {}", outcome);
        self.emit(SyncEvent::Synced(outcome.clone()));
        Ok(Some(outcome))
    }

    /// Run until `shutdown` completes, the watch channel closes, or an
    /// attempt fails.
    ///
    /// # Errors
    ///
    /// Returns the first attempt error, or a watch error if the files cannot
    /// be watched at startup.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (mut watch, mut changes) = FileWatch::new(self.reconciler.watched_paths())?;
        tokio::pin!(shutdown);

        self.try_sync(Trigger::Startup).await?;

        debug!("Checking certificate every {:?}", self.check_interval);
        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutting down certificate sync");
                    return Ok(());
                }

                _ = ticker.tick() => {
                    watch.rearm();
                    self.try_sync(Trigger::Timer).await?;
                }

                message = changes.recv() => match message {
                    None => {
                        info!("File watch closed, stopping");
                        return Ok(());
                    }
                    Some(Ok(event)) if is_relevant(&event) => {
                        debug!("File event {:?} on {:?}", event.kind, event.paths);
                        watch.rearm();
                        self.try_sync(Trigger::FileChange).await?;
                    }
                    Some(Ok(event)) => {
                        debug!("Ignoring file event {:?}", event.kind);
                    }
                    Some(Err(e)) => {
                        error!("File watcher had an error: {}", e);
                        self.emit(SyncEvent::WatchFailed { error: e.to_string() });
                    }
                },
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(ref handler) = self.event_handler {
            handler.handle_event(event);
        }
    }
}
