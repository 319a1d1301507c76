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

//! Change notifications for the local certificate and key files.
//!
//! Tools that renew certificates often write a temporary file and rename it
//! over the old one. Backends that watch inodes lose the subscription when
//! that happens, so [`FileWatch::rearm`] drops and re-adds every watch; the
//! scheduler calls it after each delivered event and on every timer tick.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the notification queue. Events beyond it are dropped; a
/// queued event already guarantees a check.
const WATCH_QUEUE_DEPTH: usize = 16;

/// A change notification or a backend error.
pub type WatchMessage = notify::Result<Event>;

/// Watches a fixed set of files.
pub struct FileWatch {
    watcher: RecommendedWatcher,
    paths: Vec<PathBuf>,
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl FileWatch {
    /// Start watching `paths`; notifications arrive on the returned receiver.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot be created or any path cannot be watched.
    pub fn new(
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> crate::Result<(Self, mpsc::Receiver<WatchMessage>)> {
        let (tx, rx) = mpsc::channel(WATCH_QUEUE_DEPTH);
        let watcher = notify::recommended_watcher(move |message: WatchMessage| {
            let _ = tx.try_send(message);
        })?;

        let mut watch = Self {
            watcher,
            paths: paths.into_iter().collect(),
        };
        for path in &watch.paths {
            watch.watcher.watch(path, RecursiveMode::NonRecursive)?;
            debug!("Will recheck if {} changes", path.display());
        }

        Ok((watch, rx))
    }

    /// The watched paths.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Re-register every path. Failures are logged; the next call retries.
    pub fn rearm(&mut self) {
        for path in &self.paths {
            let _ = self.watcher.unwatch(path);
            if let Err(e) = self.watcher.watch(path, RecursiveMode::NonRecursive) {
                warn!("Failed to re-watch {}: {}", path.display(), e);
            }
        }
    }
}

/// Whether an event can mean the file contents changed.
pub fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
