// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background eviction of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::SessionStore;

/// Spawns a task that evicts sessions idle for longer than `idle` every
/// `interval`, until `cancel` fires.
pub fn spawn_eviction_sweeper(
    sessions: Arc<SessionStore>,
    interval: Duration,
    idle: chrono::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        info!(interval = ?interval, idle_secs = idle.num_seconds(), "session sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = sessions.evict_idle(idle).await {
                        warn!(error = %e, "session eviction failed");
                    }
                }
            }
        }
    })
}
