// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use keyhold_core::time::unix_millis_now;
use keyhold_core::PenaltyStore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Periodically drops lapsed penalties so the table stays bounded by
/// recently rejected clients. A zero interval disables the task.
pub(crate) fn spawn_penalty_sweeper(
    penalties: Arc<PenaltyStore>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = penalties.sweep_expired(unix_millis_now());
            if removed > 0 {
                debug!(removed, remaining = penalties.len(), "swept expired penalties");
            }
        }
    }))
}
