// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_PENALTY: Duration = Duration::from_millis(10_000);

/// Per-client penalty windows, keyed by client identifier.
///
/// Values are absolute expiry instants in unix milliseconds. Records are only
/// overwritten, never extended, and stay in the map after they expire unless
/// [`PenaltyStore::sweep_expired`] is called. Nothing here is persisted.
#[derive(Debug, Default)]
pub struct PenaltyStore {
    expiries: Mutex<HashMap<String, u64>>,
}

impl PenaltyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // Every critical section is a single map operation, so a poisoned map is still whole.
        self.expiries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_penalized(&self, client_id: &str, now_ms: u64) -> bool {
        self.lock()
            .get(client_id)
            .is_some_and(|expiry| *expiry > now_ms)
    }

    pub fn penalize(&self, client_id: &str, now_ms: u64, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let expiry = now_ms.saturating_add(millis);
        self.lock().insert(client_id.to_string(), expiry);
    }

    #[must_use]
    pub fn expires_at(&self, client_id: &str) -> Option<u64> {
        self.lock().get(client_id).copied()
    }

    /// Drops dormant records. Returns how many were removed.
    pub fn sweep_expired(&self, now_ms: u64) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, expiry| *expiry > now_ms);
        before - map.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
