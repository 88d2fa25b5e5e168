// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::classifier::ContentClassifier;
use crate::penalty::{PenaltyStore, DEFAULT_PENALTY};
use crate::store::{KvRecord, KvStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteErrorKind {
    RateLimited,
    MissingKey,
    MalformedBody,
    ContentRejected,
    StorageError,
}

impl WriteErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "RateLimited",
            Self::MissingKey => "MissingKey",
            Self::MalformedBody => "MalformedBody",
            Self::ContentRejected => "ContentRejected",
            Self::StorageError => "StorageError",
        }
    }
}

#[derive(Debug)]
pub enum WriteError {
    RateLimited { until_ms: u64 },
    MissingKey,
    MalformedBody(String),
    ContentRejected { format: &'static str },
    Storage(StoreError),
}

impl WriteError {
    #[must_use]
    pub const fn kind(&self) -> WriteErrorKind {
        match self {
            Self::RateLimited { .. } => WriteErrorKind::RateLimited,
            Self::MissingKey => WriteErrorKind::MissingKey,
            Self::MalformedBody(_) => WriteErrorKind::MalformedBody,
            Self::ContentRejected { .. } => WriteErrorKind::ContentRejected,
            Self::Storage(_) => WriteErrorKind::StorageError,
        }
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited { until_ms } => {
                write!(f, "client is penalized until {until_ms}")
            }
            Self::MissingKey => write!(f, "no key specified"),
            Self::MalformedBody(e) => write!(f, "malformed body: {e}"),
            Self::ContentRejected { format } => {
                write!(f, "value looks like an encoded {format} file")
            }
            Self::Storage(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for WriteError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub client_id: &'a str,
    pub project: &'a str,
    pub key: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Deserialize)]
struct SetBody {
    val: String,
}

/// Admission and content policy in front of every write.
pub struct WriteGate {
    classifier: ContentClassifier,
    penalties: Arc<PenaltyStore>,
    store: Arc<dyn KvStore>,
    penalty: Duration,
}

impl WriteGate {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, penalties: Arc<PenaltyStore>) -> Self {
        Self {
            classifier: ContentClassifier::default(),
            penalties,
            store,
            penalty: DEFAULT_PENALTY,
        }
    }

    #[must_use]
    pub fn with_penalty(mut self, penalty: Duration) -> Self {
        self.penalty = penalty;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: ContentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn penalties(&self) -> &Arc<PenaltyStore> {
        &self.penalties
    }

    #[must_use]
    pub fn penalty(&self) -> Duration {
        self.penalty
    }

    /// Checks run in a fixed order and stop at the first failure:
    /// penalty window, key presence, body shape, content, then storage.
    pub fn handle_write(&self, req: &WriteRequest<'_>, now_ms: u64) -> Result<(), WriteError> {
        if self.penalties.is_penalized(req.client_id, now_ms) {
            let until_ms = self.penalties.expires_at(req.client_id).unwrap_or(now_ms);
            info!(client_id = %req.client_id, until_ms, "write refused during penalty window");
            return Err(WriteError::RateLimited { until_ms });
        }

        let key = req.key.ok_or(WriteError::MissingKey)?;

        let body: SetBody = serde_json::from_slice(req.body)
            .map_err(|e| WriteError::MalformedBody(e.to_string()))?;

        if let Some(sig) = self.classifier.detect(&body.val) {
            self.penalties.penalize(req.client_id, now_ms, self.penalty);
            warn!(
                client_id = %req.client_id,
                format = sig.format,
                magic = %sig.magic_hex(),
                penalty_ms = u64::try_from(self.penalty.as_millis()).unwrap_or(u64::MAX),
                "file detected with header"
            );
            return Err(WriteError::ContentRejected { format: sig.format });
        }

        let record = KvRecord::new(req.project, key, &body.val, req.client_id);
        self.store.upsert(&record).map_err(|e| {
            error!(
                client_id = %req.client_id,
                project = %req.project,
                key = %key,
                "kv upsert failed: {e}"
            );
            WriteError::Storage(e)
        })
    }
}
