// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvRecord {
    pub project: String,
    pub key: String,
    pub value: String,
    pub last_set_by: String,
}

impl KvRecord {
    #[must_use]
    pub fn new(project: &str, key: &str, value: &str, last_set_by: &str) -> Self {
        Self {
            project: project.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            last_set_by: last_set_by.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Durable `(project, key) -> value` mapping with upsert writes.
pub trait KvStore: Send + Sync {
    fn get(&self, project: &str, key: &str) -> Result<Option<String>, StoreError>;
    /// Inserts or replaces the record for `(record.project, record.key)`.
    fn upsert(&self, record: &KvRecord) -> Result<(), StoreError>;
    /// Succeeds whether or not the record existed.
    fn delete(&self, project: &str, key: &str) -> Result<(), StoreError>;
}
