// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use keyhold_core::{KvRecord, KvStore, StoreError};

type Rows = BTreeMap<(String, String), KvRecord>;

/// Non-durable store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryKvStore {
    rows: Mutex<Rows>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upsert and delete fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    fn rows(&self) -> Result<MutexGuard<'_, Rows>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError("memory store lock poisoned".to_string()))
    }

    pub fn get_record(&self, project: &str, key: &str) -> Result<Option<KvRecord>, StoreError> {
        Ok(self
            .rows()?
            .get(&(project.to_string(), key.to_string()))
            .cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.rows()?.is_empty())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError("memory store is read-only".to_string()));
        }
        Ok(())
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, project: &str, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError("memory store read failure".to_string()));
        }
        Ok(self.get_record(project, key)?.map(|r| r.value))
    }

    fn upsert(&self, record: &KvRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.rows()?.insert(
            (record.project.clone(), record.key.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn delete(&self, project: &str, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.rows()?.remove(&(project.to_string(), key.to_string()));
        Ok(())
    }
}
