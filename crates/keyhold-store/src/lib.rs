// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod memory;
mod sqlite;

pub use keyhold_core::{KvRecord, KvStore, StoreError};
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

pub const CRATE_NAME: &str = "keyhold-store";
