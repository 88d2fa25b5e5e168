// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub mod catalog;
pub mod classifier;
pub mod gate;
pub mod penalty;
pub mod store;
pub mod time;

pub use catalog::{Signature, BUILTIN_SIGNATURES};
pub use classifier::ContentClassifier;
pub use gate::{WriteError, WriteErrorKind, WriteGate, WriteRequest};
pub use penalty::{PenaltyStore, DEFAULT_PENALTY};
pub use store::{KvRecord, KvStore, StoreError};

pub const CRATE_NAME: &str = "keyhold-core";
