// SPDX-License-Identifier: Apache-2.0

pub(crate) mod client_identity;
pub(crate) mod handlers;
pub mod response_contract;
