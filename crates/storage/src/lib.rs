// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kx-storage: durable scan state and the signed audit chain

pub mod audit;
mod fsutil;
pub mod scans;

pub use audit::{
    cluster_history, verify_log, AuditChain, AuditEntry, AuditError, AuditKeys, EntryCheck,
    VerifyReport, DEFAULT_KEY_BITS, GENESIS_HASH,
};
pub use scans::{recover_interrupted, ScanState, ScanStore, StoreError, INTERRUPTED_MESSAGE};
