// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kortex daemon library
//!
//! Startup, the socket listener and the IPC protocol types used by clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod settings;

pub use lifecycle::{startup, Config, DaemonCtx, DaemonState, LifecycleError, StartupResult};
pub use listener::{ListenCtx, Listener};
pub use protocol::{Request, Response};
pub use settings::Settings;
