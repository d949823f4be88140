// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kx-adapters: ports to the cluster, the AI backend and the shadow provisioner

pub mod analysis;
pub mod cluster;
pub mod shadow;
pub mod subprocess;

pub use analysis::{AnalysisAdapter, AnalysisError, ChatAnalysisAdapter, ChatConfig, ChatProvider};
pub use cluster::{ClusterAdapter, ClusterConnector, ClusterError, KubeClusterAdapter, KubeConnector};
pub use shadow::{ShadowAdapter, ShadowConfig, ShadowError, VclusterShadowAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use analysis::{AnalysisCall, FakeAnalysisAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use cluster::{ApplyCall, FakeClusterAdapter, FakeConnector};
#[cfg(any(test, feature = "test-support"))]
pub use shadow::{FakeShadowAdapter, ShadowCall};
