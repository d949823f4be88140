// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan sessions, their bounded log, and resource snapshots

use crate::analysis::Issue;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

crate::define_id! {
    /// Unique identifier for a scan session.
    pub struct ScanId("scn-");
}

/// Default cap on retained scan log lines.
pub const DEFAULT_LOG_CAP: usize = 1000;

/// Per-cluster map of `unique_id -> version token` from the last committed scan.
pub type ResourceSnapshot = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Full,
    Smart,
}

crate::simple_display! {
    ScanType {
        Full => "full",
        Smart => "smart",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Initializing,
    FetchingResources,
    Analyzing,
    Completed,
    Stopped,
    Failed,
}

crate::simple_display! {
    ScanStatus {
        Initializing => "initializing",
        FetchingResources => "fetching_resources",
        Analyzing => "analyzing",
        Completed => "completed",
        Stopped => "stopped",
        Failed => "failed",
    }
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Stopped | ScanStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Pending,
    Analyzed,
    Ignored,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp_ms: u64,
    pub message: String,
}

/// Append-only log that drops its oldest lines once `cap` is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLog {
    cap: usize,
    lines: VecDeque<LogLine>,
}

impl ScanLog {
    pub fn with_cap(cap: usize) -> Self {
        Self { cap: cap.max(1), lines: VecDeque::new() }
    }

    pub fn push(&mut self, timestamp_ms: u64, message: impl Into<String>) {
        while self.lines.len() >= self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine { timestamp_ms, message: message.into() });
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&LogLine> {
        self.lines.back()
    }
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::with_cap(DEFAULT_LOG_CAP)
    }
}

/// Display entry for a resource seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub unique_id: String,
}

impl From<&Resource> for ResourceRef {
    fn from(r: &Resource) -> Self {
        Self {
            kind: r.kind.clone(),
            name: r.name.clone(),
            namespace: r.namespace.clone(),
            unique_id: r.unique_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: ScanId,
    pub cluster_id: String,
    pub scan_type: ScanType,
    /// Resource kinds to include; empty means all.
    #[serde(default)]
    pub filters: Vec<String>,
    pub status: ScanStatus,
    pub progress: u8,
    #[serde(default)]
    pub resource_status: HashMap<String, ResourceStatus>,
    #[serde(default)]
    pub resources_list: Vec<ResourceRef>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub log: ScanLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_pending: Option<ResourceSnapshot>,
    #[serde(default)]
    pub total_queued: usize,
    #[serde(default)]
    pub analyzed_count: usize,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl ScanSession {
    pub fn new(
        id: ScanId,
        cluster_id: impl Into<String>,
        scan_type: ScanType,
        filters: Vec<String>,
        log_cap: usize,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            cluster_id: cluster_id.into(),
            scan_type,
            filters,
            status: ScanStatus::Initializing,
            progress: 0,
            resource_status: HashMap::new(),
            resources_list: Vec::new(),
            issues: Vec::new(),
            summary: String::new(),
            log: ScanLog::with_cap(log_cap),
            snapshot_pending: None,
            total_queued: 0,
            analyzed_count: 0,
            created_at_ms: now_ms,
            finished_at_ms: None,
        }
    }

    /// Whether `kind` passes the session's kind filters.
    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.eq_ignore_ascii_case(kind))
    }

    /// Enter a terminal status, dropping any uncommitted snapshot unless completed.
    pub fn finish(&mut self, status: ScanStatus, now_ms: u64) {
        self.status = status;
        self.finished_at_ms = Some(now_ms);
        if status != ScanStatus::Completed {
            self.snapshot_pending = None;
        }
    }

    /// Recompute progress from analyzed and queued counts.
    pub fn update_progress(&mut self) {
        self.progress = progress_percent(self.analyzed_count, self.total_queued);
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            id: self.id.clone(),
            cluster_id: self.cluster_id.clone(),
            status: self.status,
            progress: self.progress,
            created_at_ms: self.created_at_ms,
            total_issues: self.issues.len(),
            scan_type: self.scan_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub id: ScanId,
    pub cluster_id: String,
    pub status: ScanStatus,
    pub progress: u8,
    pub created_at_ms: u64,
    pub total_issues: usize,
    pub scan_type: ScanType,
}

/// `floor(100 * analyzed / total)`, clamped to 100; an empty queue is 100%.
pub fn progress_percent(analyzed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((analyzed.min(total) * 100) / total) as u8
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
