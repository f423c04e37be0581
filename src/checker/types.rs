//! Core Data Model for the Checking Pipeline (spec §3)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::combo::Combo;
use crate::proxy::ProxyHandle;
use crate::workflow::CaptureStep;

/// HTTP method a [`CheckConfig`] may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl HttpMethod {
    pub fn is_body_bearing(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// An opaque, pre-parsed site recipe (spec §3's "Config"). Produced by the
/// out-of-scope `.opk`/`.svb`/`.loli` parsers; the core only ever consumes
/// this already-built value.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub name: Arc<str>,
    pub method: HttpMethod,
    pub url_template: String,
    pub header_templates: HashMap<String, String>,
    pub body_fields: HashMap<String, String>,
    pub success_statuses: HashSet<u16>,
    pub failure_statuses: HashSet<u16>,
    pub success_markers: Vec<String>,
    pub failure_markers: Vec<String>,
    pub requires_proxy: bool,
    pub may_use_proxy: bool,
    /// Response-capture workflow run on every successful attempt against
    /// this config, before the result is handed to the aggregator
    /// (spec §4.4, §4.6 step 7).
    pub capture_steps: Vec<CaptureStep>,
}

/// A single-use unit of work: one combo against one config, with an
/// optionally pre-assigned proxy (spec §3).
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: u64,
    pub combo: Combo,
    pub config: Arc<CheckConfig>,
    pub assigned_proxy: Option<ProxyHandle>,
}

/// Final classification of one completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    Fail,
    Error,
}

/// Closed taxonomy of non-fatal error kinds surfaced on an `error` result
/// (spec §7). Never panics the worker; always converted into a status.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("build error: {0}")]
    BuildError(String),
    #[error("connect error")]
    ConnectError,
    #[error("timeout")]
    Timeout,
    #[error("protocol error")]
    ProtocolError,
}

/// How many times an error may be retried, and from which budget
/// (spec §7): `connect_error`/`timeout` draw from the attempt's full
/// `retry_count` budget; `protocol_error` gets exactly one retry
/// regardless of how much of that budget remains; parse/build errors are
/// deterministic and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    None,
    FullBudget,
    OnceOnly,
}

impl AttemptError {
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::ParseError(_) => "parse_error",
            AttemptError::BuildError(_) => "build_error",
            AttemptError::ConnectError => "connect_error",
            AttemptError::Timeout => "timeout",
            AttemptError::ProtocolError => "protocol_error",
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            AttemptError::ConnectError | AttemptError::Timeout => RetryPolicy::FullBudget,
            AttemptError::ProtocolError => RetryPolicy::OnceOnly,
            AttemptError::ParseError(_) | AttemptError::BuildError(_) => RetryPolicy::None,
        }
    }

    /// Transport-layer errors get backoff + retry; build errors are
    /// deterministic and never retried (spec §7).
    pub fn is_retryable(&self) -> bool {
        self.retry_policy() != RetryPolicy::None
    }
}

/// The outcome of one completed task, handed to the result aggregator
/// (spec §3).
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub task_id: u64,
    pub correlation_id: String,
    pub combo: Combo,
    pub config_name: Arc<str>,
    pub status: AttemptStatus,
    pub http_status: Option<u16>,
    pub latency_ms: f64,
    pub error_kind: Option<String>,
    pub proxy_used: Option<ProxyHandle>,
    pub captured_variables: HashMap<String, String>,
    pub timestamp: SystemTime,
}

/// Aggregate engine statistics, exclusively mutated by the aggregator and
/// read by any number of observers through a shared read-write lock.
#[derive(Debug, Clone)]
pub struct Stats {
    pub start_time: SystemTime,
    pub total_combos: usize,
    pub total_proxies: usize,
    pub valid: u64,
    pub invalid: u64,
    pub errors: u64,
    pub current_cpm: f64,
    pub active_workers: usize,
    pub working_proxies: usize,
    pub elapsed_seconds: f64,
}

impl Stats {
    pub fn new(total_combos: usize, total_proxies: usize) -> Self {
        Self {
            start_time: SystemTime::now(),
            total_combos,
            total_proxies,
            valid: 0,
            invalid: 0,
            errors: 0,
            current_cpm: 0.0,
            active_workers: 0,
            working_proxies: 0,
            elapsed_seconds: 0.0,
        }
    }

    pub fn total_processed(&self) -> u64 {
        self.valid + self.invalid + self.errors
    }
}
