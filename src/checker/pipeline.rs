//! Attempt Pipeline (component H)
//!
//! Build → execute → classify → decide-retry for one (combo, config) task.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, instrument, warn};

use super::types::{AttemptError, AttemptResult, AttemptStatus, CheckConfig, HttpMethod, RetryPolicy, Task};
use crate::proxy::{Outcome, ProxyHandle, ProxyRegistry, Strategy};
use crate::transport::{HttpTransport, PreparedRequest};
use crate::workflow::{render, VariableStore};

const MAX_ATTEMPT_DEADLINE: Duration = Duration::from_secs(30);
const BACKOFF_STEP_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 5000;

/// Immutable collaborators the pipeline needs for every attempt. Response
/// capture steps are per-config (`task.config.capture_steps`), not held
/// here.
pub struct PipelineContext {
    pub transport: Arc<HttpTransport>,
    pub registry: Arc<ProxyRegistry>,
    pub strategy: Strategy,
    pub request_timeout: Duration,
    pub retry_count: usize,
}

fn correlation_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn effective_deadline(request_timeout: Duration) -> Duration {
    request_timeout.min(MAX_ATTEMPT_DEADLINE)
}

fn build_request(config: &CheckConfig, store: &VariableStore) -> PreparedRequest {
    let url = render(&config.url_template, store);

    let mut headers: std::collections::HashMap<String, String> = config
        .header_templates
        .iter()
        .map(|(name, template)| (name.clone(), render(template, store)))
        .collect();

    let has_content_type = headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"));

    let body = if config.method.is_body_bearing() {
        let rendered_fields: Vec<(String, String)> = config
            .body_fields
            .iter()
            .map(|(name, template)| (name.clone(), render(template, store)))
            .collect();

        if !has_content_type {
            headers.insert(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            );
        }

        Some(
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(rendered_fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish(),
        )
    } else {
        None
    };

    PreparedRequest {
        method: config.method,
        url,
        headers,
        body,
    }
}

fn classify_response(config: &CheckConfig, status: u16, body: &str) -> AttemptStatus {
    if config.success_statuses.contains(&status) {
        return AttemptStatus::Success;
    }
    if config.failure_statuses.contains(&status) {
        return AttemptStatus::Fail;
    }
    if config.success_markers.iter().any(|m| body.contains(m.as_str())) {
        return AttemptStatus::Success;
    }
    if config.failure_markers.iter().any(|m| body.contains(m.as_str())) {
        return AttemptStatus::Fail;
    }
    AttemptStatus::Fail
}

fn outcome_for(error: &AttemptError) -> Outcome {
    match error {
        AttemptError::Timeout => Outcome::Timeout,
        AttemptError::ConnectError => Outcome::ConnectError,
        AttemptError::ProtocolError => Outcome::ProtocolError,
        AttemptError::ParseError(_) | AttemptError::BuildError(_) => Outcome::ConnectError,
    }
}

/// Decide whether a failed attempt gets another try, drawing down the
/// right budget for the error's [`RetryPolicy`] (spec §7). `remaining`
/// holds the connect/timeout budget; `protocol_retry_used` is a separate
/// one-shot flag for `protocol_error`, so a chain of protocol errors never
/// eats into (or inflates) the connect/timeout retry count.
fn should_retry(error: &AttemptError, remaining: &mut usize, protocol_retry_used: &mut bool) -> bool {
    match error.retry_policy() {
        RetryPolicy::FullBudget => {
            *remaining -= 1;
            *remaining > 0
        }
        RetryPolicy::OnceOnly => {
            if *protocol_retry_used {
                false
            } else {
                *protocol_retry_used = true;
                true
            }
        }
        RetryPolicy::None => false,
    }
}

/// Run the full build/execute/classify/retry pipeline for one task.
#[instrument(skip(ctx, task), fields(task_id = task.task_id, config = %task.config.name))]
pub async fn run_pipeline(ctx: &PipelineContext, task: Task) -> AttemptResult {
    let correlation_id = correlation_id();
    let mut store = VariableStore::from_combo(
        &task.combo.username,
        &task.combo.password,
        task.combo.email.as_deref(),
    );

    let deadline = effective_deadline(ctx.request_timeout);
    let mut remaining = ctx.retry_count.max(1);
    let mut protocol_retry_used = false;
    let mut attempt_number: u64 = 0;
    let mut current_proxy = task.assigned_proxy;
    let mut last_error: Option<AttemptError> = None;

    loop {
        attempt_number += 1;
        let request = build_request(&task.config, &store);
        let proxy_url = match current_proxy {
            Some(handle) => ctx.registry.url_for(handle).await,
            None => None,
        };

        match ctx
            .transport
            .execute(&request, proxy_url.as_deref(), deadline)
            .await
        {
            Ok(response) => {
                if let Some(handle) = current_proxy {
                    ctx.registry
                        .report(handle, Outcome::Success { latency_ms: response.latency_ms })
                        .await;
                }

                let status = classify_response(&task.config, response.status, &response.body);
                for step in &task.config.capture_steps {
                    step.run(&response.body, &mut store);
                }

                return AttemptResult {
                    task_id: task.task_id,
                    correlation_id,
                    combo: task.combo,
                    config_name: task.config.name.clone(),
                    status,
                    http_status: Some(response.status),
                    latency_ms: response.latency_ms,
                    error_kind: None,
                    proxy_used: current_proxy,
                    captured_variables: store.snapshot_redacted(),
                    timestamp: std::time::SystemTime::now(),
                };
            }
            Err(err) => {
                debug!(error_kind = err.kind(), attempt_number, "transport error");
                if let Some(handle) = current_proxy {
                    ctx.registry.report(handle, outcome_for(&err)).await;
                }

                if should_retry(&err, &mut remaining, &mut protocol_retry_used) {
                    let backoff_ms = (BACKOFF_STEP_MS * attempt_number).min(BACKOFF_CAP_MS);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;

                    if task.config.requires_proxy {
                        if let Some(new_handle) = ctx.registry.pick(&ctx.strategy).await {
                            current_proxy = Some(new_handle);
                        }
                        // fallback: keep current proxy if none is available
                    }

                    last_error = Some(err);
                    continue;
                }

                last_error = Some(err);
                break;
            }
        }
    }

    let error = last_error.unwrap_or(AttemptError::ProtocolError);
    if !error.is_retryable() {
        warn!(error_kind = error.kind(), "non-retryable build error");
    }

    AttemptResult {
        task_id: task.task_id,
        correlation_id,
        combo: task.combo,
        config_name: task.config.name.clone(),
        status: AttemptStatus::Error,
        http_status: None,
        latency_ms: 0.0,
        error_kind: Some(error.kind().to_string()),
        proxy_used: current_proxy,
        captured_variables: store.snapshot_redacted(),
        timestamp: std::time::SystemTime::now(),
    }
}
