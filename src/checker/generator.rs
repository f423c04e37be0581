//! Task Generator (component F)
//!
//! The sole writer of the task queue. Iterates combos × configs in
//! combo-major order, drops tasks a dead proxy pool can never service, and
//! exits promptly on cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::types::Task;
use crate::combo::Combo;
use crate::proxy::{ProxyRegistry, Strategy};
use crate::shutdown::ShutdownSignal;

const PROXY_PICK_RETRIES: usize = 5;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Drives the combos × configs cartesian product onto the task queue.
pub struct TaskGenerator {
    registry: Arc<ProxyRegistry>,
    strategy: Strategy,
}

impl TaskGenerator {
    pub fn new(registry: Arc<ProxyRegistry>, strategy: Strategy) -> Self {
        Self { registry, strategy }
    }

    /// Run to completion or cancellation, closing `tx` when done — the
    /// generator is the task queue's only producer.
    #[instrument(skip(self, combos, configs, tx, shutdown))]
    pub async fn run(
        self,
        combos: Vec<Combo>,
        configs: Vec<Arc<super::types::CheckConfig>>,
        tx: mpsc::Sender<Task>,
        mut shutdown: ShutdownSignal,
    ) {
        let mut warned_configs = std::collections::HashSet::new();

        for combo in &combos {
            for config in &configs {
                if shutdown.is_cancelled() {
                    info!("task generator exiting on cancellation");
                    return;
                }

                if config.requires_proxy && self.registry.all_dead().await {
                    if warned_configs.insert(config.name.clone()) {
                        warn!(config = %config.name, "dropping tasks: config requires a proxy but none are available");
                    }
                    continue;
                }

                let assigned_proxy = if config.requires_proxy {
                    match self.pick_working_proxy().await {
                        Some(handle) => Some(handle),
                        None => {
                            if warned_configs.insert(config.name.clone()) {
                                warn!(config = %config.name, "dropping task: no working proxy available after retries");
                            }
                            continue;
                        }
                    }
                } else if config.may_use_proxy {
                    self.registry.pick(&self.strategy).await
                } else {
                    None
                };

                let task = Task {
                    task_id: NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst),
                    combo: combo.clone(),
                    config: config.clone(),
                    assigned_proxy,
                };

                tokio::select! {
                    result = tx.send(task) => {
                        if result.is_err() {
                            info!("task queue closed; generator exiting");
                            return;
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("task generator exiting on cancellation mid-send");
                        return;
                    }
                }
            }
        }
    }

    async fn pick_working_proxy(&self) -> Option<crate::proxy::ProxyHandle> {
        for _ in 0..PROXY_PICK_RETRIES {
            if let Some(handle) = self.registry.pick(&self.strategy).await {
                return Some(handle);
            }
        }
        None
    }
}
