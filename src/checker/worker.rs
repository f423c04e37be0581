//! Worker Pool (component G)
//!
//! Fixed fan-out of workers consuming tasks from the shared queue and
//! running the attempt pipeline. Receiving from a closed queue or an
//! already-cancelled engine terminates the worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument};

use super::pipeline::{run_pipeline, PipelineContext};
use super::types::{AttemptResult, Task};
use crate::shutdown::ShutdownSignal;

/// Liveness counter shared across every worker in the pool, backing
/// `Stats::active_workers` with true liveness rather than a static
/// `max_workers` (an Open Question the spec leaves either way).
pub type ActiveWorkers = Arc<AtomicUsize>;

/// Spawn `count` workers, each looping task-receive → pipeline → result-send
/// until the task queue closes or the engine cancels.
pub fn spawn_pool(
    count: usize,
    ctx: Arc<PipelineContext>,
    tasks: mpsc::Receiver<Task>,
    results: mpsc::Sender<AttemptResult>,
    shutdown: ShutdownSignal,
    active_workers: ActiveWorkers,
) -> Vec<tokio::task::JoinHandle<()>> {
    let tasks = Arc::new(tokio::sync::Mutex::new(tasks));
    (0..count)
        .map(|id| {
            let ctx = ctx.clone();
            let tasks = tasks.clone();
            let results = results.clone();
            let shutdown = shutdown.clone();
            let active_workers = active_workers.clone();
            tokio::spawn(worker_loop(id, ctx, tasks, results, shutdown, active_workers))
        })
        .collect()
}

#[instrument(skip(ctx, tasks, results, shutdown, active_workers), fields(worker_id))]
async fn worker_loop(
    worker_id: usize,
    ctx: Arc<PipelineContext>,
    tasks: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::Sender<AttemptResult>,
    mut shutdown: ShutdownSignal,
    active_workers: ActiveWorkers,
) {
    loop {
        let task = {
            let mut tasks = tasks.lock().await;
            tokio::select! {
                task = tasks.recv() => task,
                _ = shutdown.cancelled() => None,
            }
        };

        let Some(task) = task else {
            info!(worker_id, "worker exiting: queue closed or cancelled");
            return;
        };

        active_workers.fetch_add(1, Ordering::SeqCst);
        let result = run_pipeline(&ctx, task).await;
        active_workers.fetch_sub(1, Ordering::SeqCst);

        if results.send(result).await.is_err() {
            info!(worker_id, "worker exiting: result queue closed");
            return;
        }
    }
}
