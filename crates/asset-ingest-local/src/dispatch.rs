use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::pipeline::Pipeline;

/// Moves create events through the settle delay and into a worker pool.
///
/// Each event gets its own timer task, so the event path never waits for the
/// settle delay. Settled paths go through a bounded queue to `workers` tasks
/// that run the pipeline concurrently.
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    settle_delay: Duration,
    workers: usize,
    queue_capacity: usize,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<Pipeline>,
        settle_delay: Duration,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            pipeline,
            settle_delay,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Run until `events` closes or `shutdown` flips to true.
    ///
    /// When `events` closes, everything already scheduled is processed.
    /// On shutdown, only in-flight files are allowed to finish: pending settle
    /// timers are dropped and queued files are not started, so both stay in
    /// place for a later rescan.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<PathBuf>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let (queue_tx, queue_rx) = mpsc::channel::<PathBuf>(self.queue_capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (stop_tx, stop_rx) = watch::channel(false);

        let workers: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    queue_rx.clone(),
                    stop_rx.clone(),
                    self.pipeline.clone(),
                ))
            })
            .collect();

        let mut timers = JoinSet::new();
        let mut stopping = false;

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|&v| v) => {
                    info!("Shutdown requested, no longer accepting new files");
                    stopping = true;
                    break;
                }
                event = events.recv() => {
                    let Some(path) = event else { break };
                    let tx = queue_tx.clone();
                    let delay = self.settle_delay;
                    timers.spawn(async move {
                        tokio::time::sleep(delay).await;
                        debug!("Settled: {}", path.display());
                        if tx.send(path).await.is_err() {
                            debug!("Work queue closed, dropping settled file");
                        }
                    });
                }
                Some(_) = timers.join_next(), if !timers.is_empty() => {}
            }
        }

        drop(events);
        if stopping {
            if !timers.is_empty() {
                info!("Dropping {} file(s) still in their settle delay", timers.len());
            }
            timers.abort_all();
            let _ = stop_tx.send(true);
        }
        while timers.join_next().await.is_some() {}

        // Without a stop, workers exit once the queue is drained and every sender is gone
        drop(queue_tx);
        for result in join_all(workers).await {
            if let Err(e) = result {
                warn!("Pipeline worker failed: {}", e);
            }
        }
        drop(stop_tx);
        info!("Dispatcher stopped");
    }
}

async fn worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    mut stop: watch::Receiver<bool>,
    pipeline: Arc<Pipeline>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.wait_for(|&v| v) => None,
            next = async { queue.lock().await.recv().await } => next,
        };
        let Some(path) = next else { break };
        debug!(worker = id, "Processing {}", path.display());
        pipeline.handle(&path).await;
    }
}
