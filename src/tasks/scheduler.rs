use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::grading::evaluator::Evaluator;
use crate::tasks::evaluation;

const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Runs the evaluation workers and the stale-run sweeper until `shutdown` flips to `true`.
pub(crate) async fn run(
    state: AppState,
    evaluator: Arc<Evaluator>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let concurrency = state.settings().evaluation().concurrency.max(1);
    let mut handles = Vec::with_capacity(concurrency + 1);

    for worker in 0..concurrency {
        handles.push(tokio::spawn(evaluation_worker(
            worker,
            state.clone(),
            evaluator.clone(),
            shutdown.clone(),
        )));
    }
    handles.push(tokio::spawn(stale_sweep_loop(state.clone(), shutdown.clone())));

    tracing::info!(concurrency, "Evaluation workers started");

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    tracing::info!("Evaluation workers stopped");
    Ok(())
}

async fn evaluation_worker(
    worker: usize,
    state: AppState,
    evaluator: Arc<Evaluator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let poll_interval = Duration::from_secs(state.settings().evaluation().poll_interval_seconds);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match evaluation::process_next(&state, &evaluator).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(worker, error = %format!("{err:#}"), "Evaluation worker error");
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(poll_interval) => {}
        }
    }
}

async fn stale_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(STALE_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = evaluation::recover_stale(&state).await {
                    tracing::error!(error = %format!("{err:#}"), "recover_stale failed");
                }
            }
        }
    }
}
