use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::{minutes_before, primitive_now_utc};
use crate::db::models::Evaluation;
use crate::documents::Document;
use crate::grading::evaluator::{EvaluationReport, Evaluator};
use crate::repositories;
use crate::repositories::evaluations::CompletedEvaluation;
use crate::services::storage;

/// A run interrupted this many times is failed instead of re-queued.
pub(crate) const MAX_ATTEMPTS: i32 = 3;

const COMPLETED_MESSAGE: &str = "Evaluation completed";

/// Claims and processes one queued evaluation. Returns `false` when the queue is empty.
pub(crate) async fn process_next(state: &AppState, evaluator: &Evaluator) -> Result<bool> {
    let Some(evaluation) = repositories::evaluations::claim_next(state.db(), primitive_now_utc())
        .await
        .context("Failed to claim evaluation")?
    else {
        return Ok(false);
    };

    metrics::counter!("evaluation_jobs_total", "event" => "claimed").increment(1);
    tracing::info!(
        evaluation_id = %evaluation.id,
        batch_id = %evaluation.batch_id,
        attempt = evaluation.attempts,
        "Evaluation claimed"
    );

    match run(state, evaluator, &evaluation).await {
        Ok(report) => record_report(state, &evaluation, &report).await?,
        Err(err) => {
            tracing::error!(
                evaluation_id = %evaluation.id,
                error = %format!("{err:#}"),
                "Evaluation failed"
            );
            metrics::counter!("evaluation_jobs_total", "event" => "failed").increment(1);
            let stored = repositories::evaluations::mark_failed(
                state.db(),
                &evaluation.id,
                evaluation.attempts,
                &format!("{err:#}"),
                primitive_now_utc(),
            )
            .await
            .context("Failed to mark evaluation as failed")?;
            if !stored {
                warn_superseded(&evaluation.id);
            }
        }
    }

    Ok(true)
}

async fn run(
    state: &AppState,
    evaluator: &Evaluator,
    evaluation: &Evaluation,
) -> Result<EvaluationReport> {
    let sheet = load_document(state, &evaluation.answer_sheet_id).await?;
    let key = load_document(state, &evaluation.answer_key_id).await?;
    Ok(evaluator.evaluate(&sheet, &key).await)
}

async fn load_document(state: &AppState, document_id: &str) -> Result<Document> {
    let stored = repositories::documents::find_by_id(state.db(), document_id)
        .await
        .context("Failed to load document metadata")?
        .with_context(|| format!("Document {document_id} no longer exists"))?;
    let storage = state.storage().context("File storage is not configured")?;

    let bytes = storage.download_bytes(&stored.storage_key).await?;
    Ok(Document::new(stored.filename, bytes))
}

/// Stores a finished report on its row. Completed reports also get a JSON artifact when
/// storage is available; an answer key that could not be read fails the run.
pub(crate) async fn record_report(
    state: &AppState,
    evaluation: &Evaluation,
    report: &EvaluationReport,
) -> Result<()> {
    let evaluation_id = evaluation.id.as_str();
    let now = primitive_now_utc();

    if !report.is_completed() {
        let message = report.message.as_deref().unwrap_or("Evaluation could not be completed");
        let stored = repositories::evaluations::mark_failed(
            state.db(),
            evaluation_id,
            evaluation.attempts,
            message,
            now,
        )
        .await
        .context("Failed to mark evaluation as failed")?;
        if !stored {
            warn_superseded(evaluation_id);
            return Ok(());
        }
        metrics::counter!("evaluation_jobs_total", "event" => "failed").increment(1);
        tracing::warn!(evaluation_id, message, "Evaluation finished without results");
        return Ok(());
    }

    let artifact_key = upload_artifact(state, evaluation_id, report).await;

    let stored = repositories::evaluations::mark_completed(
        state.db(),
        evaluation_id,
        evaluation.attempts,
        CompletedEvaluation {
            results: &report.results,
            total_score: report.total_score,
            max_score: report.max_score,
            message: COMPLETED_MESSAGE,
            artifact_key: artifact_key.as_deref(),
            completed_at: now,
        },
    )
    .await
    .context("Failed to store evaluation results")?;
    if !stored {
        warn_superseded(evaluation_id);
        return Ok(());
    }

    metrics::counter!("evaluation_jobs_total", "event" => "completed").increment(1);
    tracing::info!(
        evaluation_id,
        total_score = %report.score_label(),
        artifact = artifact_key.is_some(),
        "Evaluation stored"
    );
    Ok(())
}

fn warn_superseded(evaluation_id: &str) {
    metrics::counter!("evaluation_jobs_total", "event" => "superseded").increment(1);
    tracing::warn!(evaluation_id, "Evaluation was requeued while running; result discarded");
}

async fn upload_artifact(
    state: &AppState,
    evaluation_id: &str,
    report: &EvaluationReport,
) -> Option<String> {
    let storage = state.storage()?;
    let key = storage::result_key(evaluation_id);

    let body = match serde_json::to_vec_pretty(&report.results) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(evaluation_id, error = %err, "Failed to serialize result artifact");
            return None;
        }
    };

    match storage.upload_bytes(&key, "application/json", body).await {
        Ok(_) => Some(key),
        Err(err) => {
            tracing::warn!(evaluation_id, error = %format!("{err:#}"), "Artifact upload failed");
            None
        }
    }
}

/// Re-queues runs stuck in `processing` longer than the configured threshold.
pub(crate) async fn recover_stale(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let stale_before = minutes_before(now, state.settings().evaluation().stale_after_minutes);

    let (requeued, failed) =
        repositories::evaluations::recover_stale(state.db(), stale_before, MAX_ATTEMPTS, now)
            .await
            .context("Failed to recover stale evaluations")?;

    if requeued > 0 || failed > 0 {
        tracing::warn!(requeued, failed, "Recovered stale evaluations");
    }
    Ok(())
}
