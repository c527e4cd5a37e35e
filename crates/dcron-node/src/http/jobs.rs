//! `PUT /{job}/cron` and `PUT /{job}/once`: both install a job descriptor
//! by submitting a Put to the replicated log and waiting for the applier to
//! confirm it before responding.

use crate::http::error::ApiError;
use crate::http::state::AppState;
use axum::extract::{Path, State};
use axum::{Json, Router};
use axum::routing::put;
use chrono::Utc;
use dcron_core::{CronSchedule, DcronError, Job, JobId, OnceSchedule, ScheduleDescriptor};
use dcron_log::{encode_put, ApplyOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:job/cron", put(put_cron))
        .route("/:job/once", put(put_once))
}

#[derive(Debug, Deserialize)]
struct CronBody {
    schedule: String,
}

#[derive(Debug, Serialize)]
struct PutResponse {
    next_execution: Option<i64>,
}

async fn put_cron(
    State(state): State<AppState>,
    Path(job): Path<String>,
    Json(body): Json<CronBody>,
) -> Result<Json<PutResponse>, ApiError> {
    let descriptor = ScheduleDescriptor::Cron(CronSchedule::new(&body.schedule)?);
    let job = submit_job(&state, job, descriptor).await?;
    Ok(Json(PutResponse {
        next_execution: job.next.map(|t| t.timestamp()),
    }))
}

async fn put_once(
    State(state): State<AppState>,
    Path(job): Path<String>,
    body: String,
) -> Result<Json<PutResponse>, ApiError> {
    let descriptor = ScheduleDescriptor::Once(OnceSchedule::from_payload(&body)?);
    let job = submit_job(&state, job, descriptor).await?;
    Ok(Json(PutResponse {
        next_execution: job.next.map(|t| t.timestamp()),
    }))
}

async fn submit_job(
    state: &AppState,
    job_id: String,
    descriptor: ScheduleDescriptor,
) -> Result<Job, ApiError> {
    let job = Job::new(JobId::new(job_id), descriptor, Utc::now());
    let correlation = state.next_correlation();
    let rx = state.waiters().register(correlation);
    let payload = encode_put(correlation, &job);

    state
        .log()
        .put(job.id.as_str(), payload)
        .await
        .map_err(|e| ApiError(DcronError::TransientWrite(e.to_string())))?;

    let deadline = Duration::from_millis(3 * state.election_ms());
    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(ApplyOutcome::Applied(job))) => Ok(job),
        Ok(Ok(ApplyOutcome::Deleted(_))) => Err(ApiError(DcronError::TransientWrite(
            "job deleted before put applied".into(),
        ))),
        Ok(Err(_)) | Err(_) => {
            state.waiters().cancel(&correlation);
            Err(ApiError(DcronError::TransientWrite(
                "put timed out waiting for apply".into(),
            )))
        }
    }
}
