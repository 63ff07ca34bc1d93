//! Job endpoints.
//!
//! The HTTP layer is a thin facade: submission hands off to the
//! coordinator, everything else reads the status ledger and artifact
//! store directly. No handler ever blocks on pipeline work.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use serde_json::json;
use uuid::Uuid;

use medialib::cleanup;
use medialib::status::{JobStatus, StatusLedger};
use medialib::store::ArtifactStore;
use medialib::types::{JobId, JobKind, JobParams};
use medialib::{JobCoordinator, SubmitRequest};

use crate::error::ApiError;

pub struct AppState {
    pub coordinator: JobCoordinator,
    pub ledger: StatusLedger,
    pub store: ArtifactStore,
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("malformed job id '{raw}'")))
}

/// Pull the submission fields out of a multipart upload. Unknown fields
/// are ignored so clients can send extra metadata without breaking.
async fn read_submission(mut payload: Multipart) -> Result<SubmitRequest, ApiError> {
    let mut file: Option<(String, BytesMut)> = None;
    let mut owner = None;
    let mut kind = None;
    let mut prompt = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or("").to_string();
        let filename = disposition.get_filename().map(str::to_string);

        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
        {
            buf.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                let filename = filename
                    .ok_or_else(|| ApiError::BadRequest("file field has no filename".into()))?;
                file = Some((filename, buf));
            }
            "owner" => owner = Some(String::from_utf8_lossy(&buf).into_owned()),
            "kind" => kind = Some(String::from_utf8_lossy(&buf).into_owned()),
            "prompt" => prompt = Some(String::from_utf8_lossy(&buf).into_owned()),
            _ => {}
        }
    }

    let (source_filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let kind: JobKind = kind
        .ok_or_else(|| ApiError::BadRequest("missing kind field".into()))?
        .parse()
        .map_err(ApiError::from)?;

    Ok(SubmitRequest {
        bytes: bytes.freeze(),
        owner: owner.unwrap_or_else(|| "anonymous".to_string()),
        source_filename,
        kind,
        params: JobParams { prompt },
    })
}

/// POST /api/jobs
pub async fn submit(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request = read_submission(payload).await?;
    let job_id = state.coordinator.submit(request).await?;
    tracing::info!(%job_id, "job accepted");
    Ok(HttpResponse::Accepted().json(json!({ "job_id": job_id })))
}

/// GET /api/jobs/{id}/status
///
/// A job the ledger has never heard of reads as `pending`; the worker
/// may simply not have written its first record yet.
pub async fn status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let job_id = parse_job_id(&path)?;
    match state.ledger.read_record(job_id)? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::Ok().json(json!({ "status": "pending" }))),
    }
}

/// GET /api/jobs/{id}/result
///
/// Delivering the result consumes the job: its artifacts and status
/// record are gone once the response body has been read from disk.
pub async fn fetch_result(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let job_id = parse_job_id(&path)?;
    let record = state.ledger.read_record(job_id)?.ok_or(ApiError::NotFound)?;
    match record.status {
        JobStatus::Failed { detail } => return Err(ApiError::Gone(detail)),
        JobStatus::Complete => {}
        _ => return Err(ApiError::NotReady),
    }

    let result = state
        .store
        .find_result(job_id)
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("complete job has no result file")))?;
    let bytes = tokio::fs::read(&result)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let filename = result
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| job_id.to_string());

    cleanup::cleanup_all(&state.store, &state.ledger, job_id)
        .map_err(|e| ApiError::Internal(e.into()))?;
    tracing::info!(%job_id, "result delivered and job forgotten");

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(bytes))
}

/// DELETE /api/jobs/{id}
pub async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let job_id = parse_job_id(&path)?;
    state.coordinator.cancel(job_id).await?;
    Ok(HttpResponse::Accepted().json(json!({ "job_id": job_id, "status": "canceling" })))
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("zip") => "application/zip",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
