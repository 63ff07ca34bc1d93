use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::services::jobs;

/// Poll-based job API:
/// - POST   /api/jobs              submit a job (multipart upload)
/// - GET    /api/jobs/{id}/status  current ledger record
/// - GET    /api/jobs/{id}/result  download and forget
/// - DELETE /api/jobs/{id}         cancel a queued or running job
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/jobs", web::post().to(jobs::submit))
            .route("/jobs/{id}/status", web::get().to(jobs::status))
            .route("/jobs/{id}/result", web::get().to(jobs::fetch_result))
            .route("/jobs/{id}", web::delete().to(jobs::cancel)),
    )
    .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
