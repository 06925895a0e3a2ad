use actix_web::{error::InternalError, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::helper::draft_helpers::{self, DraftError};
use crate::helper::session_helpers::AdminSession;
use crate::routes::error_body;
use crate::AppState;

/// Base64 of a 10 MiB image plus the JSON around it.
const MAX_JSON_BYTES: usize = 16 * 1024 * 1024;

#[derive(Deserialize)]
pub struct SaveRequest {
    content: Option<String>,
    sha: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadRequest {
    filename: Option<String>,
    base64: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteImageRequest {
    filename: Option<String>,
}

pub fn config_drafts(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_JSON_BYTES)
            .error_handler(|err, _req| {
                let res = HttpResponse::BadRequest().json(error_body(&err.to_string(), "invalid_input"));
                InternalError::from_response(err, res).into()
            }),
    )
    .route("/posts", web::get().to(list_posts))
    .route("/posts/{slug}", web::get().to(get_post))
    .route("/posts/{slug}", web::delete().to(discard_post))
    .route("/posts/{slug}/update", web::put().to(update_post))
    .route("/posts/{slug}/publish", web::post().to(publish_post))
    .route("/posts/{slug}/preview", web::get().to(preview_post))
    .route("/posts/{slug}/images", web::get().to(list_images))
    .route("/posts/{slug}/images", web::post().to(upload_image))
    .route("/posts/{slug}/images", web::delete().to(delete_image));
}

/// Maps an operation failure to its status and `{error, code}` body.
pub fn draft_error_response(err: &DraftError) -> HttpResponse {
    let (mut builder, code) = match err {
        DraftError::InvalidInput(_) => (HttpResponse::BadRequest(), "invalid_input"),
        DraftError::NotFound(_) => (HttpResponse::NotFound(), "not_found"),
        DraftError::Conflict(_) => (HttpResponse::Conflict(), "conflict"),
        DraftError::MergeBlocked(_) => (HttpResponse::UnprocessableEntity(), "merge_blocked"),
        DraftError::Upstream { .. } => (HttpResponse::BadGateway(), "upstream"),
        DraftError::Configuration(_) => (HttpResponse::InternalServerError(), "configuration"),
    };
    let mut body = error_body(&err.to_string(), code);
    if let DraftError::Upstream { status: Some(status), .. } = err {
        log::warn!("Answering 502 for git host status {}", status);
        body["upstreamStatus"] = json!(status);
    }
    builder.json(body)
}

async fn list_posts(session: AdminSession, state: web::Data<AppState>) -> impl Responder {
    match draft_helpers::list_drafts(state.git_host.as_ref(), &session).await {
        Ok(drafts) => HttpResponse::Ok().json(json!({ "drafts": drafts })),
        Err(e) => draft_error_response(&e),
    }
}

async fn get_post(session: AdminSession, state: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    match draft_helpers::fetch_draft(state.git_host.as_ref(), &session, &slug).await {
        Ok(draft) => HttpResponse::Ok().json(draft),
        Err(e) => draft_error_response(&e),
    }
}

async fn discard_post(session: AdminSession, state: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    match draft_helpers::discard_draft(state.git_host.as_ref(), &session, &slug).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => draft_error_response(&e),
    }
}

async fn update_post(
    session: AdminSession,
    state: web::Data<AppState>,
    slug: web::Path<String>,
    body: web::Json<SaveRequest>,
) -> impl Responder {
    let result = draft_helpers::save_draft(
        state.git_host.as_ref(),
        &session,
        &slug,
        body.content.as_deref(),
        body.sha.as_deref(),
    )
    .await;

    match result {
        Ok(new_sha) => HttpResponse::Ok().json(json!({ "success": true, "newSha": new_sha })),
        Err(e) => draft_error_response(&e),
    }
}

async fn publish_post(
    session: AdminSession,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    slug: web::Path<String>,
) -> impl Responder {
    match draft_helpers::publish_draft(state.git_host.as_ref(), &config, &session, &slug).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => draft_error_response(&e),
    }
}

async fn preview_post(session: AdminSession, state: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    match draft_helpers::preview_draft(state.git_host.as_ref(), &session, &slug).await {
        Ok(preview) => HttpResponse::Ok().json(preview),
        Err(e) => draft_error_response(&e),
    }
}

async fn list_images(session: AdminSession, state: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    match draft_helpers::list_images(state.git_host.as_ref(), &session, &slug).await {
        Ok(images) => HttpResponse::Ok().json(images),
        Err(e) => draft_error_response(&e),
    }
}

async fn upload_image(
    session: AdminSession,
    state: web::Data<AppState>,
    slug: web::Path<String>,
    body: web::Json<UploadRequest>,
) -> impl Responder {
    let result = draft_helpers::upload_image(
        state.git_host.as_ref(),
        &session,
        &slug,
        body.filename.as_deref(),
        body.base64.as_deref(),
    )
    .await;

    match result {
        Ok(stored) => HttpResponse::Ok().json(stored),
        Err(e) => draft_error_response(&e),
    }
}

async fn delete_image(
    session: AdminSession,
    state: web::Data<AppState>,
    slug: web::Path<String>,
    body: web::Json<DeleteImageRequest>,
) -> impl Responder {
    match draft_helpers::delete_image(state.git_host.as_ref(), &session, &slug, body.filename.as_deref()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => draft_error_response(&e),
    }
}
