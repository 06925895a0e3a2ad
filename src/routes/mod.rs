use serde_json::{json, Value};

pub mod auth;
pub mod drafts;
pub mod public;

/// Error payload shared by every JSON endpoint.
pub fn error_body(message: &str, code: &str) -> Value {
    json!({ "error": message, "code": code })
}

/// Everything under `/api/draft`: login, logout, session and the draft routes.
pub fn config_draft_api(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api/draft")
            .configure(auth::config_auth)
            .configure(drafts::config_drafts),
    );
}
