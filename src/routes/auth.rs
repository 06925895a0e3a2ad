use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::helper::session_helpers::{self, AdminSession, SessionError};
use crate::routes::error_body;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(handle_login))
        .route("/logout", web::post().to(handle_logout))
        .route("/session", web::get().to(current_session));
}

async fn handle_login(config: web::Data<Config>, body: web::Json<LoginRequest>) -> impl Responder {
    let (username, password) = match (body.username.as_deref(), body.password.as_deref()) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => {
            return HttpResponse::BadRequest()
                .json(error_body("Username and password are required", "invalid_input"))
        }
    };

    match session_helpers::validate_credentials(&config, username, password) {
        Ok(true) => {}
        Ok(false) => {
            log::warn!("Failed draft admin login for user '{}'", username);
            return HttpResponse::Unauthorized().json(error_body("Invalid credentials", "unauthorized"));
        }
        Err(e) => return configuration_error(e),
    }

    match session_helpers::create_session(&config, username) {
        Ok(token) => {
            log::info!("Draft admin '{}' logged in", username);
            HttpResponse::Ok()
                .cookie(session_helpers::build_session_cookie(&config, token))
                .json(json!({ "success": true }))
        }
        Err(e) => configuration_error(e),
    }
}

async fn handle_logout() -> impl Responder {
    HttpResponse::Ok()
        .cookie(session_helpers::build_clear_session_cookie())
        .json(json!({ "success": true }))
}

async fn current_session(session: AdminSession) -> impl Responder {
    HttpResponse::Ok().json(session)
}

fn configuration_error(e: SessionError) -> HttpResponse {
    log::error!("Draft admin login unavailable: {}", e);
    HttpResponse::InternalServerError().json(error_body(&e.to_string(), "configuration"))
}
