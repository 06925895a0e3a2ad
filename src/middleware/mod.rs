use actix_web::{dev, error::InternalError, web, FromRequest, HttpRequest, HttpResponse};
use std::future::{ready, Ready};

use crate::config::Config;
use crate::helper::session_helpers::{get_session_from_cookies, AdminSession};
use crate::routes::error_body;

/// Gate for every draft route: resolves the session cookie once per request.
///
/// Handlers must take this as their first argument so a missing or invalid
/// session is rejected before the request body is read.
impl FromRequest for AdminSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let Some(config) = req.app_data::<web::Data<Config>>() else {
            log::error!("Config is not registered as app data; rejecting session.");
            let res = HttpResponse::InternalServerError()
                .json(error_body("Server is misconfigured", "configuration"));
            return ready(Err(InternalError::from_response("missing config", res).into()));
        };

        match get_session_from_cookies(config, req) {
            Some(session) => ready(Ok(session)),
            None => {
                let res = HttpResponse::Unauthorized().json(error_body("Unauthorized", "unauthorized"));
                ready(Err(InternalError::from_response("unauthorized", res).into()))
            }
        }
    }
}
