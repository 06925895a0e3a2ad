use actix_web::{web, HttpResponse, Responder};

// Plain routes: an `/api` scope would shadow the `/api/draft` scope.
pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/is_server_active", web::get().to(is_server_active));
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}
