// web-server/src/api/mod.rs
pub mod auth;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(auth::verify_assertion)
            .service(auth::token_info),
    );
}
