// Web Server - main.rs
// web-server/src/main.rs
use actix_web::{get, middleware::Condition, web, App, HttpResponse, HttpServer, Responder};
use common::{setup_tracing, Config};
use web_server::middleware::RateLimiter;
use web_server::{api, AuthState};

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let loaded = Config::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::from_env_vars(),
    };
    setup_tracing(&config.log_level);

    tracing::info!("Loading configuration from {}", Config::config_dir().display());
    tracing::info!("Using run mode: {}", Config::run_mode());
    match loaded {
        Ok(_) => tracing::info!("Configuration loaded from files and environment"),
        Err(e) => {
            tracing::warn!("Failed to load configuration from files: {}", e);
            tracing::info!("Falling back to environment variables only");
        },
    }
    config.warn_on_dev_defaults();

    let state = AuthState::from_config(&config.auth).map_err(|e| {
        tracing::error!("Invalid auth configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let server_addr = config.web_server_addr.clone();
    let rate_limit_enabled = config.rate_limit.enabled;
    // One window per process, not per worker
    let rate_limiter = RateLimiter::from_config(&config.rate_limit);

    tracing::info!("Starting identity verification server on {}", server_addr);

    let state_data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .wrap(Condition::new(rate_limit_enabled, rate_limiter.clone()))
            .service(health)
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
