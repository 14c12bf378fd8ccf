mod error;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::configure_routes;
pub use state::{AppState, ALERTS_FILE, CATALOG_FILE, RUNS_FILE};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub addr: String,
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

pub async fn run_backend(cfg: BackendConfig, state: AppState) -> std::io::Result<()> {
    let state = web::Data::new(state);

    log::info!("starting server on {}", cfg.addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(cfg.addr)?
    .run()
    .await
}
