use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use tracing::info;

use adtracker::api::{AppState, configure_routes};
use adtracker::config::{get_config, init_config};
use adtracker::storage::StorageFactory;
use adtracker::system::logging::init_logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_config();
    let config = get_config();

    // guard 在进程存续期间持有，保证缓冲日志落盘
    let _log_guard = init_logging(&config);

    let storage = match StorageFactory::create().await {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };
    info!("Using storage backend: {}", storage.get_backend_name());

    let tz = config.tracking.reference_tz();
    let state = web::Data::new(AppState::new(storage, tz));

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting server at http://{}", bind_address);

    let cors_origin = config.server.cors_origin.clone();
    let workers = config.server.cpu_count;

    HttpServer::new(move || {
        let cors = match cors_origin.as_deref() {
            Some(origin) if origin != "*" => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header(),
            _ => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header(),
        };

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .configure(configure_routes)
    })
    .workers(workers)
    .bind(bind_address)?
    .run()
    .await
}
