// src/main.rs

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

use collabhub::app_state::AppState;
use collabhub::assets::{AssetHost, DisabledAssetHost, HttpAssetHost};
use collabhub::auth::Authentication;
use collabhub::config::{Config, StorageBackend};
use collabhub::store::{MemoryStore, MongoStore, Store};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let store: Arc<dyn Store> = match &config.storage {
        StorageBackend::Mongo { uri, database } => Arc::new(
            MongoStore::init(uri, database)
                .await
                .map_err(io::Error::other)?,
        ),
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let assets: Arc<dyn AssetHost> = if config.assets.upload_url.is_some() {
        Arc::new(HttpAssetHost::new(config.assets.clone()))
    } else {
        warn!("ASSET_UPLOAD_URL not set; cover image uploads are disabled");
        Arc::new(DisabledAssetHost)
    };

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState {
        store,
        assets,
        config,
    });

    info!("Server running at http://{}", bind_addr);
    info!("Allowed CORS origins: {:?}", state.config.frontend_origins);

    HttpServer::new(move || {
        let cors = state
            .config
            .frontend_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(state.config.jwt_secret.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(collabhub::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
