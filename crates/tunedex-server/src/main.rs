mod api;
mod config;
mod cover_art;
mod db;
mod indexer;
mod metadata;
mod openapi;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cover_art::{CoverArtArchive, CoverSource, NoCoverSource};
use crate::db::SongStore;
use crate::indexer::index_library;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tunedex-server")]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Music library root directory
    #[arg(long)]
    music_dir: Option<PathBuf>,

    /// Song database file
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_web=info")),
        )
        .init();

    let cfg = match args.config.as_ref() {
        Some(path) => config::ServerConfig::load(path)?,
        None => config::ServerConfig::default(),
    };
    let bind = match args.bind {
        Some(addr) => addr,
        None => config::bind_from_config(&cfg)?
            .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("default bind")),
    };
    let music_dir = args
        .music_dir
        .unwrap_or_else(|| config::music_dir_from_config(&cfg));
    let db_path = args
        .db_path
        .unwrap_or_else(|| config::db_path_from_config(&cfg));
    let webapp_dir = config::webapp_dir_from_config(&cfg);

    tracing::info!(
        bind = %bind,
        music_dir = %music_dir.display(),
        db = %db_path.display(),
        "starting tunedex-server"
    );

    let store = SongStore::open(&db_path)?;

    // Indexing is all-or-nothing and must finish before the first request.
    index_library(&store, &music_dir)?;

    let covers: Arc<dyn CoverSource> = match cfg.covers.as_ref() {
        Some(covers_cfg) => match CoverArtArchive::new(covers_cfg)? {
            Some(archive) => Arc::new(archive),
            None => Arc::new(NoCoverSource),
        },
        None => Arc::new(NoCoverSource),
    };

    let state = web::Data::new(AppState::new(store, covers, webapp_dir));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::search)
            .service(api::stream)
            .service(api::art)
            .service(api::home)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
