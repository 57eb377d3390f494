use anyhow::Result;
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, ThumbnailBackend};
use services::{
    auth::JwtValidator,
    backends::{InlineBackend, LocalBackend, S3Backend, StorageBackend},
    staging::StreamingStager,
    upload_service::{UploadLimits, UploadService},
    video_store::VideoStore,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        addr = %cfg.addr(),
        assets_root = %cfg.assets_root.display(),
        staging_dir = %cfg.staging_dir.display(),
        thumbnail_backend = ?cfg.thumbnail_backend,
        s3_bucket = %cfg.s3_bucket,
        s3_region = %cfg.s3_region,
        "Starting media-uploads"
    );

    // --- Ensure asset and staging directories exist ---
    for dir in [&cfg.assets_root, &cfg.staging_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    // --- Initialize SQLite connection ---
    let connect_opts = SqliteConnectOptions::from_str(&cfg.database_url)?.create_if_missing(true);
    if let Some(parent) = connect_opts.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?,
    );
    let videos = VideoStore::new(db);

    // --- Handle migration mode ---
    if migrate {
        videos.migrate().await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Storage backends ---
    let thumbnails: Arc<dyn StorageBackend> = match cfg.thumbnail_backend {
        ThumbnailBackend::Local => Arc::new(LocalBackend::new(
            &cfg.assets_root,
            &cfg.public_base_url,
        )),
        ThumbnailBackend::Inline => Arc::new(InlineBackend),
    };
    let video_files: Arc<dyn StorageBackend> = Arc::new(
        S3Backend::connect(
            cfg.s3_bucket.clone(),
            cfg.s3_region.clone(),
            cfg.s3_endpoint.clone(),
        )
        .await,
    );

    let uploads = UploadService::new(
        videos.clone(),
        StreamingStager::new(&cfg.staging_dir),
        thumbnails,
        video_files,
        UploadLimits {
            thumbnail_max_bytes: cfg.thumbnail_max_bytes,
            video_max_bytes: cfg.video_max_bytes,
        },
    );

    let cfg = Arc::new(cfg);
    let state = AppState {
        config: cfg.clone(),
        videos,
        auth: JwtValidator::new(&cfg.jwt_secret),
        uploads: Arc::new(uploads),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(&cfg).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
