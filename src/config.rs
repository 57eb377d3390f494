use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf};

const MIB: u64 = 1 << 20;

/// Which backend receives thumbnail uploads. Videos always go to the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThumbnailBackend {
    /// Write files under the asset root and serve them from `/assets`.
    Local,
    /// Embed the image in the record as a `data:` URL.
    Inline,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; built once at startup
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub assets_root: PathBuf,
    /// Base URL prepended to `/assets/<key>` for locally stored thumbnails.
    pub public_base_url: String,
    /// Directory for spilled upload payloads. Defaults to the OS temp dir.
    pub staging_dir: PathBuf,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub thumbnail_backend: ThumbnailBackend,
    pub thumbnail_max_bytes: u64,
    pub video_max_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Media upload ingestion API")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_UPLOADS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_UPLOADS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MEDIA_UPLOADS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory holding locally stored assets (overrides MEDIA_UPLOADS_ASSETS_ROOT)
    #[arg(long)]
    pub assets_root: Option<PathBuf>,

    /// Public base URL for asset links (overrides MEDIA_UPLOADS_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Where large uploads are spilled while staging (overrides MEDIA_UPLOADS_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Thumbnail storage backend (overrides MEDIA_UPLOADS_THUMBNAIL_BACKEND)
    #[arg(long, value_enum)]
    pub thumbnail_backend: Option<ThumbnailBackend>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `var`.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = var("MEDIA_UPLOADS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_or(&var, "MEDIA_UPLOADS_PORT", 8091u16)?;
        let env_db = var("MEDIA_UPLOADS_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/meta/media.db".into());
        let env_assets = var("MEDIA_UPLOADS_ASSETS_ROOT").unwrap_or_else(|| "./assets".into());
        let env_staging = var("MEDIA_UPLOADS_STAGING_DIR").map(PathBuf::from);
        let env_thumbnail_backend = match var("MEDIA_UPLOADS_THUMBNAIL_BACKEND") {
            Some(value) => ThumbnailBackend::from_str(&value, true)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| {
                    format!("parsing MEDIA_UPLOADS_THUMBNAIL_BACKEND value `{}`", value)
                })?,
            None => ThumbnailBackend::Local,
        };

        let Some(jwt_secret) = var("MEDIA_UPLOADS_JWT_SECRET").filter(|s| !s.is_empty()) else {
            bail!("MEDIA_UPLOADS_JWT_SECRET must be set");
        };
        let Some(s3_bucket) = var("MEDIA_UPLOADS_S3_BUCKET").filter(|s| !s.is_empty()) else {
            bail!("MEDIA_UPLOADS_S3_BUCKET must be set");
        };

        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| var("MEDIA_UPLOADS_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            database_url: args.database_url.unwrap_or(env_db),
            assets_root: args.assets_root.unwrap_or_else(|| env_assets.into()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            staging_dir: args
                .staging_dir
                .or(env_staging)
                .unwrap_or_else(env::temp_dir),
            jwt_secret,
            s3_bucket,
            s3_region: var("MEDIA_UPLOADS_S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            s3_endpoint: var("MEDIA_UPLOADS_S3_ENDPOINT").filter(|s| !s.is_empty()),
            thumbnail_backend: args.thumbnail_backend.unwrap_or(env_thumbnail_backend),
            thumbnail_max_bytes: parse_or(&var, "MEDIA_UPLOADS_THUMBNAIL_MAX_BYTES", 10 * MIB)?,
            video_max_bytes: parse_or(&var, "MEDIA_UPLOADS_VIDEO_MAX_BYTES", 1024 * MIB)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}
