use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr, time::Duration};

/// Where photos and comments are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// S3 bucket for photos, DynamoDB table for comments.
    Aws,
    /// Disk plus SQLite for both.
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aws" | "s3" => Ok(StorageBackend::Aws),
            "local" => Ok(StorageBackend::Local),
            other => bail!("unknown storage backend `{other}` (expected `aws` or `local`)"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub region: String,
    pub s3_endpoint: Option<String>,
    pub s3_force_path_style: bool,
    pub comments_table: String,
    pub storage_dir: String,
    pub database_url: String,
    pub public_url: String,
    pub password: String,
    pub session_secret: Option<String>,
    pub frontend_url: Option<String>,
    pub store_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_force_path_style", &self.s3_force_path_style)
            .field("comments_table", &self.comments_table)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_url", &self.public_url)
            .field("password", &"<redacted>")
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("frontend_url", &self.frontend_url)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo gallery and guestbook API")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides GALLERY_STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// S3 bucket holding the photos (overrides S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// AWS region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint, e.g. MinIO (overrides S3_ENDPOINT_URL)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// DynamoDB table for comments (overrides COMMENTS_TABLE_NAME)
    #[arg(long)]
    pub comments_table: Option<String>,

    /// Directory where local payloads are stored (overrides GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL for the local backend (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL used in local read links (overrides GALLERY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Shared gallery password (overrides GALLERY_PASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// Session signing secret (overrides JWT_SECRET)
    #[arg(long)]
    pub session_secret: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// CLI values win over `lookup`, which wins over defaults.
    pub fn merge(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match args.port {
            Some(port) => port,
            None => parse_var(&var, "PORT")?.unwrap_or(3002),
        };
        let backend = match args.backend {
            Some(backend) => backend,
            None => parse_var(&var, "GALLERY_STORAGE_BACKEND")?.unwrap_or(StorageBackend::Aws),
        };
        let s3_force_path_style = match var("S3_FORCE_PATH_STYLE") {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("parsing S3_FORCE_PATH_STYLE value `{value}`"))?,
            None => false,
        };
        let timeout_secs: u64 = parse_var(&var, "GALLERY_STORE_TIMEOUT_SECS")?.unwrap_or(30);
        if timeout_secs == 0 {
            bail!("GALLERY_STORE_TIMEOUT_SECS must be at least 1");
        }

        let password = args
            .password
            .or_else(|| var("GALLERY_PASSWORD"))
            .context("GALLERY_PASSWORD (or --password) must be set")?;

        let host = args
            .host
            .or_else(|| var("GALLERY_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());

        Ok(Self {
            public_url: args
                .public_url
                .or_else(|| var("GALLERY_PUBLIC_URL"))
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            host,
            port,
            backend,
            bucket: args.bucket.or_else(|| var("S3_BUCKET_NAME")),
            region: args
                .region
                .or_else(|| var("AWS_REGION"))
                .unwrap_or_else(|| "ap-northeast-1".into()),
            s3_endpoint: args.s3_endpoint.or_else(|| var("S3_ENDPOINT_URL")),
            s3_force_path_style,
            comments_table: args
                .comments_table
                .or_else(|| var("COMMENTS_TABLE_NAME"))
                .unwrap_or_else(|| "weddingComment".into()),
            storage_dir: args
                .storage_dir
                .or_else(|| var("GALLERY_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .or_else(|| var("GALLERY_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/gallery.db".into()),
            password,
            session_secret: args.session_secret.or_else(|| var("JWT_SECRET")),
            frontend_url: var("FRONTEND_URL"),
            store_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("parsing {name} value `{value}`: {err}")),
        None => Ok(None),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{other}`"),
    }
}
