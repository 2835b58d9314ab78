use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use rand::RngCore;
use std::{io::ErrorKind, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod storage;

use config::{AppConfig, StorageBackend};
use services::{
    comment_service::CommentService, photo_service::PhotoService, session::SessionAuthority,
};
use state::AppState;
use storage::{
    CommentLog, ObjectStore, TimeoutCommentLog, TimeoutObjectStore, dynamo_log::DynamoCommentLog,
    local::LocalObjectStore, s3::S3ObjectStore, sqlite_log::SqliteCommentLog,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting photo-guestbook with config: {:?}", cfg);

    if migrate {
        let pool = db::connect(&cfg.database_url).await?;
        db::run_migrations(&pool)
            .await
            .context("running database migrations")?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    let session_secret = match &cfg.session_secret {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            tracing::warn!("JWT_SECRET not set; generated a random session secret, sessions end on restart");
            let mut secret = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            secret
        }
    };

    let state = build_state(&cfg, session_secret).await?;
    let app = routes::routes::routes(state, cfg.frontend_url.as_deref());

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
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wire the configured backends into the two services.
async fn build_state(cfg: &AppConfig, session_secret: Vec<u8>) -> Result<AppState> {
    let (store, log, files): (
        Option<Arc<dyn ObjectStore>>,
        Arc<dyn CommentLog>,
        Option<Arc<LocalObjectStore>>,
    ) = match cfg.backend {
        StorageBackend::Local => {
            tokio::fs::create_dir_all(&cfg.storage_dir)
                .await
                .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
            let pool = db::connect(&cfg.database_url).await?;
            db::run_migrations(&pool)
                .await
                .context("running database migrations")?;

            let local = Arc::new(LocalObjectStore::new(
                pool.clone(),
                &cfg.storage_dir,
                cfg.public_url.clone(),
                session_secret.clone(),
            ));
            tracing::info!(dir = %cfg.storage_dir, "using local storage backend");
            (
                Some(local.clone() as Arc<dyn ObjectStore>),
                Arc::new(SqliteCommentLog::new(pool)),
                Some(local),
            )
        }
        StorageBackend::Aws => {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(cfg.region.clone()))
                .load()
                .await;

            let store = match &cfg.bucket {
                Some(bucket) => {
                    tracing::info!(bucket = %bucket, region = %cfg.region, "using S3 photo bucket");
                    Some(Arc::new(S3ObjectStore::new(
                        &sdk_config,
                        bucket.clone(),
                        cfg.s3_endpoint.as_deref(),
                        cfg.s3_force_path_style,
                    )) as Arc<dyn ObjectStore>)
                }
                None => {
                    tracing::warn!("S3_BUCKET_NAME not set; photo endpoints will report a configuration error");
                    None
                }
            };
            tracing::info!(table = %cfg.comments_table, "using DynamoDB comment table");
            (
                store,
                Arc::new(DynamoCommentLog::new(&sdk_config, cfg.comments_table.clone())),
                None,
            )
        }
    };

    let photos = match store {
        Some(store) => PhotoService::new(Arc::new(TimeoutObjectStore::new(
            store,
            cfg.store_timeout,
        ))),
        None => PhotoService::unconfigured(),
    };

    Ok(AppState {
        photos,
        comments: CommentService::new(Arc::new(TimeoutCommentLog::new(log, cfg.store_timeout))),
        sessions: Arc::new(SessionAuthority::new(cfg.password.clone(), session_secret)),
        files,
    })
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
