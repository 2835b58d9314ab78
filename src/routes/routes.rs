//! Defines the HTTP surface of the gallery.
//!
//! ## Structure
//! - **Public**
//!   - `GET  /api/health`       liveness
//!   - `POST /api/auth/login`   exchange the shared password for a token
//!   - `GET  /files/{*key}`     signed read links (local backend only)
//!
//! - **Behind the session gate**
//!   - `GET  /api/auth/verify`
//!   - `GET  /api/photos/list?page&limit`
//!   - `GET  /api/photos/random?count`
//!   - `POST /api/photos/upload` (multipart field `photos`)
//!   - `GET  /api/comments`, `POST /api/comments`

use crate::{
    handlers::{
        auth_handlers::{login, verify},
        comment_handlers::{list_comments, post_comment},
        file_handlers::get_file,
        health_handlers::health,
        photo_handlers::{list_photos, random_photos, upload_photos},
    },
    middleware::require_session,
    services::photo_service::{MAX_FILE_BYTES, MAX_FILES_PER_BATCH},
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Room for a full batch plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_FILES_PER_BATCH * MAX_FILE_BYTES + 1024 * 1024;

const DEV_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:3001",
];

fn cors(frontend_url: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = DEV_ORIGINS
        .into_iter()
        .chain(frontend_url)
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Build the full application router.
pub fn routes(state: AppState, frontend_url: Option<&str>) -> Router {
    let protected = Router::new()
        .route("/api/auth/verify", get(verify))
        .route("/api/photos/list", get(list_photos))
        .route("/api/photos/random", get(random_photos))
        .route(
            "/api/photos/upload",
            post(upload_photos).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/comments", get(list_comments).post(post_comment))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/files/{*key}", get(get_file))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors(frontend_url))
        .with_state(state)
}
