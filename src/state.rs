use crate::{
    services::{comment_service::CommentService, photo_service::PhotoService, session::SessionAuthority},
    storage::local::LocalObjectStore,
};
use std::sync::Arc;

/// Shared, cheaply clonable handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub photos: PhotoService,
    pub comments: CommentService,
    pub sessions: Arc<SessionAuthority>,
    /// Present only with the local backend, which serves its own read links.
    pub files: Option<Arc<LocalObjectStore>>,
}
