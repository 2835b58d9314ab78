pub mod comment_service;
pub mod photo_service;
pub mod session;
