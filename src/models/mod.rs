//! Core data models for the gallery and guestbook.
//!
//! `photo` and `comment` describe what the services hand to the gateway;
//! `object` is the metadata row used by the local storage backend.

pub mod comment;
pub mod object;
pub mod photo;
