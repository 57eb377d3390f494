//! Upload pipeline components and the collaborators they consume.

pub mod auth;
pub mod backends;
pub mod keys;
pub mod media_type;
pub mod staging;
pub mod upload_service;
pub mod video_store;
