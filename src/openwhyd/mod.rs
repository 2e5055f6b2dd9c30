//! Openwhyd API client module

pub mod client;
pub mod models;

pub use client::OpenwhydClient;
pub use models::{Playlist, Track, DEFAULT_PLAYLIST};
