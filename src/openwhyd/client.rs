//! Openwhyd API HTTP client

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;

use super::models::Track;

/// Page size large enough to return a whole profile in one response.
const PAGE_LIMIT: u64 = 10_000_000_000;

/// HTTP client for the Openwhyd JSON API
#[derive(Clone)]
pub struct OpenwhydClient {
    base_url: String,
    http_client: Client,
}

impl OpenwhydClient {
    /// Create a new Openwhyd client
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let http_client = Client::builder()
            .user_agent("whydl/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// All tracks posted by a user, newest first
    pub async fn user_tracks(&self, user_id: &str) -> Result<Vec<Track>> {
        let url = format!(
            "{}/u/{}?format=json&limit={}",
            self.base_url, user_id, PAGE_LIMIT
        );
        self.fetch_tracks(&url).await
    }

    /// Tracks of a single playlist of a user
    pub async fn playlist_tracks(&self, user_id: &str, playlist_id: &str) -> Result<Vec<Track>> {
        let url = format!(
            "{}/{}/playlist/{}?format=json&limit={}",
            self.base_url, user_id, playlist_id, PAGE_LIMIT
        );
        self.fetch_tracks(&url).await
    }

    async fn fetch_tracks(&self, url: &str) -> Result<Vec<Track>> {
        debug!("Fetching tracks from: {}", url);

        let tracks: Vec<Track> = self
            .http_client
            .get(url)
            .send()
            .await
            .context("Failed to reach the Openwhyd server")?
            .json()
            .await
            .context("Failed to parse track list response")?;

        debug!("Fetched {} tracks", tracks.len());
        Ok(tracks)
    }
}
