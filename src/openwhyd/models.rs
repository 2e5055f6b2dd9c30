//! Openwhyd API response models

use serde::Deserialize;

/// Playlist folder used when a track has no playlist assignment
pub const DEFAULT_PLAYLIST: &str = "Default";

/// Playlist a track belongs to, embedded in the track record
#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub name: String,
}

/// A track from a user's profile or playlist
///
/// The API returns many more fields per track; everything except what the
/// export needs is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    /// Composite external id of the form `<source>/<kind>/<id>`
    #[serde(rename = "eId", default)]
    pub external_id: String,
    /// Display name; tracks without one are never scheduled
    #[serde(default)]
    pub name: String,
    #[serde(rename = "pl")]
    pub playlist: Option<Playlist>,
    /// Name of the user who posted the track
    #[serde(rename = "uNm", default)]
    pub owner: String,
}

impl Track {
    /// Playlist name for this track, falling back to [`DEFAULT_PLAYLIST`]
    /// when the track was posted outside any playlist.
    pub fn playlist_name(&self) -> &str {
        self.playlist
            .as_ref()
            .map(|pl| pl.name.as_str())
            .unwrap_or(DEFAULT_PLAYLIST)
    }

    /// YouTube video id from the external id.
    ///
    /// Returns `None` when the track comes from another source or the id is
    /// malformed; callers treat both the same way and skip the track.
    pub fn youtube_id(&self) -> Option<&str> {
        let mut segments = self.external_id.split('/');
        segments.next()?;
        if segments.next()? != "yt" {
            return None;
        }
        segments.next().filter(|id| !id.is_empty())
    }
}
