//! Remote playlist API: wire types, fetch contract, and implementations.

pub mod cache;
pub mod spotify;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;

pub use cache::CachingApi;
pub use spotify::SpotifyClient;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RemoteError {
    /// The remote resource was removed. A distinguished outcome, not a
    /// failure: it drives the dormant transition for subscriptions.
    #[error("Remote resource not found: {resource}")]
    NotFound { resource: String },

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Remote API error: status {status} for {resource}")]
    ApiError { status: u16, resource: String },
}

impl From<wreq::Error> for RemoteError {
    fn from(e: wreq::Error) -> Self {
        RemoteError::RequestFailed(Box::new(e))
    }
}

/// Public profile of a remote user, used for notification templating.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

impl PublicProfile {
    /// Display name with the id as fallback; profiles are not required to
    /// carry one.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
    #[serde(default)]
    pub uri: String,
}

impl Track {
    pub fn artist_names(&self) -> Vec<String> {
        self.artists.iter().map(|a| a.name.clone()).collect()
    }

    pub fn public_url(&self) -> String {
        self.external_urls
            .get("spotify")
            .cloned()
            .unwrap_or_default()
    }
}

/// One entry of a playlist: the track plus who added it and when.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTrack {
    pub track: Track,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub added_by: Option<PublicProfile>,
}

impl PlaylistTrack {
    pub fn added_by_id(&self) -> String {
        self.added_by
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_default()
    }
}

/// A playlist with its full track list (pagination already exhausted).
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Remote version marker, stable iff the playlist content is unchanged.
    pub snapshot_id: String,
    pub url: String,
    pub tracks: Vec<PlaylistTrack>,
}

impl Playlist {
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.track.id.clone()).collect()
    }
}

/// Fetches current remote state with a caller-supplied bearer token.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Fetches a playlist including all tracks across continuation pages.
    async fn fetch_playlist(
        &self,
        owner_id: &str,
        playlist_id: &str,
        access_token: &str,
    ) -> Result<Playlist, RemoteError>;

    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<PublicProfile, RemoteError>;
}
