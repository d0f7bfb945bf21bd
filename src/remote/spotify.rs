//! Spotify Web API client.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use wreq::Client;
use wreq::header::AUTHORIZATION;
use wreq::header::HeaderMap;
use wreq::header::HeaderValue;
use wreq::header::USER_AGENT;

use crate::remote::Playlist;
use crate::remote::PlaylistApi;
use crate::remote::PlaylistTrack;
use crate::remote::PublicProfile;
use crate::remote::RemoteError;

#[derive(Deserialize)]
struct WireTrackPage {
    #[serde(default)]
    items: Vec<PlaylistTrack>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct WirePlaylist {
    id: String,
    name: String,
    snapshot_id: String,
    #[serde(default)]
    owner: Option<PublicProfile>,
    #[serde(default)]
    external_urls: std::collections::HashMap<String, String>,
    tracks: WireTrackPage,
}

pub struct SpotifyClient {
    client: Client,
    api_url: String,
}

impl SpotifyClient {
    pub fn new(api_url: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("spotwatch/0.1"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create client");

        Self { client, api_url }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, RemoteError> {
        debug!("Making request to: {url}");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        let status = response.status();
        if status == wreq::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                resource: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::ApiError {
                status: status.as_u16(),
                resource: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PlaylistApi for SpotifyClient {
    async fn fetch_playlist(
        &self,
        owner_id: &str,
        playlist_id: &str,
        access_token: &str,
    ) -> Result<Playlist, RemoteError> {
        let url = format!(
            "{}/v1/users/{owner_id}/playlists/{playlist_id}",
            self.api_url
        );
        let wire: WirePlaylist = self.get_json(&url, access_token).await?;

        let mut tracks = wire.tracks.items;
        let mut next = wire.tracks.next;

        // The track list comes paginated; `next` is an absolute URL or null.
        while let Some(page_url) = next {
            let page: WireTrackPage = self.get_json(&page_url, access_token).await?;
            tracks.extend(page.items);
            next = page.next;
        }

        Ok(Playlist {
            id: wire.id,
            name: wire.name,
            owner_id: wire.owner.map(|o| o.id).unwrap_or_default(),
            snapshot_id: wire.snapshot_id,
            url: wire
                .external_urls
                .get("spotify")
                .cloned()
                .unwrap_or_default(),
            tracks,
        })
    }

    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<PublicProfile, RemoteError> {
        let url = format!("{}/v1/users/{user_id}", self.api_url);
        self.get_json(&url, access_token).await
    }
}
