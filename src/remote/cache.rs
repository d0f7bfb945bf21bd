//! Memoizing wrapper over [`PlaylistApi`].
//!
//! Scoped to one notification build: activities in an aggregated email
//! mostly point at the same playlist and a small set of actors, so repeated
//! lookups are served from memory instead of hitting the API again.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::remote::Playlist;
use crate::remote::PlaylistApi;
use crate::remote::PublicProfile;
use crate::remote::RemoteError;

pub struct CachingApi<'a> {
    api: &'a dyn PlaylistApi,
    access_token: String,
    profiles: Mutex<HashMap<String, PublicProfile>>,
    playlists: Mutex<HashMap<(String, String), Playlist>>,
}

impl<'a> CachingApi<'a> {
    pub fn new(api: &'a dyn PlaylistApi, access_token: &str) -> Self {
        Self {
            api,
            access_token: access_token.to_string(),
            profiles: Mutex::new(HashMap::new()),
            playlists: Mutex::new(HashMap::new()),
        }
    }

    pub async fn profile(&self, user_id: &str) -> Result<PublicProfile, RemoteError> {
        if let Some(profile) = self
            .profiles
            .lock()
            .expect("cache mutex poisoned")
            .get(user_id)
        {
            return Ok(profile.clone());
        }

        let profile = self.api.fetch_profile(user_id, &self.access_token).await?;
        self.profiles
            .lock()
            .expect("cache mutex poisoned")
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    pub async fn playlist(
        &self,
        owner_id: &str,
        playlist_id: &str,
    ) -> Result<Playlist, RemoteError> {
        let key = (owner_id.to_string(), playlist_id.to_string());
        if let Some(playlist) = self
            .playlists
            .lock()
            .expect("cache mutex poisoned")
            .get(&key)
        {
            return Ok(playlist.clone());
        }

        let playlist = self
            .api
            .fetch_playlist(owner_id, playlist_id, &self.access_token)
            .await?;
        self.playlists
            .lock()
            .expect("cache mutex poisoned")
            .insert(key, playlist.clone());
        Ok(playlist)
    }
}
