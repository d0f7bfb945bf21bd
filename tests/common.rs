//! Common test utilities and mock implementations.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use uuid::Uuid;

use spotwatch::auth::AuthError;
use spotwatch::auth::ResolvedToken;
use spotwatch::auth::TokenProvider;
use spotwatch::clock::Clock;
use spotwatch::clock::ManualClock;
use spotwatch::model::User;
use spotwatch::notifier::MailError;
use spotwatch::notifier::Mailer;
use spotwatch::remote::Playlist;
use spotwatch::remote::PlaylistApi;
use spotwatch::remote::PlaylistTrack;
use spotwatch::remote::PublicProfile;
use spotwatch::remote::RemoteError;
use spotwatch::remote::Track;
use spotwatch::repository::SqliteStore;

/// A fixed, fraction-free instant so timestamp assertions are exact.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(epoch()))
}

/// Sets up a temporary test database.
pub async fn setup_store(clock: Arc<dyn Clock>) -> (Arc<SqliteStore>, PathBuf) {
    let uuid = Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("spotwatch-test-{}.db", uuid));
    let db_url = format!("sqlite://{}", db_path.to_str().unwrap());

    let store = SqliteStore::new(&db_url, db_path.to_str().unwrap(), clock)
        .await
        .expect("Failed to create database");
    store
        .create_tables()
        .await
        .expect("Failed to create tables");

    (Arc::new(store), db_path)
}

/// Cleans up the test database file.
pub fn teardown_store(db_path: PathBuf) {
    if db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
}

pub fn make_user(id: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        expires_at: epoch() + chrono::Duration::hours(1),
        name: format!("Name {id}"),
        email: email.to_string(),
        ..User::default()
    }
}

pub fn make_track(track_id: &str, added_by: &str, added_at: DateTime<Utc>) -> PlaylistTrack {
    PlaylistTrack {
        track: Track {
            id: track_id.to_string(),
            name: format!("Track {track_id}"),
            uri: format!("spotify:track:{track_id}"),
            ..Track::default()
        },
        added_at,
        added_by: Some(PublicProfile {
            id: added_by.to_string(),
            display_name: String::new(),
        }),
    }
}

pub fn make_playlist(
    owner_id: &str,
    playlist_id: &str,
    version: &str,
    tracks: Vec<PlaylistTrack>,
) -> Playlist {
    Playlist {
        id: playlist_id.to_string(),
        name: format!("Playlist {playlist_id}"),
        owner_id: owner_id.to_string(),
        snapshot_id: version.to_string(),
        url: format!("https://open.example.com/playlist/{playlist_id}"),
        tracks,
    }
}

// MOCK PLAYLIST API

#[derive(Default)]
pub struct MockApiState {
    pub playlists: HashMap<(String, String), Playlist>,
    pub profiles: HashMap<String, PublicProfile>,
    /// Playlists that answer with a transient 500 instead of content.
    pub failing: HashSet<(String, String)>,
    pub playlist_fetches: usize,
    pub profile_fetches: usize,
}

/// Mock remote API backed by in-memory state.
#[derive(Default)]
pub struct MockApi {
    pub state: RwLock<MockApiState>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_playlist(&self, playlist: Playlist) {
        let key = (playlist.owner_id.clone(), playlist.id.clone());
        self.state.write().unwrap().playlists.insert(key, playlist);
    }

    pub fn remove_playlist(&self, owner_id: &str, playlist_id: &str) {
        self.state
            .write()
            .unwrap()
            .playlists
            .remove(&(owner_id.to_string(), playlist_id.to_string()));
    }

    pub fn set_profile(&self, id: &str, display_name: &str) {
        self.state.write().unwrap().profiles.insert(
            id.to_string(),
            PublicProfile {
                id: id.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn fail_playlist(&self, owner_id: &str, playlist_id: &str) {
        self.state
            .write()
            .unwrap()
            .failing
            .insert((owner_id.to_string(), playlist_id.to_string()));
    }
}

#[async_trait]
impl PlaylistApi for MockApi {
    async fn fetch_playlist(
        &self,
        owner_id: &str,
        playlist_id: &str,
        _access_token: &str,
    ) -> Result<Playlist, RemoteError> {
        let key = (owner_id.to_string(), playlist_id.to_string());
        let mut state = self.state.write().unwrap();
        state.playlist_fetches += 1;

        if state.failing.contains(&key) {
            return Err(RemoteError::ApiError {
                status: 500,
                resource: playlist_id.to_string(),
            });
        }
        state
            .playlists
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: playlist_id.to_string(),
            })
    }

    async fn fetch_profile(
        &self,
        user_id: &str,
        _access_token: &str,
    ) -> Result<PublicProfile, RemoteError> {
        let mut state = self.state.write().unwrap();
        state.profile_fetches += 1;

        Ok(state
            .profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| PublicProfile {
                id: user_id.to_string(),
                display_name: String::new(),
            }))
    }
}

// MOCK TOKEN PROVIDER

/// Hands back the stored access token untouched, or fails for listed users.
#[derive(Default)]
pub struct MockTokenProvider {
    pub fail_for: RwLock<HashSet<String>>,
}

impl MockTokenProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, user_id: &str) {
        self.fail_for.write().unwrap().insert(user_id.to_string());
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn resolve(&self, user: &User) -> Result<ResolvedToken, AuthError> {
        if self.fail_for.read().unwrap().contains(&user.id) {
            return Err(AuthError::RefreshRejected {
                user_id: user.id.clone(),
                status: 400,
            });
        }
        Ok(ResolvedToken {
            access_token: user.access_token.clone(),
            user: user.clone(),
        })
    }
}

// MOCK MAILER

#[derive(Debug, Clone)]
pub struct SentMail {
    pub from: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct MockMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

impl MockMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_html(
        &self,
        from: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            from: from.to_string(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
