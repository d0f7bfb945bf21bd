use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// Sentinel passed to activity feed queries to start from the newest row.
pub const LATEST_ACTIVITY_ID: i64 = i64::MAX;

/// A user of the service, keyed by their Spotify user id.
///
/// Holds the current OAuth credentials. The token provider rewrites the
/// credential fields whenever a refresh yields a new token.
#[derive(FromRow, Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub last_seen_activity_id: Option<i64>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// One user's watch on one playlist.
///
/// `playlist_version` and `playlist_tracks` together form the last-observed
/// snapshot that reconciliation diffs against. `next_check_at == None` means
/// the subscription is dormant (the playlist was deleted remotely) and is
/// never selected for checking again.
#[derive(FromRow, Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Subscription {
    /// Opaque external identifier, stable for the subscription's life.
    pub token: String,
    pub user_id: String,
    pub playlist_id: String,
    pub playlist_owner_id: String,
    pub playlist_name: String,
    /// Remote snapshot marker; changes whenever the playlist mutates.
    #[serde(default)]
    pub playlist_version: String,
    /// Canonical comma-joined sorted set of track ids seen at the last check.
    #[serde(default)]
    pub playlist_tracks: String,
    #[serde(default)]
    pub next_check_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new subscription. The store mints the token
/// and timestamps.
#[derive(Default, Clone, Debug)]
pub struct NewSubscription {
    pub user_id: String,
    pub playlist_id: String,
    pub playlist_owner_id: String,
    pub playlist_name: String,
    pub playlist_version: String,
    pub playlist_tracks: String,
    pub next_check_at: Option<DateTime<Utc>>,
}

/// Kind of detected playlist event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    #[default]
    TrackAdded,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::TrackAdded => "track_added",
        }
    }
}

/// Metadata of the track an activity refers to, captured at detection time.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct TrackMetadata {
    pub track_id: String,
    pub name: String,
    #[serde(default)]
    pub artist_names: Vec<String>,
    #[serde(default)]
    pub album_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub uri: String,
}

/// Payload of one detected event, stored as the activity's JSON `data` column.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct ActivityData {
    pub kind: ActivityKind,
    pub playlist_id: String,
    pub playlist_owner_id: String,
    pub track_metadata: TrackMetadata,
    /// Remote user who caused the event (e.g. added the track).
    pub actor_user_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityData {
    /// Deterministic dedup key, unique within one subscription. Appending an
    /// activity whose key already exists is a no-op.
    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.track_metadata.track_id)
    }
}

/// An immutable record of one detected playlist change.
///
/// `id` is assigned by the store and defines global chronological order.
#[derive(FromRow, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub unique_id: String,
    pub subscription_token: String,
    pub user_id: String,
    pub data: sqlx::types::Json<ActivityData>,
    pub created_at: DateTime<Utc>,
}
