//! Turns newly detected tracks into durable activity records.

use std::sync::Arc;

use log::info;

use crate::model::Activity;
use crate::model::ActivityData;
use crate::model::ActivityKind;
use crate::model::Subscription;
use crate::model::TrackMetadata;
use crate::remote::PlaylistTrack;
use crate::repository::Store;
use crate::repository::StoreError;

pub struct ActivityRecorder {
    store: Arc<dyn Store>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records one activity per new track. The store treats dedup-key
    /// collisions as no-ops, so recording the same diff twice (a retried
    /// cycle) yields the same rows rather than duplicates.
    pub async fn record(
        &self,
        sub: &Subscription,
        new_tracks: &[PlaylistTrack],
    ) -> Result<Vec<Activity>, StoreError> {
        if new_tracks.is_empty() {
            return Ok(Vec::new());
        }

        let data: Vec<ActivityData> = new_tracks
            .iter()
            .map(|entry| {
                info!(
                    "New track. user_id={} subscription_token={} playlist_id={} track_id={}",
                    sub.user_id, sub.token, sub.playlist_id, entry.track.id
                );
                ActivityData {
                    kind: ActivityKind::TrackAdded,
                    playlist_id: sub.playlist_id.clone(),
                    playlist_owner_id: sub.playlist_owner_id.clone(),
                    track_metadata: TrackMetadata {
                        track_id: entry.track.id.clone(),
                        name: entry.track.name.clone(),
                        artist_names: entry.track.artist_names(),
                        album_name: entry
                            .track
                            .album
                            .as_ref()
                            .map(|a| a.name.clone())
                            .unwrap_or_default(),
                        url: entry.track.public_url(),
                        uri: entry.track.uri.clone(),
                    },
                    actor_user_id: entry.added_by_id(),
                    occurred_at: entry.added_at,
                }
            })
            .collect();

        self.store.append_activities(sub, data).await
    }
}
