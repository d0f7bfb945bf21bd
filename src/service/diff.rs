//! Snapshot diffing.
//!
//! Pure comparison of a subscription's stored snapshot against a freshly
//! fetched playlist. No I/O, no clocks.

use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::remote::Playlist;
use crate::remote::PlaylistTrack;

/// Result of comparing a stored snapshot to the current playlist state.
pub struct PlaylistDiff {
    pub version_changed: bool,
    /// Tracks absent from the previous snapshot, in remote playlist order.
    pub new_tracks: Vec<PlaylistTrack>,
    /// Canonical snapshot of the current playlist, ready to persist.
    pub snapshot: String,
}

/// Compares `previous_snapshot`/`previous_version` against `current`.
///
/// Fast path: the remote guarantees the version marker is stable iff the
/// content is unchanged, so equal versions skip the track comparison
/// entirely and keep the stored snapshot.
pub fn diff(previous_snapshot: &str, previous_version: &str, current: &Playlist) -> PlaylistDiff {
    if previous_version == current.snapshot_id {
        return PlaylistDiff {
            version_changed: false,
            new_tracks: Vec::new(),
            snapshot: previous_snapshot.to_string(),
        };
    }

    let previous: HashSet<&str> = snapshot_ids(previous_snapshot).collect();
    let new_tracks = current
        .tracks
        .iter()
        .filter(|t| !previous.contains(t.track.id.as_str()))
        .cloned()
        .collect();

    PlaylistDiff {
        version_changed: true,
        new_tracks,
        snapshot: canonical_snapshot(current.track_ids().iter().map(String::as_str)),
    }
}

/// Track ids of a stored snapshot. The empty snapshot has no ids.
pub fn snapshot_ids(snapshot: &str) -> impl Iterator<Item = &str> {
    snapshot.split(',').filter(|id| !id.is_empty())
}

/// Canonical comparable form: sorted, deduplicated, comma-joined.
pub fn canonical_snapshot<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let sorted: BTreeSet<&str> = ids.filter(|id| !id.is_empty()).collect();
    sorted.into_iter().collect::<Vec<_>>().join(",")
}
