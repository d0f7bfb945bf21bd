//! Per-pass reconciliation of due subscriptions against remote state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use log::debug;
use log::error;
use log::info;

use crate::auth::ResolvedToken;
use crate::auth::TokenProvider;
use crate::clock::Clock;
use crate::model::Subscription;
use crate::notifier::Notifier;
use crate::remote::PlaylistApi;
use crate::remote::RemoteError;
use crate::repository::Store;
use crate::service::diff::diff;
use crate::service::error::SyncError;
use crate::service::recorder::ActivityRecorder;

/// Terminal state of one subscription's reconciliation within a pass.
///
/// `Dormant` and the others all commit exactly one watermark write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The playlist is gone remotely; the subscription was parked by
    /// clearing its next-check time.
    Dormant,
    /// Version marker unchanged; only the next-check time advanced.
    Unchanged,
    /// Content changed; activities recorded and the snapshot advanced.
    Updated {
        new_activities: usize,
        notified: bool,
    },
}

/// Counts reported back to the scheduler after a pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSummary {
    pub due: usize,
    pub failed: usize,
}

/// Drives one reconciliation cycle per due subscription: fetch, diff,
/// record, notify, advance the watermark.
pub struct SyncService {
    store: Arc<dyn Store>,
    api: Arc<dyn PlaylistApi>,
    tokens: Arc<dyn TokenProvider>,
    notifier: Arc<Notifier>,
    recorder: ActivityRecorder,
    clock: Arc<dyn Clock>,
    check_period: Duration,
    due_batch_size: i64,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn Store>,
        api: Arc<dyn PlaylistApi>,
        tokens: Arc<dyn TokenProvider>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        check_period: Duration,
        due_batch_size: i64,
    ) -> Self {
        let recorder = ActivityRecorder::new(store.clone());
        Self {
            store,
            api,
            tokens,
            notifier,
            recorder,
            clock,
            check_period,
            due_batch_size,
        }
    }

    /// Runs one pass: selects due subscriptions, resolves their users, and
    /// reconciles each in due order. Per-subscription faults are logged and
    /// counted; the rest of the pass still runs. A user that cannot be
    /// resolved aborts the pass before any subscription is touched.
    pub async fn run_pass(&self) -> Result<PassSummary, SyncError> {
        let now = self.clock.now();
        let subs = self.store.list_due(now, self.due_batch_size).await?;
        info!("Updating subscriptions. count={}", subs.len());

        let resolved = self.resolve_users(&subs).await?;

        let mut summary = PassSummary {
            due: subs.len(),
            failed: 0,
        };
        for sub in subs {
            match self.reconcile(&sub, &resolved[&sub.user_id]).await {
                Ok(ReconcileOutcome::Dormant) => {
                    info!(
                        "Subscription now dormant. subscription_token={} playlist_id={}",
                        sub.token, sub.playlist_id
                    );
                }
                Ok(ReconcileOutcome::Unchanged) => {
                    debug!(
                        "No changes. subscription_token={} playlist_id={}",
                        sub.token, sub.playlist_id
                    );
                }
                Ok(ReconcileOutcome::Updated {
                    new_activities,
                    notified,
                }) => {
                    info!(
                        "Playlist changed. subscription_token={} new_activities={} notified={}",
                        sub.token, new_activities, notified
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        "Error updating subscription `{}` (playlist `{}`): {e}",
                        sub.token, sub.playlist_id
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Resolves each distinct referenced user once. Every subscription in
    /// the pass shares the cache, so a user with several due subscriptions
    /// costs one lookup and at most one token refresh.
    async fn resolve_users(
        &self,
        subs: &[Subscription],
    ) -> Result<HashMap<String, ResolvedToken>, SyncError> {
        let mut resolved: HashMap<String, ResolvedToken> = HashMap::new();
        for sub in subs {
            if resolved.contains_key(&sub.user_id) {
                continue;
            }
            let user = self.store.get_user(&sub.user_id).await?.ok_or_else(|| {
                SyncError::UserResolution {
                    user_id: sub.user_id.clone(),
                    reason: "user not found".to_string(),
                }
            })?;
            let token =
                self.tokens
                    .resolve(&user)
                    .await
                    .map_err(|e| SyncError::UserResolution {
                        user_id: sub.user_id.clone(),
                        reason: e.to_string(),
                    })?;
            resolved.insert(sub.user_id.clone(), token);
        }
        Ok(resolved)
    }

    async fn reconcile(
        &self,
        sub: &Subscription,
        resolved: &ResolvedToken,
    ) -> Result<ReconcileOutcome, SyncError> {
        info!(
            "Updating subscription. user_id={} subscription_token={} playlist_id={}",
            sub.user_id, sub.token, sub.playlist_id
        );

        let mut sub = sub.clone();
        let playlist = match self
            .api
            .fetch_playlist(&sub.playlist_owner_id, &sub.playlist_id, &resolved.access_token)
            .await
        {
            Ok(playlist) => playlist,
            Err(RemoteError::NotFound { .. }) => {
                info!(
                    "Playlist deleted. owner_id={} playlist_id={}",
                    sub.playlist_owner_id, sub.playlist_id
                );
                sub.next_check_at = None;
                self.store.update_watermark(&sub).await?;
                return Ok(ReconcileOutcome::Dormant);
            }
            Err(e) => return Err(e.into()),
        };

        // Constant cadence: due again one period from now whether or not
        // anything changed.
        sub.next_check_at = Some(self.clock.now() + self.check_period);

        let diffed = diff(&sub.playlist_tracks, &sub.playlist_version, &playlist);
        if !diffed.version_changed {
            self.store.update_watermark(&sub).await?;
            return Ok(ReconcileOutcome::Unchanged);
        }

        let activities = self.recorder.record(&sub, &diffed.new_tracks).await?;

        // Notification failure is not a reconciliation failure: the
        // activities are already durable, and re-sending on retry would be
        // worse than a missed email.
        let notified = match self
            .notifier
            .subscription_update(&resolved.user, &resolved.access_token, &activities)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                error!("Error notifying: {e}");
                false
            }
        };

        sub.playlist_version = playlist.snapshot_id.clone();
        sub.playlist_tracks = diffed.snapshot;
        self.store.update_watermark(&sub).await?;

        Ok(ReconcileOutcome::Updated {
            new_activities: activities.len(),
            notified,
        })
    }
}
