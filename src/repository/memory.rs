//! In-memory store implementation.
//!
//! Mirrors the SQLite store's semantics (idempotent appends, monotonic
//! activity ids, due-time ordering) without any I/O. Used by tests and
//! useful for local experimentation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::model::Activity;
use crate::model::ActivityData;
use crate::model::NewSubscription;
use crate::model::Subscription;
use crate::model::User;
use crate::repository::error::StoreError;
use crate::repository::store::Store;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    subscriptions: HashMap<String, Subscription>,
    activities: Vec<Activity>,
    next_activity_id: i64,
}

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                next_activity_id: 1,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<User, StoreError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let updated = match inner.users.get_mut(&user.id) {
            Some(existing) => {
                existing.access_token = user.access_token.clone();
                existing.refresh_token = user.refresh_token.clone();
                existing.expires_at = user.expires_at;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let mut created = user.clone();
                created.created_at = now;
                created.updated_at = now;
                inner.users.insert(created.id.clone(), created.clone());
                created
            }
        };

        Ok(updated)
    }

    async fn create_subscription(
        &self,
        sub: &NewSubscription,
    ) -> Result<Subscription, StoreError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        if let Some(existing) = inner
            .subscriptions
            .values()
            .find(|s| s.user_id == sub.user_id && s.playlist_id == sub.playlist_id)
        {
            return Ok(existing.clone());
        }

        let created = Subscription {
            token: Uuid::new_v4().simple().to_string(),
            user_id: sub.user_id.clone(),
            playlist_id: sub.playlist_id.clone(),
            playlist_owner_id: sub.playlist_owner_id.clone(),
            playlist_name: sub.playlist_name.clone(),
            playlist_version: sub.playlist_version.clone(),
            playlist_tracks: sub.playlist_tracks.clone(),
            next_check_at: sub.next_check_at,
            created_at: now,
            updated_at: now,
        };
        inner
            .subscriptions
            .insert(created.token.clone(), created.clone());

        Ok(created)
    }

    async fn delete_subscription(&self, token: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let existed = inner.subscriptions.remove(token).is_some();
        if existed {
            inner.activities.retain(|a| a.subscription_token != token);
        }
        Ok(existed)
    }

    async fn list_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        let mut subs: Vec<Subscription> = self
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| a.token.cmp(&b.token));
        Ok(subs)
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, StoreError> {
        let mut due: Vec<Subscription> = self
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.next_check_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_check_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn update_watermark(&self, sub: &Subscription) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let stored =
            inner
                .subscriptions
                .get_mut(&sub.token)
                .ok_or_else(|| StoreError::InternalError {
                    message: format!("No subscription with token `{}`", sub.token),
                })?;
        stored.playlist_version = sub.playlist_version.clone();
        stored.playlist_tracks = sub.playlist_tracks.clone();
        stored.next_check_at = sub.next_check_at;
        stored.updated_at = now;

        Ok(())
    }

    async fn append_activities(
        &self,
        sub: &Subscription,
        data: Vec<ActivityData>,
    ) -> Result<Vec<Activity>, StoreError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let mut activities = Vec::with_capacity(data.len());
        for item in data {
            let unique_id = item.unique_id();

            if let Some(existing) = inner
                .activities
                .iter()
                .find(|a| a.subscription_token == sub.token && a.unique_id == unique_id)
            {
                activities.push(existing.clone());
                continue;
            }

            let id = inner.next_activity_id;
            inner.next_activity_id += 1;
            let activity = Activity {
                id,
                unique_id,
                subscription_token: sub.token.clone(),
                user_id: sub.user_id.clone(),
                data: sqlx::types::Json(item),
                created_at: now,
            };
            inner.activities.push(activity.clone());
            activities.push(activity);
        }

        Ok(activities)
    }

    async fn list_activity_for_user(
        &self,
        user_id: &str,
        to_id: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut activities: Vec<Activity> = self
            .lock()
            .activities
            .iter()
            .filter(|a| a.user_id == user_id && a.id <= to_id)
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.id.cmp(&a.id));
        activities.truncate(limit.max(0) as usize);
        Ok(activities)
    }
}
