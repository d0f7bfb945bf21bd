//! SQLite-backed store implementation.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use uuid::Uuid;

use crate::clock::Clock;
use crate::model::Activity;
use crate::model::ActivityData;
use crate::model::NewSubscription;
use crate::model::Subscription;
use crate::model::User;
use crate::repository::error::StoreError;
use crate::repository::store::Store;

pub struct SqliteStore {
    pub pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    pub async fn new(
        db_url: &str,
        db_path: &str,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let path = std::path::Path::new(db_path);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "")?;
        }

        let opts = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        Ok(Self { pool, clock })
    }

    pub async fn create_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                last_seen_activity_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                playlist_id TEXT NOT NULL,
                playlist_owner_id TEXT NOT NULL,
                playlist_name TEXT NOT NULL,
                playlist_version TEXT NOT NULL,
                playlist_tracks TEXT NOT NULL,
                next_check_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, playlist_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                unique_id TEXT NOT NULL,
                subscription_token TEXT NOT NULL,
                user_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(subscription_token, unique_id),
                FOREIGN KEY (subscription_token) REFERENCES subscriptions(token)
                    ON DELETE CASCADE
                    ON UPDATE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn upsert_user(&self, user: &User) -> Result<User, StoreError> {
        let now = self.clock.now();

        // Single-statement upsert so concurrent refreshes cannot interleave.
        let updated = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (id, access_token, refresh_token, expires_at, name, email,
                 last_seen_activity_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&user.id)
        .bind(&user.access_token)
        .bind(&user.refresh_token)
        .bind(user.expires_at)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.last_seen_activity_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn create_subscription(
        &self,
        sub: &NewSubscription,
    ) -> Result<Subscription, StoreError> {
        let now = self.clock.now();
        let token = Uuid::new_v4().simple().to_string();

        let inserted = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (token, user_id, playlist_id, playlist_owner_id, playlist_name,
                 playlist_version, playlist_tracks, next_check_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&token)
        .bind(&sub.user_id)
        .bind(&sub.playlist_id)
        .bind(&sub.playlist_owner_id)
        .bind(&sub.playlist_name)
        .bind(&sub.playlist_version)
        .bind(&sub.playlist_tracks)
        .bind(sub.next_check_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                let existing = sqlx::query_as::<_, Subscription>(
                    "SELECT * FROM subscriptions WHERE user_id = ? AND playlist_id = ?",
                )
                .bind(&sub.user_id)
                .bind(&sub.playlist_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(existing)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_subscription(&self, token: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM activities WHERE subscription_token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM subscriptions WHERE token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        let subs = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_id = ? ORDER BY token",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, StoreError> {
        let subs = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE next_check_at IS NOT NULL AND next_check_at <= ?
            ORDER BY next_check_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    async fn update_watermark(&self, sub: &Subscription) -> Result<(), StoreError> {
        let now = self.clock.now();

        // Last-write-wins; the scheduler is the only writer.
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET playlist_version = ?, playlist_tracks = ?, next_check_at = ?, updated_at = ?
            WHERE token = ?
            "#,
        )
        .bind(&sub.playlist_version)
        .bind(&sub.playlist_tracks)
        .bind(sub.next_check_at)
        .bind(now)
        .bind(&sub.token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_activities(
        &self,
        sub: &Subscription,
        data: Vec<ActivityData>,
    ) -> Result<Vec<Activity>, StoreError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let mut activities = Vec::with_capacity(data.len());
        for item in data {
            let unique_id = item.unique_id();

            sqlx::query(
                r#"
                INSERT INTO activities
                    (unique_id, subscription_token, user_id, data, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(subscription_token, unique_id) DO NOTHING
                "#,
            )
            .bind(&unique_id)
            .bind(&sub.token)
            .bind(&sub.user_id)
            .bind(sqlx::types::Json(&item))
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Read back whichever row now owns the key, whether it was just
            // inserted or survived from an earlier retried cycle.
            let activity = sqlx::query_as::<_, Activity>(
                "SELECT * FROM activities WHERE subscription_token = ? AND unique_id = ?",
            )
            .bind(&sub.token)
            .bind(&unique_id)
            .fetch_one(&mut *tx)
            .await?;
            activities.push(activity);
        }

        tx.commit().await?;
        Ok(activities)
    }

    async fn list_activity_for_user(
        &self,
        user_id: &str,
        to_id: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities WHERE user_id = ? AND id <= ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(to_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }
}
