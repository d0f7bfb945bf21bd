//! Aggregated update notifications for subscriptions.

pub mod mailer;

use std::sync::Arc;

use log::debug;
use log::info;
use minijinja::Environment;
use serde::Serialize;

use crate::model::Activity;
use crate::model::User;
use crate::remote::CachingApi;
use crate::remote::PlaylistApi;
use crate::remote::RemoteError;

pub use mailer::HttpApiMailer;
pub use mailer::MailError;
pub use mailer::Mailer;

const SUBJECT: &str = "Updates to your Spotify playlist";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotifyError {
    #[error("User `{user_id}` has no email address")]
    MissingEmail { user_id: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Failed to render notification template: {0}")]
    TemplateFailed(#[from] minijinja::Error),

    #[error(transparent)]
    Mail(#[from] MailError),
}

#[derive(Serialize)]
struct EmailPlaylist {
    name: String,
    url: String,
    subscription_token: String,
}

#[derive(Serialize)]
struct EmailActivity {
    track_name: String,
    artist_names: String,
    album_name: String,
    track_url: String,
    actor_name: String,
}

#[derive(Serialize)]
struct EmailData {
    app_base_url: String,
    playlist: Option<EmailPlaylist>,
    activities: Vec<EmailActivity>,
    actors_description: String,
}

/// Builds and sends one aggregated email per subscription update.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    api: Arc<dyn PlaylistApi>,
    jinja_env: Environment<'static>,
    app_base_url: String,
    from_email: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        api: Arc<dyn PlaylistApi>,
        app_base_url: String,
        from_email: String,
    ) -> Self {
        let mut jinja_env = Environment::new();
        jinja_env
            .add_template(
                "subscription_update",
                include_str!("templates/subscription_update.html"),
            )
            .expect("Failed to parse notification template");

        Self {
            mailer,
            api,
            jinja_env,
            app_base_url,
            from_email,
        }
    }

    /// Notifies `user` about newly recorded activities on one subscription.
    ///
    /// Activities whose actor is the user themselves never trigger an email.
    /// When anything else remains, a single aggregated email covering every
    /// new activity (self-caused ones included) is sent. Returns whether an
    /// email went out.
    pub async fn subscription_update(
        &self,
        user: &User,
        access_token: &str,
        activities: &[Activity],
    ) -> Result<bool, NotifyError> {
        let foreign = activities
            .iter()
            .filter(|a| a.data.actor_user_id != user.id)
            .count();
        if foreign == 0 {
            debug!(
                "Skipping notification, all activity is the user's own. user_id={}",
                user.id
            );
            return Ok(false);
        }

        if user.email.is_empty() {
            return Err(NotifyError::MissingEmail {
                user_id: user.id.clone(),
            });
        }

        // One remote lookup per distinct actor/playlist for the whole build.
        let cached = CachingApi::new(&*self.api, access_token);

        let mut data = EmailData {
            app_base_url: self.app_base_url.clone(),
            playlist: None,
            activities: Vec::with_capacity(activities.len()),
            actors_description: String::new(),
        };

        let mut actor_names = Vec::with_capacity(activities.len());
        for activity in activities {
            let actor = cached.profile(&activity.data.actor_user_id).await?;

            if data.playlist.is_none() {
                let playlist = cached
                    .playlist(&activity.data.playlist_owner_id, &activity.data.playlist_id)
                    .await?;
                data.playlist = Some(EmailPlaylist {
                    name: playlist.name,
                    url: playlist.url,
                    subscription_token: activity.subscription_token.clone(),
                });
            }

            let track = &activity.data.track_metadata;
            actor_names.push(actor.name().to_string());
            data.activities.push(EmailActivity {
                track_name: track.name.clone(),
                artist_names: track.artist_names.join(", "),
                album_name: track.album_name.clone(),
                track_url: track.url.clone(),
                actor_name: actor.name().to_string(),
            });
        }
        data.actors_description = pretty_actor_names(&actor_names, 3);

        let body = self
            .jinja_env
            .get_template("subscription_update")?
            .render(&data)?;

        self.mailer
            .send_html(&self.from_email, &[user.email.clone()], SUBJECT, &body)
            .await?;

        info!(
            "Sent subscription update email. user_id={} activities={}",
            user.id,
            activities.len()
        );
        Ok(true)
    }
}

/// Human-readable summary of who made the changes: distinct names, sorted,
/// capped at `max` with a trailing "and more".
fn pretty_actor_names(names: &[String], max: usize) -> String {
    if names.is_empty() {
        return "Nobody".to_string();
    }

    let mut distinct: Vec<&str> = Vec::new();
    for name in names {
        if !distinct.contains(&name.as_str()) {
            distinct.push(name);
        }
    }
    distinct.sort_unstable();

    if distinct.len() > max {
        distinct.truncate(max);
        distinct.push("and more");
    }

    distinct.join(", ")
}
