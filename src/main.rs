//! Application entry point for spotwatch.
//!
//! Initializes all components and starts the subscription check loop.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dotenv::dotenv;
use log::debug;
use log::info;

use spotwatch::auth::OAuthTokenProvider;
use spotwatch::clock::Clock;
use spotwatch::clock::SystemClock;
use spotwatch::config::Config;
use spotwatch::logging::setup_logging;
use spotwatch::notifier::HttpApiMailer;
use spotwatch::notifier::Notifier;
use spotwatch::remote::PlaylistApi;
use spotwatch::remote::SpotifyClient;
use spotwatch::repository::SqliteStore;
use spotwatch::repository::Store;
use spotwatch::service::SyncService;
use spotwatch::task::SyncScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let config = load_config()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = setup_store(&config, clock.clone(), init_start).await?;
    let api: Arc<dyn PlaylistApi> = Arc::new(SpotifyClient::new(config.api_url.clone()));
    let tokens = Arc::new(OAuthTokenProvider::new(
        config.token_url.clone(),
        config.oauth_client_id.clone(),
        config.oauth_client_secret.clone(),
        store.clone(),
        clock.clone(),
    ));
    let notifier = Arc::new(Notifier::new(
        Arc::new(HttpApiMailer::new(
            config.mail_endpoint.clone(),
            config.mail_api_key.clone(),
        )),
        api.clone(),
        config.app_base_url.clone(),
        config.from_email.clone(),
    ));

    let service = Arc::new(SyncService::new(
        store,
        api,
        tokens,
        notifier,
        clock,
        chrono::Duration::from_std(config.poll_interval)?,
        config.due_batch_size,
    ));

    let scheduler = SyncScheduler::new(service, config.poll_interval);
    scheduler.clone().start()?;

    run(init_start).await?;
    scheduler.stop().await?;

    Ok(())
}

fn load_config() -> Result<Arc<Config>> {
    let config = Arc::new(Config::load()?);
    setup_logging(&config)?;
    info!("Starting spotwatch...");
    Ok(config)
}

async fn setup_store(
    config: &Config,
    clock: Arc<dyn Clock>,
    init_start: Instant,
) -> Result<Arc<dyn Store>> {
    debug!("Setting up store...");
    let store = SqliteStore::new(&config.db_url, &config.db_path, clock).await?;

    info!("Creating database tables...");
    store.create_tables().await?;
    info!(
        "Store setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(Arc::new(store))
}

async fn run(init_start: Instant) -> Result<()> {
    info!(
        "spotwatch is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down.");

    Ok(())
}
