//! Service entry point: ledger, object store, edit channel, response
//! consumer and cleanup schedule.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use photoshare::config::AppSettings;
use photoshare::domain::{CleanupSweeper, EditOrchestrator, EditResponseConsumer};
use photoshare::outbound::object_store::S3ObjectStore;
use photoshare::outbound::persistence::{
    DbPool, DieselGroupLedger, DieselPhotoLedger, PoolConfig, run_migrations,
};
use photoshare::outbound::queue::{NatsChannelConfig, NatsEditChannel};

const CONSUMER_RESTART_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;

    let database_url = settings.database_url()?;
    let applied = run_migrations(database_url)
        .await
        .wrap_err("running migrations")?;
    info!(applied, "ledger schema up to date");

    let pool = DbPool::new(
        PoolConfig::new(database_url).with_max_size(settings.db_max_connections()),
    )
    .await
    .wrap_err("building connection pool")?;
    let groups = Arc::new(DieselGroupLedger::new(pool.clone()));
    let photos = Arc::new(DieselPhotoLedger::new(pool));
    let objects = Arc::new(S3ObjectStore::from_env(settings.s3_bucket()?).await);
    let channel = NatsEditChannel::connect(
        settings.nats_url()?,
        NatsChannelConfig {
            request_subject: settings.edit_request_subject().to_owned(),
            response_subject: settings.edit_response_subject().to_owned(),
            stream_name: settings.edit_stream_name().to_owned(),
            consumer_name: settings.edit_consumer_name().to_owned(),
        },
    )
    .await
    .wrap_err("connecting to the edit channel")?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let orchestrator = Arc::new(EditOrchestrator::new(
        groups.clone(),
        photos.clone(),
        Arc::new(channel.clone()),
        objects.clone(),
        clock.clone(),
        settings.orchestrator_config(),
    ));
    let sweeper = CleanupSweeper::new(groups, photos, objects, clock, settings.sweeper_config());

    let sweeper_task = tokio::spawn(sweeper.run());
    let consumer_task = tokio::spawn(consume_responses(
        channel,
        orchestrator,
        settings.response_buffer(),
    ));
    info!("photoshare workers started");

    tokio::signal::ctrl_c()
        .await
        .wrap_err("waiting for shutdown signal")?;
    info!("shutdown requested");
    consumer_task.abort();
    sweeper_task.abort();
    Ok(())
}

/// Keep a response consumer running, reopening the subscription after
/// broker failures.
async fn consume_responses(
    channel: NatsEditChannel,
    orchestrator: Arc<EditOrchestrator>,
    buffer: usize,
) {
    loop {
        match channel.response_source().await {
            Ok(source) => {
                let consumer = EditResponseConsumer::new(orchestrator.clone(), buffer);
                match consumer.run(source).await {
                    Ok(report) => warn!(
                        acked = report.acked,
                        dropped = report.dropped,
                        requeued = report.requeued,
                        "edit response stream ended"
                    ),
                    Err(err) => error!(error = %err, "edit response consumer failed"),
                }
            }
            Err(err) => error!(error = %err, "could not open edit response consumer"),
        }
        tokio::time::sleep(CONSUMER_RESTART_DELAY).await;
    }
}
