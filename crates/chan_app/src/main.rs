//! `chan_observer`: watches the configured boards and logs every change.
//!
//! Usage: `chan_observer [config.ron]`

mod config;
mod events;

use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use anyhow::Context;
use chan_engine::{
    ensure_output_dir, BoardObserver, ChannelEventSink, EventBus, EventSink, Fetcher,
    ObserverHandle, ReqwestFetcher, SnapshotStore, ThreadStore,
};
use engine_logging::{engine_error, engine_info};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    ensure_output_dir(&config.output_dir)
        .with_context(|| format!("preparing output directory {:?}", config.output_dir))?;
    engine_logging::initialize(config.log_destination(), config.logging.level()?);
    engine_info!(
        "chan_observer starting with {} boards, output in {:?}",
        config.targets.len(),
        config.output_dir
    );

    let store = Arc::new(SnapshotStore::open(&config.output_dir)?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        ReqwestFetcher::new(config.fetch_settings(), config.endpoints.clone())
            .context("building HTTP client")?,
    );

    let (event_tx, event_rx) = mpsc::channel();
    let event_log = events::spawn_event_log(event_rx);
    let mut bus = EventBus::new();
    bus.subscribe(ChannelEventSink::new(event_tx));
    let sink: Arc<dyn EventSink> = Arc::new(bus);

    let shutdown = CancellationToken::new();
    let handles: Vec<ObserverHandle> = config
        .observer_configs()
        .into_iter()
        .map(|observer_config| {
            let store: Arc<dyn ThreadStore> = store.clone();
            let observer =
                BoardObserver::new(observer_config, fetcher.clone(), store, sink.clone())
                    .with_cancellation(shutdown.clone());
            ObserverHandle::spawn(observer)
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    engine_info!("Shutdown requested, stopping {} observers", handles.len());
    shutdown.cancel();

    for handle in handles {
        let target = handle.target().clone();
        match handle.join().await {
            Ok(state) => engine_info!(
                "{}: stopped with {} tracked threads",
                target,
                state.tracked_count()
            ),
            Err(err) => engine_error!("{}: observer task failed: {}", target, err),
        }
    }
    if let Err(err) = store.flush().await {
        engine_error!("Final snapshot flush failed: {}", err);
    }

    drop(sink);
    match event_log.join() {
        Ok(seen) => engine_info!("chan_observer stopped after {} events", seen),
        Err(_) => engine_error!("Event log thread panicked"),
    }
    Ok(())
}
