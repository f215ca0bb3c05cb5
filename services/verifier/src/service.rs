//! Service lifecycle
//!
//! Startup order: original indices, publisher, downstream server, replay
//! sources, then coordinator workers and consumers. Any failure before
//! [`VerifierService::start`] returns is fatal.
//!
//! Shutdown order: stop consumers, let workers drain the work queues (bounded
//! by the drain timeout), close the sources so queued acks reach the bus, let
//! the publisher flush, send `COMPLETE` to every subscriber, stop the server.

use crate::bus::{BridgeSettings, FileReplaySource, LineBridgeBus, ReconnectPolicy, ReplaySource};
use crate::coordinator::{run_consumer, Coordinator};
use crate::counters::StreamCounters;
use crate::error::{BusError, Result};
use crate::index::build_index;
use crate::publisher::{encode, spawn_publisher};
use crate::server;
use crate::sink::spawn_file_sink;
use crate::state::{StreamView, VerifierState};
use crate::subscriber::SubscriberRegistry;
use codec::{Comparator, Tokenizer};
use config::{ConfigError, VerifierConfig};
use futures_util::future::join_all;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};
use types::Frame;

/// Runtime choices that do not come from the properties file
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Replay from this file instead of the bus (single stream only)
    pub replay_file: Option<PathBuf>,
    /// Also write every frame to this file, one JSON object per line
    pub output: Option<PathBuf>,
}

pub struct VerifierService {
    config: VerifierConfig,
    options: ServiceOptions,
}

impl VerifierService {
    pub fn new(config: VerifierConfig, options: ServiceOptions) -> Self {
        Self { config, options }
    }

    pub async fn start(self) -> Result<RunningService> {
        let Self { config, options } = self;
        info!("Starting FIX replay verifier");

        match &options.replay_file {
            Some(_) if config.streams.len() != 1 => {
                return Err(ConfigError::Invalid {
                    key: "streams".to_string(),
                    value: config.streams.len().to_string(),
                    reason: "file replay supports exactly one stream".to_string(),
                }
                .into());
            }
            Some(_) => {}
            None => config.require_bus()?,
        }

        let tokenizer = Tokenizer::new(config.correlation_tag.clone());
        let comparator = Comparator::new(config.ignored_tags.iter().cloned());

        let mut streams = Vec::with_capacity(config.streams.len());
        for stream in &config.streams {
            let mode = config.index_mode;
            let path = stream.original_log.clone();
            let builder_tokenizer = tokenizer.clone();
            info!(stream = %stream.name, mode = %mode, path = %path.display(), "Building original index");
            let index =
                tokio::task::spawn_blocking(move || build_index(mode, &path, &builder_tokenizer))
                    .await??;
            streams.push(StreamView {
                name: Arc::from(stream.name.as_str()),
                index,
                counters: Arc::new(StreamCounters::new()),
            });
        }

        let publisher_config = &config.publisher;
        let registry = Arc::new(SubscriberRegistry::new(
            publisher_config.max_subscribers,
            publisher_config.subscriber_queue_size,
            publisher_config.lag_policy,
        ));
        let (verdict_tx, verdict_rx) = mpsc::channel(publisher_config.publisher_queue_size);
        let publisher = spawn_publisher(registry.clone(), verdict_rx);

        let sink = match &options.output {
            Some(path) => {
                let capacity = publisher_config
                    .subscriber_queue_size
                    .max(publisher_config.publisher_queue_size);
                Some(spawn_file_sink(&registry, path, capacity).await?)
            }
            None => None,
        };

        let state = Arc::new(VerifierState {
            streams,
            registry: registry.clone(),
            snapshot_on_connect: publisher_config.snapshot_on_connect,
        });

        let (server_stop, server_stop_rx) = oneshot::channel::<()>();
        let addr = SocketAddr::new(config.server.bind_address, config.server.port);
        let (local_addr, server) = server::bind(state.clone(), addr, async move {
            let _ = server_stop_rx.await;
        })?;

        let mut sources: Vec<Box<dyn ReplaySource>> = Vec::with_capacity(config.streams.len());
        for stream in &config.streams {
            let source: Box<dyn ReplaySource> = match &options.replay_file {
                Some(path) => Box::new(FileReplaySource::open(path).await?),
                None => {
                    let host = config
                        .bus
                        .host
                        .clone()
                        .ok_or_else(|| ConfigError::Missing("host".to_string()))?;
                    let topic = stream.topic.clone().ok_or_else(|| {
                        ConfigError::Missing(format!("topic_{}", stream.name.to_lowercase()))
                    })?;
                    let settings = BridgeSettings::new(&config.bus, host, topic);
                    let policy = ReconnectPolicy::from(&config.bus.reconnect);
                    Box::new(LineBridgeBus::connect(settings, policy).await?)
                }
            };
            sources.push(source);
        }

        let (shutdown, _) = watch::channel(false);
        let mut consumers = JoinSet::new();
        let mut workers = Vec::new();
        let label_streams = state.streams.len() > 1;

        for (view, source) in state.streams.iter().zip(sources) {
            let mut coordinator = Coordinator::new(
                view.name.clone(),
                view.index.clone(),
                view.counters.clone(),
                tokenizer.clone(),
                comparator.clone(),
                verdict_tx.clone(),
            )
            .with_publish_timeout(publisher_config.publish_timeout)
            .with_emit_matches(publisher_config.emit_matches);
            if label_streams {
                coordinator = coordinator.with_stream_label();
            }

            let (work_tx, work_rx) = mpsc::channel(config.coordinator.work_queue_size);
            workers.extend(Arc::new(coordinator).spawn_workers(config.coordinator.workers, work_rx));
            consumers.spawn(run_consumer(
                view.name.clone(),
                source,
                work_tx,
                shutdown.subscribe(),
            ));
        }
        // Publisher ends once the last coordinator is gone
        drop(verdict_tx);

        info!(
            addr = %local_addr,
            streams = state.streams.len(),
            workers = workers.len(),
            "Verifier running"
        );

        Ok(RunningService {
            local_addr,
            state,
            shutdown,
            consumers,
            sources: Vec::new(),
            workers,
            publisher,
            sink,
            server,
            server_stop,
            drain_timeout: config.coordinator.shutdown_drain_timeout,
        })
    }
}

pub struct RunningService {
    local_addr: SocketAddr,
    state: Arc<VerifierState>,
    shutdown: watch::Sender<bool>,
    consumers: JoinSet<std::result::Result<Box<dyn ReplaySource>, BusError>>,
    /// Sources whose consumer has stopped, kept open until the workers drain
    sources: Vec<Box<dyn ReplaySource>>,
    workers: Vec<JoinHandle<()>>,
    publisher: JoinHandle<()>,
    sink: Option<JoinHandle<Result<u64>>>,
    server: JoinHandle<()>,
    server_stop: oneshot::Sender<()>,
    drain_timeout: Duration,
}

impl RunningService {
    /// Address the downstream server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &Arc<VerifierState> {
        &self.state
    }

    /// Run until `signal` resolves, every source is exhausted, or a source
    /// fails fatally; then shut down. A fatal source error is returned after
    /// shutdown completes.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<()> {
        let outcome = tokio::select! {
            _ = signal => {
                info!("Shutdown signal received");
                Ok(())
            }
            result = wait_for_consumers(&mut self.consumers, &mut self.sources) => {
                if result.is_ok() {
                    info!("All replay sources exhausted");
                }
                result
            }
        };
        if let Err(e) = &outcome {
            error!("Replay source failed: {}", e);
        }

        self.shutdown().await?;
        outcome
    }

    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down verifier");
        let _ = self.shutdown.send(true);
        while let Some(joined) = self.consumers.join_next().await {
            match joined {
                Ok(Ok(source)) => self.sources.push(source),
                Ok(Err(e)) => warn!("Consumer ended with error during shutdown: {}", e),
                Err(e) => warn!("Consumer task failed: {}", e),
            }
        }

        let drained = tokio::time::timeout(
            self.drain_timeout,
            join_all(self.workers.iter_mut()),
        )
        .await;
        if drained.is_err() {
            warn!(
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Work queue not drained in time, aborting workers"
            );
            for worker in &self.workers {
                worker.abort();
            }
        }

        for source in &mut self.sources {
            if tokio::time::timeout(self.drain_timeout, source.close()).await.is_err() {
                warn!(source = %source.describe(), "Acknowledgements not flushed in time");
            }
        }
        self.sources.clear();

        if tokio::time::timeout(self.drain_timeout, &mut self.publisher).await.is_err() {
            warn!("Publisher did not finish in time");
            self.publisher.abort();
        }

        self.state
            .registry
            .close_all(encode(&Frame::Complete)?, self.drain_timeout)
            .await;

        if let Some(sink) = self.sink.take() {
            match sink.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Output file failed: {}", e),
                Err(e) => error!("Output file task failed: {}", e),
            }
        }

        let _ = self.server_stop.send(());
        if tokio::time::timeout(self.drain_timeout, &mut self.server).await.is_err() {
            warn!("Server did not stop in time");
            self.server.abort();
        }

        for stats in self.state.stream_stats() {
            info!(
                stream = %stats.stream,
                processed = stats.processed,
                matches = stats.matches,
                mismatches = stats.mismatches,
                missing = stats.missing,
                skipped_no_key = stats.skipped_no_key,
                processing_errors = stats.processing_errors,
                dropped_verdicts = stats.dropped_verdicts,
                remaining = stats.remaining,
                "Final counters"
            );
        }
        info!("Verifier stopped");
        Ok(())
    }
}

async fn wait_for_consumers(
    consumers: &mut JoinSet<std::result::Result<Box<dyn ReplaySource>, BusError>>,
    finished: &mut Vec<Box<dyn ReplaySource>>,
) -> Result<()> {
    while let Some(joined) = consumers.join_next().await {
        finished.push(joined??);
    }
    Ok(())
}
