//! Verifier configuration
//!
//! Layers, lowest to highest precedence: properties file, `FIXVERIFY_*`
//! environment variables, explicit overrides (CLI flags).

use crate::error::{ConfigError, Result};
use crate::properties::PropertiesFile;
use crate::secret::{PlainSecret, Secret, SecretDecoder};
use config_crate::{Config, Environment};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "FIXVERIFY";
pub const DEFAULT_STREAM: &str = "OMS";

/// Behaviour when a subscriber queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LagPolicy {
    /// Drop the frame for that subscriber and count it
    #[default]
    Drop,
    /// Close the subscriber
    Disconnect,
}

impl FromStr for LagPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!("expected `drop` or `disconnect`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Every original message normalized and held in memory
    #[default]
    Memory,
    /// Key to byte range over a memory-mapped log
    Offset,
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "offset" => Ok(Self::Offset),
            other => Err(format!("expected `memory` or `offset`, got `{other}`")),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Offset => "offset",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSettings {
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusConfig {
    /// `addr:port`; absent means no bus (file replay only)
    pub host: Option<String>,
    pub vpn_name: String,
    pub username: String,
    pub password: Secret,
    pub reconnect: ReconnectSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub name: String,
    pub topic: Option<String>,
    pub original_log: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub subscriber_queue_size: usize,
    pub publisher_queue_size: usize,
    pub publish_timeout: Duration,
    pub lag_policy: LagPolicy,
    pub emit_matches: bool,
    pub snapshot_on_connect: bool,
    pub max_subscribers: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_size: 256,
            publisher_queue_size: 1024,
            publish_timeout: Duration::from_millis(100),
            lag_policy: LagPolicy::Drop,
            emit_matches: true,
            snapshot_on_connect: true,
            max_subscribers: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub workers: usize,
    pub work_queue_size: usize,
    pub shutdown_drain_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            work_queue_size: 1024,
            shutdown_drain_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8888,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub bus: BusConfig,
    pub streams: Vec<StreamConfig>,
    pub correlation_tag: String,
    pub ignored_tags: Vec<String>,
    pub index_mode: IndexMode,
    pub publisher: PublisherConfig,
    pub coordinator: CoordinatorConfig,
    pub server: ServerConfig,
}

impl VerifierConfig {
    /// Properties file plus environment
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_overrides(path, &[], &PlainSecret)
    }

    /// Properties file, environment, then `overrides` (key, value) on top
    pub fn load_with_overrides(
        path: &Path,
        overrides: &[(&str, String)],
        decoder: &dyn SecretDecoder,
    ) -> Result<Self> {
        info!("Loading verifier config: {}", path.display());
        let mut builder = Config::builder()
            .add_source(PropertiesFile::load(path)?)
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_"));

        for (key, value) in overrides {
            debug!(key, "config override");
            builder = builder.set_override(key.to_lowercase(), value.as_str())?;
        }

        Self::from_layers(&builder.build()?, decoder)
    }

    /// Properties text only; no environment layer
    pub fn from_properties(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(PropertiesFile::parse(text, "inline"))
            .build()?;
        Self::from_layers(&config, &PlainSecret)
    }

    fn from_layers(config: &Config, decoder: &dyn SecretDecoder) -> Result<Self> {
        let layers = Layers(config);

        let password = match layers.string("password")? {
            Some(stored) => decoder.decode(&stored)?,
            None => Secret::default(),
        };

        let reconnect_defaults = ReconnectSettings::default();
        let bus = BusConfig {
            host: layers.string("host")?.filter(|h| !h.is_empty()),
            vpn_name: layers.string("vpnName")?.unwrap_or_default(),
            username: layers.string("username")?.unwrap_or_default(),
            password,
            reconnect: ReconnectSettings {
                retries: layers.parse("reconnectRetries", reconnect_defaults.retries)?,
                initial_delay: layers.millis("reconnectInitialDelayMs", reconnect_defaults.initial_delay)?,
                max_delay: layers.millis("reconnectMaxDelayMs", reconnect_defaults.max_delay)?,
            },
        };

        let shared_log = layers.string("originalLogPath")?;
        let names = match layers.string("streams")? {
            Some(list) => split_list(&list),
            None => vec![DEFAULT_STREAM.to_string()],
        };
        let mut streams = Vec::with_capacity(names.len());
        for name in names {
            if streams.iter().any(|s: &StreamConfig| s.name.eq_ignore_ascii_case(&name)) {
                return Err(ConfigError::invalid("streams", &name, "duplicate stream name"));
            }
            let lower = name.to_lowercase();
            let log_key = format!("originalLogPath_{lower}");
            let original_log = layers
                .string(&log_key)?
                .or_else(|| shared_log.clone())
                .filter(|p| !p.is_empty())
                .ok_or(ConfigError::Missing(log_key))?;
            streams.push(StreamConfig {
                topic: layers.string(&format!("topic_{lower}"))?.filter(|t| !t.is_empty()),
                original_log: PathBuf::from(original_log),
                name,
            });
        }
        if streams.is_empty() {
            return Err(ConfigError::invalid("streams", "", "at least one stream is required"));
        }

        let correlation_tag = layers.string("correlationTag")?.unwrap_or_else(|| "55".to_string());
        if correlation_tag.is_empty() {
            return Err(ConfigError::invalid("correlationTag", "", "must not be empty"));
        }
        let ignored_tags = match layers.string("ignoredTags")? {
            Some(list) => split_list(&list),
            None => vec!["9".to_string(), "10".to_string(), "52".to_string()],
        };

        let pub_defaults = PublisherConfig::default();
        let publisher = PublisherConfig {
            subscriber_queue_size: layers.positive("subscriberQueueSize", pub_defaults.subscriber_queue_size)?,
            publisher_queue_size: layers.positive("publisherQueueSize", pub_defaults.publisher_queue_size)?,
            publish_timeout: layers.millis("publishTimeoutMs", pub_defaults.publish_timeout)?,
            lag_policy: layers.parse("lagPolicy", pub_defaults.lag_policy)?,
            emit_matches: layers.parse("emitMatches", pub_defaults.emit_matches)?,
            snapshot_on_connect: layers.parse("snapshotOnConnect", pub_defaults.snapshot_on_connect)?,
            max_subscribers: layers.positive("maxSubscribers", pub_defaults.max_subscribers)?,
        };

        let coord_defaults = CoordinatorConfig::default();
        let coordinator = CoordinatorConfig {
            workers: layers.positive("coordinatorWorkers", coord_defaults.workers)?,
            work_queue_size: layers.positive("workQueueSize", coord_defaults.work_queue_size)?,
            shutdown_drain_timeout: layers.millis("shutdownDrainTimeoutMs", coord_defaults.shutdown_drain_timeout)?,
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            bind_address: layers.parse("serverBindAddress", server_defaults.bind_address)?,
            port: layers.parse("serverPort", server_defaults.port)?,
        };

        let config = Self {
            bus,
            streams,
            correlation_tag,
            ignored_tags,
            index_mode: layers.parse("indexMode", IndexMode::default())?,
            publisher,
            coordinator,
            server,
        };
        debug!(?config, "verifier config resolved");
        Ok(config)
    }

    /// Fails when a bus-fed stream has no topic or no host is configured
    pub fn require_bus(&self) -> Result<()> {
        if self.bus.host.is_none() {
            return Err(ConfigError::Missing("host".to_string()));
        }
        match self.streams.iter().find(|s| s.topic.is_none()) {
            Some(stream) => Err(ConfigError::Missing(format!(
                "topic_{}",
                stream.name.to_lowercase()
            ))),
            None => Ok(()),
        }
    }
}

/// Read access over the merged layers; keys are looked up case-insensitively.
struct Layers<'a>(&'a Config);

impl Layers<'_> {
    fn string(&self, key: &str) -> Result<Option<String>> {
        match self.0.get_string(&key.to_lowercase()) {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(config_crate::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(key)? {
            Some(raw) if !raw.is_empty() => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
            _ => Ok(default),
        }
    }

    fn positive(&self, key: &str, default: usize) -> Result<usize> {
        let value = self.parse(key, default)?;
        if value == 0 {
            return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
        }
        Ok(value)
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration> {
        let ms = self.parse(key, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
