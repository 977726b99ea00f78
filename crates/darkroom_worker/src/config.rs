//! Worker configuration.
//!
//! Precedence, lowest first: bundled defaults, `./darkroom.toml` (or the file
//! given explicitly), then `DARKROOM_<SECTION>__<KEY>` environment variables.

use config::{Config, Environment, File, FileFormat};
use darkroom_core::EncodePolicy;
use darkroom_error::{ConfigError, DarkroomError, DarkroomResult};
use darkroom_queue::{RedisStreamsConfig, SupervisorConfig, SupervisorConfigBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../darkroom.toml");

/// What happens to a message whose original cannot be downloaded or decoded.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and acknowledge
    #[default]
    #[display("drop")]
    Drop,
    /// Copy the payload to the dead-letter queue, then acknowledge
    #[display("dead_letter")]
    DeadLetter,
}

/// Content store backend selection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Sharded directory tree with JSON sidecars
    #[default]
    #[display("filesystem")]
    Filesystem,
    /// Process memory; lost on exit
    #[display("memory")]
    Memory,
    /// PostgreSQL `bytea` + `jsonb`
    #[display("postgres")]
    Postgres,
}

/// Full worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Broker connection and consumption
    #[serde(default)]
    pub broker: BrokerSettings,
    /// Content store
    #[serde(default)]
    pub storage: StorageSettings,
    /// Rendition output and failure handling
    #[serde(default)]
    pub derivation: DerivationSettings,
}

/// `[broker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Redis URL
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// Work queue name
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Consumer group
    #[serde(default = "default_group")]
    pub group: String,
    /// Consumer name; defaults to one derived from the process id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    /// Fixed wait between connection attempts
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Interval between liveness probes
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// How long a liveness probe may take
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// How long one read waits for new messages
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            queue: default_queue(),
            group: default_group(),
            consumer: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            block_ms: default_block_ms(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Which backend to use
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Connection string for the postgres backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Connection pool size for the postgres backend
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            database_url: None,
            pool_size: default_pool_size(),
        }
    }
}

/// `[derivation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationSettings {
    /// Where renditions wait between encode and upload
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// JPEG quality, 1-100
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Convert renditions to greyscale
    #[serde(default = "default_greyscale")]
    pub greyscale: bool,
    /// Handling of undownloadable or undecodable originals
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Queue receiving dead-lettered payloads
    #[serde(default = "default_dead_letter_queue")]
    pub dead_letter_queue: String,
}

impl Default for DerivationSettings {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            quality: default_quality(),
            greyscale: default_greyscale(),
            failure_policy: FailurePolicy::default(),
            dead_letter_queue: default_dead_letter_queue(),
        }
    }
}

fn default_broker_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_queue() -> String {
    "images".to_string()
}

fn default_group() -> String {
    "darkroom".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    7
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

fn default_block_ms() -> u64 {
    5000
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}

fn default_pool_size() -> u32 {
    4
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_quality() -> u8 {
    60
}

fn default_greyscale() -> bool {
    true
}

fn default_dead_letter_queue() -> String {
    "images.dead".to_string()
}

fn config_error(context: &str, e: impl std::fmt::Display) -> DarkroomError {
    DarkroomError::from(ConfigError::new(format!("{}: {}", context, e)))
}

impl WorkerConfig {
    /// Load configuration with full precedence.
    ///
    /// With `path`, that file must exist; without it, `./darkroom.toml` is
    /// used when present.
    #[instrument]
    pub fn load(path: Option<&Path>) -> DarkroomResult<Self> {
        debug!("Loading configuration: bundled defaults < file < environment");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("darkroom").required(false)),
        };

        builder
            .add_source(
                Environment::with_prefix("DARKROOM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| config_error("Failed to load configuration", e))?
            .try_deserialize::<Self>()
            .map_err(|e| config_error("Failed to parse configuration", e))?
            .validated()
    }

    /// Parse a TOML document layered over the bundled defaults.
    pub fn from_toml_str(contents: &str) -> DarkroomResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .map_err(|e| config_error("Failed to load configuration", e))?
            .try_deserialize::<Self>()
            .map_err(|e| config_error("Failed to parse configuration", e))?
            .validated()
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> DarkroomResult<String> {
        toml::to_string_pretty(self).map_err(|e| config_error("Failed to render configuration", e))
    }

    fn validated(self) -> DarkroomResult<Self> {
        if !(1..=100).contains(&self.derivation.quality) {
            return Err(ConfigError::new(format!(
                "derivation.quality must be between 1 and 100, got {}",
                self.derivation.quality
            ))
            .into());
        }
        if self.broker.queue.trim().is_empty() {
            return Err(ConfigError::new("broker.queue must not be empty").into());
        }
        // A heartbeat is answered only after the blocking read in flight returns.
        if self.broker.block_ms >= self.broker.heartbeat_timeout_secs.saturating_mul(1000) {
            return Err(ConfigError::new(format!(
                "broker.block_ms ({}) must be shorter than broker.heartbeat_timeout_secs ({}s)",
                self.broker.block_ms, self.broker.heartbeat_timeout_secs
            ))
            .into());
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none()
        {
            return Err(ConfigError::new(
                "storage.database_url is required for the postgres backend",
            )
            .into());
        }
        Ok(self)
    }

    /// Rendition encoding policy.
    pub fn encode_policy(&self) -> EncodePolicy {
        EncodePolicy::new(self.derivation.quality, self.derivation.greyscale)
    }

    /// Redis Streams connection settings.
    pub fn redis_streams(&self) -> RedisStreamsConfig {
        let mut redis = RedisStreamsConfig::new(self.broker.url.clone());
        redis.group = self.broker.group.clone();
        if let Some(consumer) = &self.broker.consumer {
            redis.consumer = consumer.clone();
        }
        redis.block = Duration::from_millis(self.broker.block_ms);
        redis
    }

    /// Supervisor settings, including the dead-letter queue when the
    /// failure policy asks for one.
    pub fn supervisor(&self) -> DarkroomResult<SupervisorConfig> {
        let dead_letter_queue = match self.derivation.failure_policy {
            FailurePolicy::DeadLetter => Some(self.derivation.dead_letter_queue.clone()),
            FailurePolicy::Drop => None,
        };

        SupervisorConfigBuilder::default()
            .queue(self.broker.queue.clone())
            .reconnect_delay(Duration::from_secs(self.broker.reconnect_delay_secs))
            .heartbeat_interval(Duration::from_secs(self.broker.heartbeat_secs))
            .heartbeat_timeout(Duration::from_secs(self.broker.heartbeat_timeout_secs))
            .dead_letter_queue(dead_letter_queue)
            .build()
            .map_err(|e| config_error("Invalid supervisor settings", e))
    }
}
