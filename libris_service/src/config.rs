use std::{env, net::IpAddr, path::Path, sync::OnceLock};

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use libris_broadcast::BroadcastConfig;
use libris_loader::DispatchMode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub distribution: DistributionConfig,
    pub node: NodeConfig,
    pub tracing: TracingConfig,
    /// Subscription buffering for catalog events.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum TracingConfig {
    /// Installs nothing.
    Memory,
    /// Pretty log lines and spans on standard output.
    Stdout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// When set and `worker_number` is not, the worker number is derived
    /// from the address.
    pub host_ip: Option<IpAddr>,
    pub worker_number: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchConfig {
    #[default]
    Auto,
    Manual,
}

impl From<DispatchConfig> for DispatchMode {
    fn from(value: DispatchConfig) -> Self {
        match value {
            DispatchConfig::Auto => Self::Auto,
            DispatchConfig::Manual => Self::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IngestConfig {
    /// Capacity of each channel between a transport and its session.
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

const CONFIG_PATH_ENV: &str = "LIBRIS_CONFIG_PATH";
const DEFAULT_CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "LIBRIS";
const VERSION: &str = env!("CARGO_PKG_VERSION");

const DISTRIBUTION_VERSION_KEY: &str = "distribution.version";
const NODE_HOST_IP_KEY: &str = "node.host_ip";
const NODE_WORKER_NUMBER_KEY: &str = "node.worker_number";

impl AppConfig {
    /// Gets the process-wide configuration, loading it on first use.
    ///
    /// # Panics
    ///
    /// Will panic if the configuration cannot be loaded.
    pub fn get() -> &'static Self {
        static INSTANCE: OnceLock<AppConfig> = OnceLock::new();
        INSTANCE.get_or_init(|| match Self::load() {
            Ok(config) => config,
            Err(err) => panic!("failed to load configuration: {err}"),
        })
    }

    /// Loads configuration from the directory named by `LIBRIS_CONFIG_PATH`,
    /// `config` by default.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> AppResult<Self> {
        let config_dir =
            env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::load_from(Path::new(&config_dir))
    }

    /// Loads configuration from `config_dir` and environment variables.
    ///
    /// Sources, later ones winning: `default`, `local` (optional), then
    /// `LIBRIS__*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(config_dir: &Path) -> AppResult<Self> {
        let default_path = config_dir.join("default");
        // Local overrides, not checked in.
        let local_path = config_dir.join("local");

        let config = Self::builder()?
            .add_source(File::with_name(&default_path.to_string_lossy()))
            .add_source(File::with_name(&local_path.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Self::finish(config)
    }

    /// Loads configuration from an inline TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed.
    pub fn from_toml(source: &str) -> AppResult<Self> {
        let config = Self::builder()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn builder() -> AppResult<ConfigBuilder<DefaultState>> {
        Ok(Config::builder().set_default(DISTRIBUTION_VERSION_KEY, VERSION)?)
    }

    /// Fills derived properties and deserializes.
    fn finish(config: Config) -> AppResult<Self> {
        let mut builder = Config::builder();
        if let Ok(host_ip) = config.get::<IpAddr>(NODE_HOST_IP_KEY) {
            builder = builder.set_default(NODE_WORKER_NUMBER_KEY, worker_number(host_ip)?)?;
        }
        Ok(builder.add_source(config).build()?.try_deserialize()?)
    }
}

/// Worker number from the last two octets of an IPv4 address.
fn worker_number(ip: IpAddr) -> AppResult<u16> {
    match ip {
        IpAddr::V4(ip) => {
            let octets = ip.octets();
            Ok((u16::from(octets[2]) << 8u16) | u16::from(octets[3]))
        }
        IpAddr::V6(_) => Err(AppError::InvalidArgument {
            field: NODE_HOST_IP_KEY,
            reason: "IPv6 host addresses cannot derive a worker number".into(),
        }),
    }
}
