use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default route the download endpoint is installed under.
pub const DEFAULT_ROUTE_PATH: &str = "/internal/download_model";

/// Default transfer chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default delay between registration attempts while the host is not ready.
pub const DEFAULT_REGISTRATION_RETRY_MS: u64 = 500;

/// Categories seeded into a freshly created config file.
const SEEDED_CATEGORIES: [&str; 3] = ["checkpoints", "loras", "vae"];

/// Global configuration loaded from `~/.config/mfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfetchConfig {
    /// Address the host HTTP listener binds to (`mfetch serve`).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Route the streaming download endpoint is installed under.
    #[serde(default = "default_route_path")]
    pub route_path: String,
    /// Bytes handed to disk and reported per progress event.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    /// Milliseconds between attempts to install the endpoint into the host.
    #[serde(default = "default_registration_retry_ms")]
    pub registration_retry_ms: u64,
    /// TCP/TLS connect timeout for both download paths.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Blocking path only: abort when no bytes arrive for this many seconds.
    /// The streaming path never applies a deadline to the body.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: Option<u64>,
    /// Directory key -> ordered list of sanctioned roots.
    #[serde(default)]
    pub roots: BTreeMap<String, Vec<PathBuf>>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8188".to_string()
}

fn default_route_path() -> String {
    DEFAULT_ROUTE_PATH.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_registration_retry_ms() -> u64 {
    DEFAULT_REGISTRATION_RETRY_MS
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_stall_timeout_secs() -> Option<u64> {
    Some(60)
}

impl Default for MfetchConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            route_path: default_route_path(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            registration_retry_ms: DEFAULT_REGISTRATION_RETRY_MS,
            connect_timeout_secs: default_connect_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
            roots: BTreeMap::new(),
        }
    }
}

impl MfetchConfig {
    pub fn registration_retry(&self) -> Duration {
        Duration::from_millis(self.registration_retry_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }

    /// Rejects values the host cannot use. The route path must be absolute,
    /// otherwise installing it into the router would fail at runtime.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.route_path.starts_with('/'),
            "route_path must start with '/', got {:?}",
            self.route_path
        );
        Ok(())
    }

    /// Chunk size clamped to at least one byte.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size_bytes.max(1)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Roots written into a new config: `checkpoints`, `loras`, `vae` under the
/// XDG data home.
fn seeded_roots() -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mfetch")?;
    let models = xdg_dirs.get_data_home().join("models");
    Ok(SEEDED_CATEGORIES
        .iter()
        .map(|c| (c.to_string(), vec![models.join(c)]))
        .collect())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MfetchConfig {
            roots: seeded_roots()?,
            ..MfetchConfig::default()
        };
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MfetchConfig = toml::from_str(&data)?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
