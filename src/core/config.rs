use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub udp: UdpConfig,
    pub http: HttpConfig,
    pub tracker: TrackerConfig,
    pub peers: PeersConfig,
    pub connections: ConnectionsConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UdpConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_num_threads")]
    pub workers: usize,
    /// Turning this off accepts announce/scrape with any connection id and
    /// removes the protection against spoofed source addresses.
    #[serde(default = "default_enabled")]
    pub validate_connection_id: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_announce_interval")]
    pub announce_interval: i32,
    #[serde(default = "default_announce_fuzz")]
    pub announce_fuzz: i32,
    #[serde(default = "default_numwant")]
    pub default_numwant: usize,
    #[serde(default = "default_max_numwant")]
    pub max_numwant: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeersConfig {
    #[serde(default = "default_peer_ttl")]
    pub ttl: i64,
    #[serde(default = "default_trim_interval")]
    pub trim_interval: u64,
    #[serde(default = "default_list_pool_capacity")]
    pub list_pool_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionsConfig {
    #[serde(default = "default_connection_max_age")]
    pub max_age: i64,
    #[serde(default = "default_gc_interval")]
    pub gc_interval: u64,
    pub persist_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_kind")]
    pub kind: BackupKind,
    pub path: Option<PathBuf>,
    #[serde(default = "default_backup_interval")]
    pub interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

// Default value functions
fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_enabled() -> bool {
    true
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 1337))
}

fn default_announce_interval() -> i32 {
    1800 // 30 minutes
}

fn default_announce_fuzz() -> i32 {
    120
}

fn default_numwant() -> usize {
    50
}

fn default_max_numwant() -> usize {
    100
}

fn default_peer_ttl() -> i64 {
    3600 // 1 hour
}

fn default_trim_interval() -> u64 {
    300 // 5 minutes
}

fn default_list_pool_capacity() -> usize {
    256
}

fn default_connection_max_age() -> i64 {
    120 // 2 minutes
}

fn default_gc_interval() -> u64 {
    60
}

fn default_backup_kind() -> BackupKind {
    BackupKind::Memory
}

fn default_backup_interval() -> u64 {
    600 // 10 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind: default_bind(),
            workers: default_num_threads(),
            validate_connection_id: default_enabled(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind: default_bind(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            announce_interval: default_announce_interval(),
            announce_fuzz: default_announce_fuzz(),
            default_numwant: default_numwant(),
            max_numwant: default_max_numwant(),
        }
    }
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            ttl: default_peer_ttl(),
            trim_interval: default_trim_interval(),
            list_pool_capacity: default_list_pool_capacity(),
        }
    }
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            max_age: default_connection_max_age(),
            gc_interval: default_gc_interval(),
            persist_path: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            kind: default_backup_kind(),
            path: None,
            interval: default_backup_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl TrackerConfig {
    /// Resolve a client's numwant: absent or negative means the default, and
    /// anything above the ceiling is capped.
    pub fn clamp_numwant(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(n) if n >= 0 => (n as u64).min(self.max_numwant as u64) as usize,
            _ => self.default_numwant,
        }
    }

    /// Announce interval plus uniform jitter in `[0, announce_fuzz)`.
    pub fn jittered_interval(&self) -> i32 {
        if self.announce_fuzz > 0 {
            self.announce_interval + rand::rng().random_range(0..self.announce_fuzz)
        } else {
            self.announce_interval
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if !self.udp.enabled && !self.http.enabled {
            bail!("At least one of udp or http must be enabled");
        }

        if self.udp.enabled && self.udp.workers == 0 {
            bail!("udp.workers must be greater than 0");
        }

        // Validate tracker config
        if self.tracker.announce_interval <= 0 {
            bail!("announce_interval must be greater than 0");
        }

        if self.tracker.announce_fuzz < 0 {
            bail!("announce_fuzz must be non-negative");
        }

        if self.tracker.max_numwant == 0 {
            bail!("max_numwant must be greater than 0");
        }

        if self.tracker.default_numwant > self.tracker.max_numwant {
            bail!(
                "default_numwant ({}) must not exceed max_numwant ({})",
                self.tracker.default_numwant,
                self.tracker.max_numwant
            );
        }

        // Validate peers config
        if self.peers.trim_interval == 0 {
            bail!("peers.trim_interval must be greater than 0");
        }

        if self.peers.ttl <= self.peers.trim_interval as i64 {
            bail!(
                "peers.ttl ({}) must be greater than peers.trim_interval ({})",
                self.peers.ttl,
                self.peers.trim_interval
            );
        }

        // Validate connections config
        if self.connections.max_age <= 0 {
            bail!("connections.max_age must be greater than 0");
        }

        if self.connections.gc_interval == 0 {
            bail!("connections.gc_interval must be greater than 0");
        }

        // Validate backup config
        if self.backup.interval == 0 {
            bail!("backup.interval must be greater than 0");
        }

        if self.backup.kind == BackupKind::File && self.backup.path.is_none() {
            bail!("backup.path is required when backup.kind is \"file\"");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}
