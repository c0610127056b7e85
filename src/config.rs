//! Process-wide configuration. Loaded from a YAML file named on the command
//! line, then held in an atomically-swappable snapshot so that readers never
//! observe a torn config and reload never blocks a reader.
//!
//! Reload is driven by two independent triggers: a background task that polls
//! the config file's content hash, and a SIGHUP handler. Both end up calling
//! [`reload_from_path`], which swaps the snapshot and broadcasts
//! [`ConfigReloaded`] to anyone holding a receiver from [`subscribe`]. A
//! receiver that's lagging or has been dropped is handled for free by
//! `tokio::sync::broadcast` semantics: lagging listeners skip ahead rather
//! than block the swap, and dropped receivers are simply not delivered to.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::Parser;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{GortError, Result};

/// `global.*`
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Global {
    /// default per-command timeout, in seconds, bounding worker start+run
    pub command_timeout: u64,
    /// how many requests the dispatch engine runs concurrently; defaults to
    /// the host's core count, the same default the teacher uses for its own
    /// compute-bound worker pool.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
}

fn default_worker_concurrency() -> usize {
    num_cpus::get()
}

impl Default for Global {
    fn default() -> Self {
        Self {
            command_timeout: 60,
            worker_concurrency: default_worker_concurrency(),
        }
    }
}

/// `gort.*`
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GortSettings {
    pub allow_self_registration: bool,
    pub api_address: SocketAddr,
    pub api_url_base: String,
    pub development_mode: bool,
    pub enable_spoken_commands: bool,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
}

impl Default for GortSettings {
    fn default() -> Self {
        Self {
            allow_self_registration: false,
            api_address: ([0, 0, 0, 0], 4000).into(),
            api_url_base: "http://localhost:4000".to_owned(),
            development_mode: false,
            enable_spoken_commands: false,
            tls_cert_file: None,
            tls_key_file: None,
        }
    }
}

/// `database.*`
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Database {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub ssl_enabled: bool,
    pub connection_max_idle_time: u64,
    pub connection_max_life_time: u64,
    pub max_idle_connections: u32,
    pub max_open_connections: u32,
    pub query_timeout: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "gort".to_owned(),
            password: "gort".to_owned(),
            ssl_enabled: false,
            connection_max_idle_time: 300,
            connection_max_life_time: 3600,
            max_idle_connections: 2,
            max_open_connections: 10,
            query_timeout: 10,
        }
    }
}

impl Database {
    /// Build a sea-orm connection string, honoring the `GORT_DB_PASSWORD` override.
    pub fn connection_string(&self) -> String {
        let password = std::env::var("GORT_DB_PASSWORD").unwrap_or_else(|_| self.password.clone());
        let sslmode = if self.ssl_enabled { "require" } else { "disable" };
        format!(
            "postgres://{}:{}@{}:{}/gort?sslmode={}",
            self.user, password, self.host, self.port, sslmode
        )
    }
}

/// `docker.*`
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct DockerSettings {
    pub host: Option<String>,
    pub network: Option<String>,
}

/// `kubernetes.*`
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct KubernetesSettings {
    pub endpoint_label_selector: Option<String>,
    pub endpoint_field_selector: Option<String>,
    pub pod_label_selector: Option<String>,
    pub pod_field_selector: Option<String>,
}

/// One configured Slack team/workspace adapter.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SlackProvider {
    pub name: String,
    pub api_token: String,
}

/// One configured Discord guild adapter.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct DiscordProvider {
    pub name: String,
    pub api_token: String,
}

/// `jaeger.*` — kept for schema fidelity; the exporter itself is a port, not
/// implemented here.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Jaeger {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// `logging.*` — ambient config required by every component.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Logging {
    pub level: String,
    pub metrics_hook: SocketAddr,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            metrics_hook: ([0, 0, 0, 0], 9999).into(),
        }
    }
}

/// Full configuration-file contents.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Config {
    pub global: Global,
    pub gort: GortSettings,
    pub database: Database,
    pub docker: DockerSettings,
    pub kubernetes: KubernetesSettings,
    #[serde(default)]
    pub slack: Vec<SlackProvider>,
    #[serde(default)]
    pub discord: Vec<DiscordProvider>,
    #[serde(default)]
    pub jaeger: Jaeger,
    #[serde(default)]
    pub logging: Logging,
}

/// CLI arguments for the daemon.
#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
pub struct Args {
    /// path to config.yml
    #[clap(short, long)]
    pub config: PathBuf,
}

/// Broadcast to reload listeners after a successful atomic swap.
#[derive(Clone, Debug)]
pub struct ConfigReloaded;

lazy_static! {
    static ref STATE: ArcSwap<Config> = ArcSwap::from_pointee(Config::default());
    static ref RELOAD_TX: broadcast::Sender<ConfigReloaded> = broadcast::channel(16).0;
    static ref LAST_HASH: ArcSwap<u64> = ArcSwap::from_pointee(0);
}

/// Load the current config snapshot. Cheap: an `Arc` clone of the swapped pointer.
pub fn current() -> Arc<Config> {
    STATE.load_full()
}

/// Install a config, e.g. at startup before anything reads [`current`].
pub fn init(config: Config) {
    STATE.store(Arc::new(config));
}

/// Subscribe to reload notifications. Lagging or dropped receivers are
/// handled by `broadcast` itself; callers don't need to guard against either.
pub fn subscribe() -> broadcast::Receiver<ConfigReloaded> {
    RELOAD_TX.subscribe()
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Load a config file from disk, swap it in on success, and notify listeners.
/// On failure the previous snapshot is retained.
pub async fn reload_from_path(path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| GortError::ConfigFileNotFound(path.display().to_string()))?;
    let parsed: Config = serde_yaml::from_slice(&bytes)
        .map_err(|e| GortError::ConfigUnloadable(e.to_string()))?;
    LAST_HASH.store(Arc::new(hash_bytes(&bytes)));
    STATE.store(Arc::new(parsed));
    let _ = RELOAD_TX.send(ConfigReloaded);
    Ok(())
}

/// Spawn the background poll task: checks the file's content hash on an
/// interval and reloads on change.
pub fn spawn_reload_watcher(path: PathBuf, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(err) => {
                    log::warn!("config hash poll: failed to read {}: {}", path.display(), err);
                    continue;
                }
            };
            let hash = hash_bytes(&bytes);
            if hash != **LAST_HASH.load() {
                log::info!("config file changed, reloading");
                if let Err(err) = reload_from_path(&path).await {
                    log::error!("config reload failed, keeping previous config: {}", err);
                }
            }
        }
    })
}

/// Spawn the SIGHUP-triggered reload listener.
#[cfg(unix)]
pub fn spawn_signal_watcher(path: PathBuf) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};
    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(err) => {
                log::error!("failed to install SIGHUP handler: {}", err);
                return;
            }
        };
        loop {
            hangup.recv().await;
            log::info!("received SIGHUP, reloading config");
            if let Err(err) = reload_from_path(&path).await {
                log::error!("config reload failed, keeping previous config: {}", err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrips_through_yaml() {
        let cfg = Config::default();
        let text = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.global.command_timeout, cfg.global.command_timeout);
    }

    #[tokio::test]
    async fn reload_preserves_previous_on_failure() {
        init(Config::default());
        let dir = std::env::temp_dir().join(format!("gort-cfg-test-{}", std::process::id()));
        tokio::fs::write(&dir, b"not: valid: yaml: [").await.unwrap();
        let before = current();
        let result = reload_from_path(&dir).await;
        assert!(result.is_err());
        let after = current();
        assert_eq!(before.global.command_timeout, after.global.command_timeout);
        let _ = tokio::fs::remove_file(&dir).await;
    }
}
