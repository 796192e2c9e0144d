use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use chunkrun_sim::SimConfig;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "chunkrun.toml";

/// Top-level server configuration, loaded from `chunkrun.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub log_format: LogFormat,
    pub limits: LimitsConfig,
    pub simulation: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            log_format: LogFormat::Pretty,
            limits: LimitsConfig::default(),
            simulation: SimConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub player_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
    pub max_name_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            player_message_buffer: 256,
            ws_rate_limit_per_sec: 120.0,
            max_name_len: 32,
        }
    }
}

/// Where the configuration came from. Reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            Self::File(path) => {
                tracing::info!(path = %path.display(), "Loaded configuration");
            },
            Self::Missing(path) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
            },
            Self::Invalid { path, error } => {
                tracing::warn!(path = %path.display(), %error, "Failed to parse config, using defaults");
            },
        }
    }
}

impl ServerConfig {
    /// Load `chunkrun.toml` (or the file named by `CHUNKRUN_CONFIG`), then
    /// apply environment overrides.
    pub fn load() -> (Self, ConfigSource) {
        let path = std::env::var("CHUNKRUN_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        let (mut config, source) = Self::load_from(&path);
        config.apply_env(|key| std::env::var(key).ok());
        (config, source)
    }

    /// Read one file. A missing or unparseable file yields the defaults.
    pub fn load_from(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => (cfg, ConfigSource::File(path.to_path_buf())),
                Err(e) => (
                    ServerConfig::default(),
                    ConfigSource::Invalid {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    },
                ),
            },
            Err(_) => (
                ServerConfig::default(),
                ConfigSource::Missing(path.to_path_buf()),
            ),
        }
    }

    /// Apply environment variable overrides. `get` looks a variable up.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = get("CHUNKRUN_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(port) = get("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            self.listen_addr = match self.listen_addr.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                },
                Err(_) => format!("0.0.0.0:{port}"),
            };
        }
        if let Some(root) = get("CHUNKRUN_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(format) = get("CHUNKRUN_LOG_FORMAT")
            && let Some(format) = LogFormat::parse(&format)
        {
            self.log_format = format;
        }
        if let Some(val) = get("CHUNKRUN_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = get("CHUNKRUN_TICK_RATE")
            && let Ok(hz) = val.parse::<f32>()
        {
            self.simulation.tick_rate_hz = hz;
        }
        if let Some(val) = get("CHUNKRUN_WORLD_SEED")
            && let Ok(seed) = val.parse::<u64>()
        {
            self.simulation.world.seed = Some(seed);
        }
    }

    /// First invalid setting, if any.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            ));
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        let rate = self.limits.ws_rate_limit_per_sec;
        if !(rate.is_finite() && rate > 0.0) {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.max_name_len == 0 {
            return Err("limits.max_name_len must be > 0".to_string());
        }
        if let Some(problem) = self.simulation.check() {
            return Err(format!("simulation.{problem}"));
        }
        Ok(())
    }

    /// Exit the process if the configuration is unusable.
    pub fn validate(&self) {
        if let Err(problem) = self.check() {
            tracing::error!(%problem, "Invalid configuration");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.web_root, "public");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.simulation.tick_rate_hz, 60.0);
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn default_limits_config() {
        let cfg = LimitsConfig::default();
        assert_eq!(cfg.max_ws_connections, 200);
        assert_eq!(cfg.player_message_buffer, 256);
        assert!((cfg.ws_rate_limit_per_sec - 120.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_name_len, 32);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
web_root = "/var/www"
log_format = "json"

[limits]
max_ws_connections = 50
ws_rate_limit_per_sec = 30.0

[simulation]
tick_rate_hz = 30.0

[simulation.world]
seed = 99
initial_chunks = 5

[simulation.combat]
coin_value = 25
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.web_root, "/var/www");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.limits.max_ws_connections, 50);
        assert_eq!(cfg.limits.player_message_buffer, 256);
        assert_eq!(cfg.simulation.tick_rate_hz, 30.0);
        assert_eq!(cfg.simulation.world.seed, Some(99));
        assert_eq!(cfg.simulation.world.initial_chunks, 5);
        assert_eq!(cfg.simulation.world.chunk_size, 800.0);
        assert_eq!(cfg.simulation.combat.coin_value, 25);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: ServerConfig = toml::from_str(r#"listen_addr = "0.0.0.0:8080""#).unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 200);
        assert_eq!(cfg.simulation.world.initial_chunks, 20);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("definitely/not/here/chunkrun.toml");
        let (cfg, source) = ServerConfig::load_from(path);
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(source, ConfigSource::Missing(path.to_path_buf()));
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("chunkrun-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "listen_addr = [not toml").unwrap();
        let (cfg, source) = ServerConfig::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.web_root, "public");
        assert!(matches!(source, ConfigSource::Invalid { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = ServerConfig::default();
        cfg.apply_env(env(&[
            ("CHUNKRUN_LISTEN_ADDR", "127.0.0.1:4000"),
            ("CHUNKRUN_WEB_ROOT", "dist"),
            ("CHUNKRUN_LOG_FORMAT", "JSON"),
            ("CHUNKRUN_MAX_WS_CONNECTIONS", "7"),
            ("CHUNKRUN_TICK_RATE", "20"),
            ("CHUNKRUN_WORLD_SEED", "1234"),
        ]));
        assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
        assert_eq!(cfg.web_root, "dist");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.limits.max_ws_connections, 7);
        assert_eq!(cfg.simulation.tick_rate_hz, 20.0);
        assert_eq!(cfg.simulation.world.seed, Some(1234));
    }

    #[test]
    fn port_env_replaces_port_only() {
        let mut cfg = ServerConfig {
            listen_addr: "127.0.0.1:3000".to_string(),
            ..ServerConfig::default()
        };
        cfg.apply_env(env(&[("PORT", "8081")]));
        assert_eq!(cfg.listen_addr, "127.0.0.1:8081");
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let mut cfg = ServerConfig::default();
        cfg.apply_env(env(&[
            ("PORT", "eighty"),
            ("CHUNKRUN_MAX_WS_CONNECTIONS", "-1"),
            ("CHUNKRUN_LOG_FORMAT", "xml"),
            ("CHUNKRUN_LISTEN_ADDR", ""),
        ]));
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.limits.max_ws_connections, 200);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn check_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(cfg.check().unwrap_err().contains("listen_addr"));
    }

    #[test]
    fn check_rejects_zero_limits() {
        let mut cfg = ServerConfig::default();
        cfg.limits.max_ws_connections = 0;
        assert!(cfg.check().is_err());

        let mut cfg = ServerConfig::default();
        cfg.limits.ws_rate_limit_per_sec = 0.0;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn check_reports_simulation_problems() {
        let mut cfg = ServerConfig::default();
        cfg.simulation.tick_rate_hz = -1.0;
        assert!(cfg.check().unwrap_err().starts_with("simulation.tick_rate_hz"));
    }
}
