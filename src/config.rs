//! Runtime configuration: environment variables with an optional TOML overlay.
//!
//! Env variables (all optional):
//!   API_KEY          : client key required by /createTask and /getTaskResult
//!   SERVER_HOST      : bind host (default "0.0.0.0")
//!   PORT             : u16 (default 7777)
//!   TASK_TIMEOUT     : task lifetime in seconds (default 120)
//!   DISCORD_WEBHOOK  : webhook URL; empty disables notifications
//!   PUBLIC_URL       : external base URL used in solve links
//!   RELAY_CONFIG_PATH: path to a TOML file providing the same fields
//!
//! Precedence: env variable > TOML value > default.

use serde::Deserialize;
use tracing::{error, info, warn};

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_TASK_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_NOTIFY_COOLDOWN_SECS: f64 = 10.0;

/// Fields accepted in the TOML overlay file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigFile {
  #[serde(default)] pub api_key: Option<String>,
  #[serde(default)] pub host: Option<String>,
  #[serde(default)] pub port: Option<u16>,
  #[serde(default)] pub task_timeout_secs: Option<f64>,
  #[serde(default)] pub discord_webhook: Option<String>,
  #[serde(default)] pub public_url: Option<String>,
  #[serde(default)] pub notify_cooldown_secs: Option<f64>,
}

/// Resolved configuration handed to `AppState`.
#[derive(Clone, Debug)]
pub struct Config {
  pub api_key: String,
  pub host: String,
  pub port: u16,
  pub task_timeout_secs: f64,
  pub discord_webhook: String,
  pub public_url: Option<String>,
  pub notify_cooldown_secs: f64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_key: String::new(),
      host: "0.0.0.0".into(),
      port: DEFAULT_PORT,
      task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
      discord_webhook: String::new(),
      public_url: None,
      notify_cooldown_secs: DEFAULT_NOTIFY_COOLDOWN_SECS,
    }
  }
}

impl Config {
  /// Build from environment, layering the optional TOML file underneath.
  pub fn from_env() -> Self {
    let file = load_config_file_from_env().unwrap_or_default();
    let mut cfg = Config::default();

    if let Some(v) = file.api_key { cfg.api_key = v; }
    if let Some(v) = file.host { cfg.host = v; }
    if let Some(v) = file.port { cfg.port = v; }
    if let Some(v) = file.task_timeout_secs { cfg.task_timeout_secs = v; }
    if let Some(v) = file.discord_webhook { cfg.discord_webhook = v; }
    if let Some(v) = file.public_url { cfg.public_url = Some(v); }
    if let Some(v) = file.notify_cooldown_secs { cfg.notify_cooldown_secs = v; }

    if let Ok(v) = std::env::var("API_KEY") { cfg.api_key = v; }
    if let Ok(v) = std::env::var("SERVER_HOST") { cfg.host = v; }
    if let Some(v) = env_parse::<u16>("PORT") { cfg.port = v; }
    if let Some(v) = env_parse::<f64>("TASK_TIMEOUT") { cfg.task_timeout_secs = v; }
    if let Ok(v) = std::env::var("DISCORD_WEBHOOK") { cfg.discord_webhook = v; }
    if let Ok(v) = std::env::var("PUBLIC_URL") {
      if !v.is_empty() { cfg.public_url = Some(v); }
    }

    if cfg.api_key.is_empty() {
      warn!(target: "relay_backend", "API_KEY is not set - all API requests will be rejected");
    }
    cfg
  }

  /// External base URL for solve links (falls back to the bind address).
  pub fn public_base(&self) -> String {
    self
      .public_url
      .clone()
      .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
  }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
  std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

/// Attempt to load the TOML overlay from RELAY_CONFIG_PATH.
/// On any parsing/IO error, returns None and keeps going with env/defaults.
fn load_config_file_from_env() -> Option<ConfigFile> {
  let path = std::env::var("RELAY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ConfigFile>(&s) {
      Ok(cfg) => {
        info!(target: "relay_backend", %path, "Loaded relay config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "relay_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "relay_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_the_service_contract() {
    let cfg = Config::default();
    assert_eq!(cfg.port, 7777);
    assert_eq!(cfg.task_timeout_secs, 120.0);
    assert_eq!(cfg.public_base(), "http://0.0.0.0:7777");
  }

  #[test]
  fn public_url_overrides_bind_address() {
    let cfg = Config { public_url: Some("https://relay.example.com".into()), ..Config::default() };
    assert_eq!(cfg.public_base(), "https://relay.example.com");
  }

  #[test]
  fn toml_overlay_parses_partial_files() {
    let file: ConfigFile = toml::from_str("port = 9000\napi_key = \"k\"").expect("parse");
    assert_eq!(file.port, Some(9000));
    assert_eq!(file.api_key.as_deref(), Some("k"));
    assert!(file.public_url.is_none());
  }
}
