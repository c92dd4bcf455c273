use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the backend host.
  #[serde(default = "default_api_url")]
  pub url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
    }
  }
}

fn default_api_url() -> String {
  "https://localhost:44305".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Override for the local database path (default:
  /// `<data_dir>/plantreq/local.db`).
  pub path: Option<PathBuf>,
}

/// Allow-lists driving the offline interceptor and the error silencer.
/// Patterns are URL substrings.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// GET endpoints whose successful responses are cached for replay.
  #[serde(default = "default_cacheable_urls")]
  pub cacheable_urls: Vec<String>,
  /// Subset of cacheable endpoints that get a static fallback when no
  /// cache exists; also the set refreshed by a sync pass.
  #[serde(default = "default_critical_urls")]
  pub critical_urls: Vec<String>,
  /// Endpoints whose connectivity errors are never surfaced.
  #[serde(default = "default_silent_urls")]
  pub silent_urls: Vec<String>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      cacheable_urls: default_cacheable_urls(),
      critical_urls: default_critical_urls(),
      silent_urls: default_silent_urls(),
    }
  }
}

fn default_cacheable_urls() -> Vec<String> {
  [
    "/api/abp/application-configuration",
    "/.well-known/openid-configuration",
    "/.well-known/jwks",
    "/connect/userinfo",
    "/api/abp/application-localization",
    "/api/abp/multi-tenancy/tenants",
    "/api/feature-management/",
    "/api/permission-management/",
    "/api/setting-management/",
  ]
  .map(String::from)
  .to_vec()
}

fn default_critical_urls() -> Vec<String> {
  [
    "/.well-known/openid-configuration",
    "/.well-known/jwks",
    "/api/abp/application-configuration",
    "/api/abp/application-localization",
    "/connect/userinfo",
    "/api/abp/multi-tenancy/tenants",
  ]
  .map(String::from)
  .to_vec()
}

fn default_silent_urls() -> Vec<String> {
  [
    "/.well-known/openid-configuration",
    "/.well-known/jwks",
    "/connect/userinfo",
    "/connect/token",
    "/connect/authorize",
    "/api/abp/application-configuration",
    "/api/abp/application-localization",
    "/api/abp/multi-tenancy/tenants",
    "/api/feature-management/",
    "/api/permission-management/",
    "/api/setting-management/",
  ]
  .map(String::from)
  .to_vec()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./plantreq.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/plantreq/config.yaml
  ///
  /// With no file anywhere, the compiled-in defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("plantreq.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("plantreq").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// API token from the environment, if set. Attached as a bearer header
  /// to backend calls when present.
  pub fn get_api_token() -> Option<String> {
    std::env::var("PLANTREQ_API_TOKEN").ok()
  }

  /// Absolute URLs the synchronizer refreshes on each pass.
  pub fn critical_sync_urls(&self) -> Vec<String> {
    let base = self.api.url.trim_end_matches('/');
    [
      "/.well-known/openid-configuration",
      "/api/abp/application-configuration",
      "/api/abp/application-localization",
    ]
    .iter()
    .map(|path| format!("{base}{path}"))
    .collect()
  }

  /// Absolute URLs read once at startup so the client always boots with a
  /// well-formed view of the backend, online or offline.
  pub fn startup_urls(&self) -> Vec<String> {
    let base = self.api.url.trim_end_matches('/');
    [
      "/api/abp/application-configuration",
      "/api/abp/application-localization",
      "/.well-known/openid-configuration",
      "/connect/userinfo",
      "/api/abp/multi-tenancy/tenants",
    ]
    .iter()
    .map(|path| format!("{base}{path}"))
    .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_cover_discovery_endpoints() {
    let config = Config::default();

    assert!(config
      .offline
      .cacheable_urls
      .iter()
      .any(|p| p == "/api/abp/application-configuration"));
    assert!(config
      .offline
      .critical_urls
      .iter()
      .any(|p| p == "/.well-known/openid-configuration"));
    // Every critical endpoint is also cacheable
    for critical in &config.offline.critical_urls {
      assert!(config.offline.cacheable_urls.contains(critical));
    }
  }

  #[test]
  fn test_partial_yaml_fills_defaults() {
    let config: Config = serde_yaml::from_str("api:\n  url: https://backend.test\n").unwrap();
    assert_eq!(config.api.url, "https://backend.test");
    assert!(!config.offline.cacheable_urls.is_empty());
  }

  #[test]
  fn test_critical_sync_urls_are_absolute() {
    let config: Config = serde_yaml::from_str("api:\n  url: https://backend.test/\n").unwrap();
    let urls = config.critical_sync_urls();
    assert_eq!(
      urls[0],
      "https://backend.test/.well-known/openid-configuration"
    );
  }
}
