use std::{
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
  time::Duration,
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};
use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

pub const DEFAULT_PREVIEW_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONFIG_DIR_ENV: &str = "DCFG_CONFIG_DIR";
const WORKSPACE_DIR: &str = ".dcfg";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
  /// Quiet period before an AF draft is sent for live preview.
  pub preview_debounce_ms: u64,
  /// Quiet period before a search-as-you-type query is sent.
  pub search_debounce_ms:  u64,
  /// Lines fetched per request; `None` fetches everything at once.
  pub page_size:           Option<usize>,
  pub service:             ServiceConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      preview_debounce_ms: DEFAULT_PREVIEW_DEBOUNCE_MS,
      search_debounce_ms:  DEFAULT_SEARCH_DEBOUNCE_MS,
      page_size:           None,
      service:             ServiceConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ServiceConfig {
  pub base_url:     String,
  pub timeout_secs: u64,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL.to_string(),
      timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
  }
}

impl ServiceConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("bad config: {0}")]
  BadConfig(#[from] toml::de::Error),
  #[error(transparent)]
  Error(#[from] io::Error),
}

impl EngineConfig {
  pub fn preview_debounce(&self) -> Duration {
    Duration::from_millis(self.preview_debounce_ms)
  }

  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }

  /// Merge the global and workspace config sources, workspace winning.
  ///
  /// A source that failed to read is skipped; a source that failed to parse
  /// is an error. With neither source available the defaults apply.
  pub fn load(
    global: Result<String, ConfigLoadError>,
    local: Result<String, ConfigLoadError>,
  ) -> Result<EngineConfig, ConfigLoadError> {
    let global = global.and_then(|text| parse_table(&text));
    let local = local.and_then(|text| parse_table(&text));

    let merged = match (global, local) {
      (Ok(global), Ok(local)) => merge_toml_values(global, local, 3),
      (_, Err(ConfigLoadError::BadConfig(err))) | (Err(ConfigLoadError::BadConfig(err)), _) => {
        return Err(ConfigLoadError::BadConfig(err));
      },
      (Ok(value), Err(_)) | (Err(_), Ok(value)) => value,
      (Err(_), Err(_)) => return Ok(EngineConfig::default()),
    };

    merged.try_into().map_err(ConfigLoadError::BadConfig)
  }

  /// Load the user config and the config of the workspace containing `cwd`.
  pub fn load_user(cwd: &Path) -> Result<EngineConfig, ConfigLoadError> {
    let global = config_file()
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory"))
      .and_then(fs::read_to_string)
      .map_err(ConfigLoadError::Error);
    let local = fs::read_to_string(workspace_config_file(&find_workspace_in(cwd)))
      .map_err(ConfigLoadError::Error);
    Self::load(global, local)
  }

  /// Load a single explicitly named config file.
  pub fn load_file(path: &Path) -> Result<EngineConfig, ConfigLoadError> {
    let text = fs::read_to_string(path)?;
    Self::load(Ok(text), Err(io::Error::from(io::ErrorKind::NotFound).into()))
  }
}

fn parse_table(text: &str) -> Result<toml::Value, ConfigLoadError> {
  let table: toml::Table = toml::from_str(text)?;
  Ok(toml::Value::Table(table))
}

/// Merge `right` onto `left`, recursing into tables up to `merge_depth`.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (name, right_value) in right_map {
        let merged = match left_map.remove(&name) {
          Some(left_value) => merge_toml_values(left_value, right_value, merge_depth - 1),
          None => right_value,
        };
        left_map.insert(name, merged);
      }
      Value::Table(left_map)
    },
    (_, value) => value,
  }
}

/// `$DCFG_CONFIG_DIR`, or the platform config directory joined with `dcfg`.
pub fn config_dir() -> Option<PathBuf> {
  if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
    return Some(PathBuf::from(dir));
  }
  let strategy = choose_base_strategy().ok()?;
  Some(strategy.config_dir().join("dcfg"))
}

pub fn config_file() -> Option<PathBuf> {
  config_dir().map(|dir| dir.join(CONFIG_FILE))
}

pub fn workspace_config_file(workspace: &Path) -> PathBuf {
  workspace.join(WORKSPACE_DIR).join(CONFIG_FILE)
}

/// Nearest ancestor of `dir` holding `.dcfg` or `.git`, else `dir` itself.
pub fn find_workspace_in(dir: &Path) -> PathBuf {
  dir
    .ancestors()
    .find(|ancestor| ancestor.join(WORKSPACE_DIR).exists() || ancestor.join(".git").exists())
    .unwrap_or(dir)
    .to_path_buf()
}
