use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upper bound for any duration setting: ten years.
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Seconds from config as a chrono duration, clamped to the config bound.
pub fn duration_secs(secs: u64) -> Duration {
  Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  pub session: SessionConfig,
  #[serde(default)]
  pub workspace: WorkspaceConfig,
  #[serde(default)]
  pub support_desk: SupportDeskConfig,
  #[serde(default)]
  pub escrow: EscrowConfig,
  #[serde(default)]
  pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the agency API, e.g. https://api.example.com/v1
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Signed-in user; keys the support desk cache and signs escrow transitions
  pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
  pub id: Option<i64>,
  pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupportDeskConfig {
  pub namespace: String,
  pub ttl_secs: u64,
  /// Consecutive stale serves allowed before the error surfaces
  pub max_stale_serves: u32,
  pub max_stale_age_secs: u64,
}

impl Default for SupportDeskConfig {
  fn default() -> Self {
    Self {
      namespace: "support-desk".to_string(),
      ttl_secs: 180,
      max_stale_serves: 5,
      max_stale_age_secs: 1800,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
  pub page_size: u32,
}

impl Default for EscrowConfig {
  fn default() -> Self {
    Self { page_size: 25 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
  /// Seconds before a toast is dismissed
  pub toast_secs: u64,
}

impl Default for UiConfig {
  fn default() -> Self {
    Self { toast_secs: 4 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./agency-desk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/agency-desk/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/agency-desk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("agency-desk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("agency-desk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
    config
      .validate()
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let durations = [
      ("api.timeout_secs", self.api.timeout_secs),
      ("support_desk.ttl_secs", self.support_desk.ttl_secs),
      ("support_desk.max_stale_age_secs", self.support_desk.max_stale_age_secs),
      ("ui.toast_secs", self.ui.toast_secs),
    ];
    for (key, secs) in durations {
      if secs > MAX_DURATION_SECS {
        return Err(eyre!(
          "{} is {} seconds, the maximum is {}",
          key,
          secs,
          MAX_DURATION_SECS
        ));
      }
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be at least 1"));
    }
    Ok(())
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks AGENCY_DESK_TOKEN first, then AGENCY_API_TOKEN. Requests go out
  /// unauthenticated when neither is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("AGENCY_DESK_TOKEN")
      .or_else(|_| std::env::var("AGENCY_API_TOKEN"))
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
