use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::core::queues::{QueueOverrides, QueueTable};


pub const CONFIG_ENV_VAR: &str = "LAUNCH_CONFIG";
pub const CONFIG_FILE_NAME: &str = ".launch.toml";

#[derive(Error, Debug)]
pub enum LaunchConfigError {
  #[error("Config file does not exist: {0}")]
  ConfigNotFound(PathBuf),
  #[error("Could not parse config file {path}: {source}")]
  ConfigParse {
    path: PathBuf,
    source: confy::ConfyError,
  },
}

/// Where the queue table is read from, and whether the user asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLocation {
  pub path: PathBuf,
  pub explicit: bool,
}

/// Picks the config file: an explicit path wins, then the `LAUNCH_CONFIG`
/// environment variable, then `~/.launch.toml`. Without a home directory
/// and nothing named there is no file to read.
pub fn find_config(explicit: Option<&Path>) -> Option<ConfigLocation> {
  config_location(
    explicit,
    std::env::var_os(CONFIG_ENV_VAR),
    dirs::home_dir(),
  )
}

pub fn config_location(
  explicit: Option<&Path>,
  env_value: Option<OsString>,
  home: Option<PathBuf>,
) -> Option<ConfigLocation> {
  if let Some(path) = explicit {
    return Some(ConfigLocation {
      path: path.to_path_buf(),
      explicit: true,
    });
  }
  if let Some(value) = env_value.filter(|v| !v.is_empty()) {
    return Some(ConfigLocation {
      path: PathBuf::from(value),
      explicit: true,
    });
  }
  home.map(|home| ConfigLocation {
    path: home.join(CONFIG_FILE_NAME),
    explicit: false,
  })
}

/// Reads the per-queue overrides from a TOML file.
pub fn load_config(path: &Path) -> Result<QueueOverrides, LaunchConfigError> {
  // confy would create a default file on a missing path
  if !path.is_file() {
    return Err(LaunchConfigError::ConfigNotFound(path.to_path_buf()));
  }
  let overrides: QueueOverrides =
    confy::load_path(path).map_err(|e| LaunchConfigError::ConfigParse {
      path: path.to_path_buf(),
      source: e,
    })?;
  debug!("Loaded {} queue entries from {:?}", overrides.0.len(), path);
  Ok(overrides)
}

/// Builds the queue table for a run. A missing file is only an error when
/// the user named it; otherwise the built-in defaults are used.
pub fn load_queue_table(
  location: Option<&ConfigLocation>,
) -> Result<QueueTable, LaunchConfigError> {
  let Some(location) = location else {
    debug!("No config location available, using built-in queue defaults");
    return Ok(QueueTable::builtin());
  };
  match load_config(&location.path) {
    Ok(overrides) => Ok(QueueTable::with_overrides(overrides)),
    Err(LaunchConfigError::ConfigNotFound(path)) if !location.explicit => {
      debug!("No config file at {:?}, using built-in queue defaults", path);
      Ok(QueueTable::builtin())
    }
    Err(e) => Err(e),
  }
}
