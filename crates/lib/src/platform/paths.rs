use crate::consts::{APP_NAME, HOME_ENV, TASKS_FILE_NAME};
use std::path::PathBuf;

/// Returns the user's home directory, empty when it cannot be determined.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE").map(PathBuf::from).unwrap_or_default()
}

/// Returns the user's home directory, empty when it cannot be determined.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  if let Some(home) = std::env::var_os(HOME_ENV) {
    return PathBuf::from(home);
  }
  std::env::var_os("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  if let Some(home) = std::env::var_os(HOME_ENV) {
    return PathBuf::from(home);
  }
  let config_home = std::env::var_os("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Default location of the task snapshot.
pub fn tasks_file() -> PathBuf {
  config_dir().join(TASKS_FILE_NAME)
}
