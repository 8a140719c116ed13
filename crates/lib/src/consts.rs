/// Application name used for config directories and temp prefixes.
pub const APP_NAME: &str = "ottopie";

/// File name of the task snapshot inside the config directory.
pub const TASKS_FILE_NAME: &str = "tasks.json";

/// Overrides the config directory.
pub const HOME_ENV: &str = "OTTOPIE_HOME";
