// src/config/loader.rs
//! Layered configuration loader with environment overrides and hot reload

use crate::config::{constants::paths, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration loader with hot reload capabilities
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    current_config: Arc<RwLock<SystemConfig>>,
    _file_watcher: Option<notify::RecommendedWatcher>,
}

/// Configuration loading errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Configuration parse error: {0}")]
    ParseError(String),
    #[error("Configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("File watcher error: {0}")]
    WatcherError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigLoader {
    /// Create loader over the standard search paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths, later paths taking precedence
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
            _file_watcher: None,
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = load_and_merge_configs(&self.config_paths, &self.env_prefix)?;
        *self.current_config.write() = config.clone();
        info!(paths = ?self.config_paths, "Configuration loaded");
        Ok(config)
    }

    /// Get current configuration
    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Watch the configuration files and invoke `callback` with every valid
    /// reloaded configuration. Invalid edits are logged and ignored.
    pub fn enable_hot_reload(
        &mut self,
        callback: impl Fn(SystemConfig) + Send + 'static,
    ) -> Result<(), ConfigError> {
        use notify::{DebouncedEvent, RecursiveMode, Watcher};

        let (watch_tx, watch_rx) = mpsc::channel();
        let mut watcher = notify::watcher(watch_tx, Duration::from_millis(500))
            .map_err(|e| ConfigError::WatcherError(e.to_string()))?;

        let mut watched_dirs = std::collections::HashSet::new();
        for path in &self.config_paths {
            if let Some(parent) = path.parent() {
                let dir = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
                if dir.exists() && watched_dirs.insert(dir.to_path_buf()) {
                    watcher
                        .watch(dir, RecursiveMode::NonRecursive)
                        .map_err(|e| ConfigError::WatcherError(e.to_string()))?;
                }
            }
        }

        let config_paths = self.config_paths.clone();
        let env_prefix = self.env_prefix.clone();
        let current = self.current_config.clone();

        thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                while let Ok(event) = watch_rx.recv() {
                    let path = match event {
                        DebouncedEvent::Write(path) | DebouncedEvent::Create(path) => path,
                        _ => continue,
                    };
                    if !config_paths.iter().any(|p| same_file(p, &path)) {
                        continue;
                    }
                    debug!(path = %path.display(), "Configuration file changed");
                    match load_and_merge_configs(&config_paths, &env_prefix) {
                        Ok(new_config) => {
                            *current.write() = new_config.clone();
                            callback(new_config);
                        }
                        Err(e) => warn!(error = %e, "Failed to reload configuration"),
                    }
                }
            })
            .map_err(|e| ConfigError::WatcherError(e.to_string()))?;

        self._file_watcher = Some(watcher);
        Ok(())
    }

    /// Validate a single configuration file without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = default_value()?;
        merge_toml_values(&mut merged, load_config_file(path)?);
        let config = into_config(merged)?;
        config.validate().map_err(ConfigError::ValidationError)
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Get configuration file modification times
    pub fn get_config_timestamps(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.config_paths
            .iter()
            .map(|path| {
                let timestamp = std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
                (path.clone(), timestamp)
            })
            .collect()
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut config_paths = Vec::new();

        if let Some(home_dir) = home_dir() {
            config_paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }
        config_paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        config_paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));

        config_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_and_merge_configs(config_paths: &[PathBuf], env_prefix: &str) -> Result<SystemConfig, ConfigError> {
    let mut merged = default_value()?;

    for config_path in config_paths {
        match load_config_file(config_path) {
            Ok(file_config) => merge_toml_values(&mut merged, file_config),
            // Missing layers are optional
            Err(ConfigError::FileNotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    apply_environment_overrides(&mut merged, env_prefix);

    let config = into_config(merged)?;
    config.validate().map_err(ConfigError::ValidationError)?;
    Ok(config)
}

fn default_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn into_config(value: toml::Value) -> Result<SystemConfig, ConfigError> {
    value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))
}

fn load_config_file<P: AsRef<Path>>(path: P) -> Result<toml::Value, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: toml::Value = toml::from_str(&content)?;
    Ok(config)
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

/// `BRAINGAME_SESSION__NUM_PLAYERS=3` sets `session.num_players`; a double
/// underscore separates table levels so field names keep their underscores.
fn apply_environment_overrides(config: &mut toml::Value, prefix: &str) {
    for (key, value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix(prefix) else {
            continue;
        };
        let config_key: Vec<String> = stripped.split("__").map(|part| part.to_lowercase()).collect();
        debug!(key = %key, "Applying environment override");
        set_nested_value(config, &config_key, parse_env_value(&value));
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else if let Ok(toml::Value::Table(mut table)) = toml::from_str::<toml::Value>(&format!("v = {}", value)) {
        // Arrays such as `[1, 2, 3]`
        table.remove("v").unwrap_or_else(|| toml::Value::String(value.to_string()))
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.clone())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
    if let toml::Value::Table(table) = current {
        table.insert(last.clone(), value);
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameMode;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_without_files_yields_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/braingame.toml")])
            .with_env_prefix("BRAINGAME_TEST_NONE_");
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_layered_files() {
        let mut base = NamedTempFile::new().unwrap();
        writeln!(
            base,
            r#"
[session]
num_players = 1
window_size_seconds = 4
"#
        )
        .unwrap();

        let mut local = NamedTempFile::new().unwrap();
        writeln!(
            local,
            r#"
[session]
window_size_seconds = 3
game_mode = "analysis"
"#
        )
        .unwrap();

        let mut loader = ConfigLoader::with_paths(vec![base.path().to_path_buf(), local.path().to_path_buf()])
            .with_env_prefix("BRAINGAME_TEST_LAYER_");
        let config = loader.load_system_config().unwrap();

        assert_eq!(config.session.num_players, 1);
        assert_eq!(config.session.window_size_seconds, 3);
        assert_eq!(config.session.game_mode, GameMode::Analysis);
        assert_eq!(loader.get_current_config(), config);
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[session]
num_players = 7
"#
        )
        .unwrap();

        assert!(matches!(
            loader.validate_config_file(temp_file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unparsable_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[session\nnum_players = ").unwrap();

        let mut loader = ConfigLoader::with_paths(vec![temp_file.path().to_path_buf()])
            .with_env_prefix("BRAINGAME_TEST_PARSE_");
        assert!(matches!(loader.load_system_config(), Err(ConfigError::ParseError(_))));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("BRAINGAME_TEST_ENV_SESSION__NUM_PLAYERS", "1");
        std::env::set_var("BRAINGAME_TEST_ENV_SESSION__ACTIVE_CHANNELS", "[3, 4]");

        let mut loader = ConfigLoader::with_paths(Vec::new()).with_env_prefix("BRAINGAME_TEST_ENV_");
        let config = loader.load_system_config();

        std::env::remove_var("BRAINGAME_TEST_ENV_SESSION__NUM_PLAYERS");
        std::env::remove_var("BRAINGAME_TEST_ENV_SESSION__ACTIVE_CHANNELS");

        let config = config.unwrap();
        assert_eq!(config.session.num_players, 1);
        assert_eq!(config.session.active_channels, vec![3, 4]);
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let temp_file = NamedTempFile::new().unwrap();

        assert!(loader.export_config(temp_file.path()).is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[session]"));
        assert!(content.contains("[board]"));
    }
}
