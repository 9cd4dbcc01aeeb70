use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration.
///
/// Layered as: built-in defaults, then `bdtrip.toml` (or `--config`),
/// then environment variables, then command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection string: a path, `sqlite://<path>` or `:memory:`
    pub database: String,
    /// JSON data file used as fallback store and as sync source
    pub data_file: PathBuf,
    pub port: u16,
    pub reconnect_interval_secs: u64,
    pub debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: "bdtrip.db".to_string(),
            data_file: PathBuf::from("db.json"),
            port: 4000,
            reconnect_interval_secs: 5,
            debounce_ms: 250,
        }
    }
}

/// Where the document database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
}

impl DatabaseTarget {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let raw = raw.strip_prefix("sqlite://").unwrap_or(raw);
        if raw == ":memory:" || raw.is_empty() {
            DatabaseTarget::Memory
        } else {
            DatabaseTarget::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseTarget::File(path) => write!(f, "{}", path.display()),
            DatabaseTarget::Memory => f.write_str(":memory:"),
        }
    }
}

impl AppConfig {
    pub fn database_target(&self) -> DatabaseTarget {
        DatabaseTarget::parse(&self.database)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Override fields from `DATABASE_URL`, `DATA_FILE` and `PORT`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database = url;
        }
        if let Some(file) = lookup("DATA_FILE").filter(|v| !v.is_empty()) {
            self.data_file = PathBuf::from(file);
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid PORT value: {}", port))?;
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("bdtrip.toml")
}

/// Load the TOML config file, if any, and apply the process environment.
///
/// A missing default config file is fine; a missing explicit one is not.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents)?
    } else if explicit {
        anyhow::bail!("config file not found at {}", path.display());
    } else {
        AppConfig::default()
    };

    let _ = dotenvy::dotenv();
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
