//! Configuration – reads/writes `~/.mnemos/config.toml`.

use mnemos_memory::MemoryConfig;
use mnemos_memory::snapshot::DEFAULT_STORAGE_KEY;
use mnemos_memory::store::DEFAULT_CAPACITY;
use mnemos_types::{DEFAULT_QUERY_LIMIT, DEFAULT_QUERY_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.mnemos/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of memories retained.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// SQLite database holding the snapshot.  Relative paths are resolved
    /// against `~/.mnemos/`.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Key of the snapshot blob inside the database.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Result limit used by `/search` when `--limit` is not given.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Similarity threshold used by `/search` when `--threshold` is not given.
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f32,

    /// Source recorded by `/add` when `--source` is not given.
    #[serde(default = "default_source")]
    pub default_source: String,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_database_path() -> PathBuf {
    PathBuf::from("memory.db")
}
fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}
fn default_search_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}
fn default_search_threshold() -> f32 {
    DEFAULT_QUERY_THRESHOLD
}
fn default_source() -> String {
    "cli".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            database_path: default_database_path(),
            storage_key: default_storage_key(),
            search_limit: default_search_limit(),
            search_threshold: default_search_threshold(),
            default_source: default_source(),
        }
    }
}

impl Config {
    /// The [`MemoryConfig`] this configuration describes.
    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            capacity: self.capacity,
            storage_key: self.storage_key.clone(),
        }
    }

    /// Absolute location of the database, resolving relative paths against
    /// `base_dir`.
    pub fn resolved_database_path(&self, base_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            base_dir.join(&self.database_path)
        }
    }
}

/// Return the path to `~/.mnemos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Return `~/.mnemos`.
pub fn config_dir() -> PathBuf {
    config_dir_for_home(&home_dir())
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

pub(crate) fn config_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mnemos")
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    config_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
///
/// `MNEMOS_*` overrides are not applied here, so the first-run wizard never
/// writes them into the file; see [`apply_env_overrides`].
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MNEMOS_*` environment variable overrides to `cfg`, whether it was
/// loaded, freshly created or a fallback default.
///
/// | Variable | Config field |
/// |---|---|
/// | `MNEMOS_CAPACITY` | `capacity` |
/// | `MNEMOS_DB_PATH` | `database_path` |
/// | `MNEMOS_STORAGE_KEY` | `storage_key` |
/// | `MNEMOS_SEARCH_LIMIT` | `search_limit` |
///
/// Numeric values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MNEMOS_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.capacity = n;
    }
    if let Ok(v) = std::env::var("MNEMOS_DB_PATH") {
        cfg.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("MNEMOS_STORAGE_KEY") {
        cfg.storage_key = v;
    }
    if let Ok(v) = std::env::var("MNEMOS_SEARCH_LIMIT")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.search_limit = n;
    }
}

/// Save the config to disk, creating `~/.mnemos/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

/// Create `dir` (and parents), restricted to the owner (rwx------) on Unix.
pub fn ensure_private_dir(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|e| format!("Failed to set permissions on {}: {}", dir.display(), e))?;
    }
    Ok(())
}
