//! Run configuration.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. [`Config::default()`]
//! 2. the TOML file given with `--config`, else `dupsweep.toml` in the
//!    working directory when present
//! 3. `DUPSWEEP_*` environment variables (e.g. `DUPSWEEP_IO_THREADS=8`)
//! 4. command-line flags ([`Overrides`])
//!
//! The merged configuration is immutable for the run and checked with
//! [`Config::validate`] before anything touches the filesystem.
//!
//! ```toml
//! targets = ["/data/photos", "/backup/photos"]
//! search_pattern = "*.jpg"
//! duplicates_report = "duplicates.txt"
//! delete_duplicates = true
//! deletion_masks = ["/backup/*"]
//! exclusion_masks = ["*/.thumbnails/*"]
//! keep_single_file = false
//! execution_timeout_secs = 3600
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dupsweep.toml";

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPSWEEP_";

/// Configuration errors. Always fatal before scanning starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or extracted.
    #[error("invalid configuration: {0}")]
    Figment(#[from] figment::Error),

    /// The file named with `--config` does not exist.
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    /// The config file could not be read for key checking.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No target directories were given.
    #[error("no target directories configured")]
    NoTargets,

    /// The search pattern is empty.
    #[error("search pattern must not be empty")]
    EmptySearchPattern,

    /// `io_threads` is zero.
    #[error("io_threads must be at least 1")]
    ZeroIoThreads,

    /// A deletion or exclusion mask is empty.
    #[error("{field} contains an empty mask")]
    EmptyMask { field: &'static str },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory trees to scan.
    pub targets: Vec<PathBuf>,
    /// Wildcard applied to file names during enumeration.
    pub search_pattern: String,
    /// Directory holding cache and lock files.
    pub cache_dir: PathBuf,
    /// Path of the plain-text duplicates report.
    pub duplicates_report: PathBuf,
    /// Cancel the run after this many seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timeout_secs: Option<u64>,
    /// Delete duplicates selected by `deletion_masks`.
    pub delete_duplicates: bool,
    /// Ordered masks selecting duplicates to delete.
    pub deletion_masks: Vec<String>,
    /// Masks removing paths from duplicate detection.
    pub exclusion_masks: Vec<String>,
    /// Keep the first member when a mask matches a whole group.
    pub keep_single_file: bool,
    /// Number of targets scanned concurrently.
    pub io_threads: usize,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Abort on the first unreadable file.
    pub strict: bool,
    /// Start from an empty cache when a cache file is corrupt.
    pub discard_corrupt_cache: bool,
    /// Move deleted files to the system trash.
    pub use_trash: bool,
    /// Log deletions without performing them.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            search_pattern: "*".to_string(),
            cache_dir: default_cache_dir(),
            duplicates_report: PathBuf::from("duplicates.txt"),
            execution_timeout_secs: None,
            delete_duplicates: false,
            deletion_masks: Vec::new(),
            exclusion_masks: Vec::new(),
            keep_single_file: false,
            io_threads: 4,
            follow_symlinks: false,
            strict: false,
            discard_corrupt_cache: false,
            use_trash: false,
            dry_run: false,
        }
    }
}

/// Keys accepted in the config file.
const KNOWN_KEYS: &[&str] = &[
    "targets",
    "search_pattern",
    "cache_dir",
    "duplicates_report",
    "execution_timeout_secs",
    "delete_duplicates",
    "deletion_masks",
    "exclusion_masks",
    "keep_single_file",
    "io_threads",
    "follow_symlinks",
    "strict",
    "discard_corrupt_cache",
    "use_trash",
    "dry_run",
];

/// Platform cache directory, or `./cache` when none can be determined.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "dupsweep")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("cache"))
}

/// Command-line values layered over file and environment settings.
///
/// `None` and empty fields leave the lower layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_duplicates: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deletion_masks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusion_masks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_single_file: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discard_corrupt_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_trash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl Config {
    /// Build the file and environment layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] when an explicit config file
    /// does not exist.
    pub fn figment(config_file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = Self::config_file(config_file)? {
            log::debug!("Loading config file {}", path.display());
            warn_unknown_keys(&path)?;
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load the layered configuration with command-line overrides on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any layer fails to parse. The result is
    /// not validated; call [`Config::validate`].
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let config: Config = Self::figment(config_file)?
            .merge(Serialized::defaults(overrides))
            .extract()?;
        log::debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    fn config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        match explicit {
            Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
            Some(path) => Err(ConfigError::MissingFile(path.to_path_buf())),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                Ok(local.is_file().then(|| local.to_path_buf()))
            }
        }
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if self.search_pattern.is_empty() {
            return Err(ConfigError::EmptySearchPattern);
        }
        if self.io_threads == 0 {
            return Err(ConfigError::ZeroIoThreads);
        }
        if self.deletion_masks.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyMask {
                field: "deletion_masks",
            });
        }
        if self.exclusion_masks.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyMask {
                field: "exclusion_masks",
            });
        }
        if self.delete_duplicates && self.deletion_masks.is_empty() {
            log::warn!("delete_duplicates is set but no deletion masks are configured");
        }
        Ok(())
    }
}

/// Log a warning for every unknown top-level key in a config file, with a
/// suggestion when a known key is close.
///
/// Returns the warnings that were logged.
fn warn_unknown_keys(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    // Syntax errors are reported by figment on extraction.
    let Ok(table) = content.parse::<toml::Table>() else {
        return Ok(Vec::new());
    };

    let warnings = unknown_key_warnings(table.keys().map(String::as_str));
    for warning in &warnings {
        log::warn!("{}: {}", path.display(), warning);
    }
    Ok(warnings)
}

fn unknown_key_warnings<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut warnings = BTreeMap::new();
    for key in keys.filter(|k| !KNOWN_KEYS.contains(k)) {
        let suggestion = KNOWN_KEYS
            .iter()
            .map(|known| (strsim::jaro_winkler(key, known), *known))
            .filter(|(score, _)| *score > 0.8)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let message = match suggestion {
            Some((_, known)) => format!("unknown key `{key}`, did you mean `{known}`?"),
            None => format!("unknown key `{key}`"),
        };
        warnings.insert(key.to_string(), message);
    }
    warnings.into_values().collect()
}
