//! Configuration loading: defaults, overridden by YAML, overridden by
//! environment variables. See `orc_config.yaml` at the project root.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OrcError, OrcResult};

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules/".into(),
        "__pycache__/".into(),
        "*.pyc".into(),
        ".git/".into(),
        ".venv/".into(),
        "venv/".into(),
        "dist/".into(),
        "build/".into(),
        "*.min.js".into(),
        "*.bundle.js".into(),
        "coverage/".into(),
        ".pytest_cache/".into(),
        ".mypy_cache/".into(),
    ]
}

fn default_file_extensions() -> Vec<String> {
    vec![
        ".py".into(),
        ".js".into(),
        ".ts".into(),
        ".jsx".into(),
        ".tsx".into(),
        ".html".into(),
        ".css".into(),
        ".json".into(),
        ".yaml".into(),
        ".yml".into(),
        ".md".into(),
    ]
}

/// Raw shape of `orc_config.yaml`. Every field is optional so a partial
/// file only overrides the keys it names; unknown keys are ignored (with a
/// warning logged by the loader).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields = false)]
struct RawConfig {
    project_root: Option<String>,
    cache_dir: Option<String>,
    cache_ttl: Option<u64>,
    max_workers: Option<MaxWorkersValue>,
    ignore_patterns: Option<Vec<String>>,
    file_extensions: Option<Vec<String>>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MaxWorkersValue {
    Auto(String),
    Fixed(u64),
}

/// A read-only, fully-resolved configuration object. `project_root` and
/// `cache_dir` are always absolute; `max_workers` is `None` for "auto".
#[derive(Debug, Clone)]
pub struct Config {
    project_root: PathBuf,
    cache_dir: PathBuf,
    cache_ttl: u64,
    max_workers: Option<usize>,
    ignore_patterns: Vec<String>,
    file_extensions: HashSet<String>,
    log_level: String,
}

impl Config {
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_ttl(&self) -> u64 {
        self.cache_ttl
    }

    pub fn max_workers(&self) -> Option<usize> {
        self.max_workers
    }

    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    pub fn file_extensions(&self) -> &HashSet<String> {
        &self.file_extensions
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Loads config from `config_path` (defaulting to
    /// `<cwd>/orc_config.yaml`), then applies environment variable
    /// overrides, then normalizes and validates paths.
    pub fn load(config_path: Option<&Path>) -> OrcResult<Config> {
        let mut raw = RawConfig {
            project_root: Some(".".to_string()),
            cache_dir: Some(".orc/cache".to_string()),
            cache_ttl: Some(3600),
            max_workers: None,
            ignore_patterns: Some(default_ignore_patterns()),
            file_extensions: Some(default_file_extensions()),
            log_level: Some("INFO".to_string()),
        };

        let resolved_path = match config_path {
            Some(p) => p.to_path_buf(),
            None => env::current_dir()?.join("orc_config.yaml"),
        };

        if resolved_path.exists() {
            Self::load_yaml(&resolved_path, &mut raw)?;
        }

        Self::load_env_vars(&mut raw);

        Self::normalize(raw)
    }

    fn load_yaml(path: &Path, raw: &mut RawConfig) -> OrcResult<()> {
        let text = fs::read_to_string(path)
            .map_err(|e| OrcError::config(format!("cannot read config file {}: {e}", path.display())))?;

        let value: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| OrcError::config(format!("malformed YAML in {}: {e}", path.display())))?;

        let mapping = value.as_mapping().ok_or_else(|| {
            OrcError::config(format!(
                "config file must contain a YAML mapping, got {}",
                path.display()
            ))
        })?;

        for (key, value) in mapping {
            let Some(key) = key.as_str() else { continue };
            match key {
                "project_root" => raw.project_root = value.as_str().map(str::to_string),
                "cache_dir" => raw.cache_dir = value.as_str().map(str::to_string),
                "cache_ttl" => raw.cache_ttl = value.as_u64(),
                "max_workers" => {
                    raw.max_workers = if let Some(s) = value.as_str() {
                        Some(MaxWorkersValue::Auto(s.to_string()))
                    } else {
                        value.as_u64().map(MaxWorkersValue::Fixed)
                    }
                }
                "ignore_patterns" => {
                    if let Some(seq) = value.as_sequence() {
                        raw.ignore_patterns = Some(
                            seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                        );
                    }
                }
                "file_extensions" => {
                    if let Some(seq) = value.as_sequence() {
                        raw.file_extensions = Some(
                            seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                        );
                    }
                }
                "log_level" => raw.log_level = value.as_str().map(str::to_string),
                other => tracing::warn!(key = other, path = %path.display(), "unknown config key, ignoring"),
            }
        }

        tracing::debug!(path = %path.display(), "loaded configuration from file");
        Ok(())
    }

    fn load_env_vars(raw: &mut RawConfig) {
        if let Ok(v) = env::var("ORC_PROJECT_ROOT") {
            raw.project_root = Some(v);
        }
        if let Ok(v) = env::var("ORC_CACHE_DIR") {
            raw.cache_dir = Some(v);
        }
        if let Ok(v) = env::var("ORC_CACHE_TTL") {
            match v.parse::<u64>() {
                Ok(ttl) => raw.cache_ttl = Some(ttl),
                Err(_) => tracing::warn!(value = %v, "invalid ORC_CACHE_TTL, using previous value"),
            }
        }
        if let Ok(v) = env::var("ORC_MAX_WORKERS") {
            if v.eq_ignore_ascii_case("auto") {
                raw.max_workers = Some(MaxWorkersValue::Auto(v));
            } else {
                match v.parse::<u64>() {
                    Ok(n) => raw.max_workers = Some(MaxWorkersValue::Fixed(n)),
                    Err(_) => tracing::warn!(value = %v, "invalid ORC_MAX_WORKERS, using previous value"),
                }
            }
        }
        if let Ok(v) = env::var("ORC_LOG_LEVEL") {
            raw.log_level = Some(v);
        }
        if let Ok(v) = env::var("ORC_IGNORE_PATTERNS") {
            raw.ignore_patterns = Some(split_list(&v));
        }
        if let Ok(v) = env::var("ORC_FILE_EXTENSIONS") {
            raw.file_extensions = Some(split_list(&v));
        }
    }

    fn normalize(raw: RawConfig) -> OrcResult<Config> {
        let project_root_str = raw.project_root.unwrap_or_else(|| ".".to_string());
        let project_root = fs::canonicalize(&project_root_str).map_err(|_| {
            OrcError::config(format!("project root does not exist: {project_root_str}"))
        })?;
        if !project_root.is_dir() {
            return Err(OrcError::config(format!(
                "project root is not a directory: {}",
                project_root.display()
            )));
        }

        let cache_dir_str = raw.cache_dir.unwrap_or_else(|| ".orc/cache".to_string());
        let cache_dir_raw = PathBuf::from(&cache_dir_str);
        let cache_dir = if cache_dir_raw.is_absolute() {
            cache_dir_raw
        } else {
            project_root.join(cache_dir_raw)
        };
        fs::create_dir_all(&cache_dir).map_err(|e| {
            OrcError::config(format!("cannot create cache directory {}: {e}", cache_dir.display()))
        })?;

        let max_workers = match raw.max_workers {
            None => None,
            Some(MaxWorkersValue::Auto(_)) => None,
            Some(MaxWorkersValue::Fixed(n)) => Some(n as usize),
        };

        let config = Config {
            cache_ttl: raw.cache_ttl.unwrap_or(3600),
            max_workers,
            ignore_patterns: raw.ignore_patterns.unwrap_or_else(default_ignore_patterns),
            file_extensions: raw
                .file_extensions
                .unwrap_or_else(default_file_extensions)
                .into_iter()
                .collect(),
            log_level: raw.log_level.unwrap_or_else(|| "INFO".to_string()),
            project_root,
            cache_dir,
        };

        tracing::info!(project_root = %config.project_root.display(), "configuration loaded");
        Ok(config)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .replace(';', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `orc_config.yaml` text written by `orc init`: every default spelled
/// out explicitly so the file and `orc config show` agree from the first run.
pub fn default_yaml() -> String {
    let ignore_list = default_ignore_patterns().into_iter().map(|p| format!("  - \"{p}\"")).collect::<Vec<_>>().join("\n");
    let ext_list = default_file_extensions().into_iter().map(|p| format!("  - \"{p}\"")).collect::<Vec<_>>().join("\n");
    format!(
        "project_root: \".\"\ncache_dir: \".orc/cache\"\ncache_ttl: 3600\nmax_workers: \"auto\"\nlog_level: \"INFO\"\nignore_patterns:\n{ignore_list}\nfile_extensions:\n{ext_list}\n"
    )
}

/// The `.orcignore` text written by `orc init`: gitignore syntax, seeded
/// with the same defaults as `ignore_patterns` above.
pub fn default_orcignore() -> String {
    let mut lines = vec![
        "# ORC Ignore Patterns".to_string(),
        "# Files and directories to exclude from analysis".to_string(),
        String::new(),
    ];
    lines.extend(default_ignore_patterns());
    lines.push(String::new());
    lines.join("\n")
}

fn read_mapping(path: &Path) -> OrcResult<serde_yaml::Mapping> {
    if !path.exists() {
        return Ok(serde_yaml::Mapping::new());
    }
    let text = fs::read_to_string(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
    Ok(value.as_mapping().cloned().unwrap_or_default())
}

fn write_mapping(path: &Path, mapping: &serde_yaml::Mapping) -> OrcResult<()> {
    let text = serde_yaml::to_string(mapping)?;
    fs::write(path, text)?;
    Ok(())
}

/// Sets a single scalar key in `path`'s YAML mapping (creating the file as
/// an empty mapping first if it doesn't exist). `cache_ttl` and numeric
/// `max_workers` values are written as YAML integers; everything else,
/// including the `max_workers: auto` sentinel, as a string.
pub fn set_key(path: &Path, key: &str, value: &str) -> OrcResult<()> {
    let mut mapping = read_mapping(path)?;
    let yaml_value = match key {
        "cache_ttl" => value.parse::<u64>().map(Into::into).unwrap_or_else(|_| value.into()),
        "max_workers" if !value.eq_ignore_ascii_case("auto") => value.parse::<u64>().map(Into::into).unwrap_or_else(|_| value.into()),
        _ => serde_yaml::Value::from(value),
    };
    mapping.insert(serde_yaml::Value::from(key), yaml_value);
    write_mapping(path, &mapping)
}

/// Appends `pattern` to the YAML file's `ignore_patterns` list, creating the
/// list if absent. Distinct from `.orcignore`: this edits the config file's
/// own seed list rather than the gitignore-syntax sidecar.
pub fn add_ignore_pattern(path: &Path, pattern: &str) -> OrcResult<()> {
    let mut mapping = read_mapping(path)?;
    let key = serde_yaml::Value::from("ignore_patterns");
    let mut list = mapping.get(&key).and_then(|v| v.as_sequence()).cloned().unwrap_or_default();
    list.push(serde_yaml::Value::from(pattern));
    mapping.insert(key, serde_yaml::Value::Sequence(list));
    write_mapping(path, &mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("missing_orc_config.yaml"))).unwrap();
        assert_eq!(config.cache_ttl(), 3600);
        assert!(config.max_workers().is_none());
        assert!(config.ignore_patterns().contains(&"node_modules/".to_string()));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("orc_config.yaml");
        fs::write(&config_path, "cache_ttl: 42\nmax_workers: 4\n").unwrap();
        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.cache_ttl(), 42);
        assert_eq!(config.max_workers(), Some(4));
    }

    #[test]
    fn rejects_non_mapping_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("orc_config.yaml");
        fs::write(&config_path, "- one\n- two\n").unwrap();
        assert!(Config::load(Some(&config_path)).is_err());
    }

    #[test]
    fn split_list_handles_semicolons_and_commas() {
        assert_eq!(split_list("a, b; c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn default_yaml_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("orc_config.yaml");
        fs::write(&config_path, default_yaml()).unwrap();
        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.cache_ttl(), 3600);
        assert!(config.max_workers().is_none());
    }

    #[test]
    fn set_key_then_add_ignore_pattern_both_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("orc_config.yaml");
        set_key(&config_path, "cache_ttl", "120").unwrap();
        add_ignore_pattern(&config_path, "vendor/").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.cache_ttl(), 120);
        assert!(config.ignore_patterns().contains(&"vendor/".to_string()));
    }
}
