use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// Top-level editor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub teleport: TeleportConfig,
    #[serde(default)]
    pub project: Option<ProjectConfig>,
}

/// Undo/redo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of undo entries kept per tab.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default)]
    pub snap_to_grid: bool,
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            snap_to_grid: false,
            grid_size: default_grid_size(),
        }
    }
}

fn default_grid_size() -> f64 {
    15.0
}

/// Live file synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Enable file-backed node synchronization (default: true).
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    /// Interval for re-checking which nodes to watch, and for scanning
    /// files when `force_polling` is set.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Scan files instead of using native change notifications.
    #[serde(default)]
    pub force_polling: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            force_polling: false,
        }
    }
}

fn default_sync_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Teleporter presentation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportConfig {
    /// Colors assigned to teleporters that don't declare one, picked by name.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
        }
    }
}

fn default_palette() -> Vec<String> {
    [
        "#e57373", "#64b5f6", "#81c784", "#ffb74d", "#ba68c8", "#4db6ac", "#f06292", "#a1887f",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl TeleportConfig {
    /// Deterministic palette color for a teleporter name.
    pub fn color_for(&self, name: &str) -> String {
        if self.palette.is_empty() {
            return "#999999".to_string();
        }
        let hash = name
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        self.palette[hash % self.palette.len()].clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory that relative file-backed fields resolve against.
    pub path: String,
}

impl EditorConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WeftError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| WeftError::Config(e.to_string()))
    }

    /// Resolve the default project directory (expand ~).
    pub fn project_dir(&self) -> Option<PathBuf> {
        let path = &self.project.as_ref()?.path;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return Some(home.join(rest));
            }
        }
        Some(PathBuf::from(path))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_WEFT_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_WEFT_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_WEFT_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_WEFT_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_WEFT_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: EditorConfig = toml::from_str("").unwrap();
        assert_eq!(config.history.capacity, 50);
        assert!(!config.canvas.snap_to_grid);
        assert_eq!(config.canvas.grid_size, 15.0);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.poll_interval_ms, 500);
        assert!(!config.sync.force_polling);
        assert_eq!(config.teleport.palette.len(), 8);
        assert!(config.project_dir().is_none());
    }

    #[test]
    fn test_partial_sections() {
        let toml_str = r#"
[history]
capacity = 10

[canvas]
snap_to_grid = true

[project]
path = "/srv/flows"
"#;
        let config: EditorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.history.capacity, 10);
        assert!(config.canvas.snap_to_grid);
        assert_eq!(config.canvas.grid_size, 15.0);
        assert_eq!(config.project_dir(), Some(PathBuf::from("/srv/flows")));
    }

    #[test]
    fn test_palette_color_is_stable() {
        let teleport = TeleportConfig::default();
        assert_eq!(teleport.color_for("shared-ctx"), teleport.color_for("shared-ctx"));
        assert!(teleport.palette.contains(&teleport.color_for("anything")));

        let empty = TeleportConfig { palette: vec![] };
        assert_eq!(empty.color_for("x"), "#999999");
    }

    #[test]
    fn test_load_missing_file() {
        let err = EditorConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, WeftError::ConfigNotFound(_)));
    }
}
