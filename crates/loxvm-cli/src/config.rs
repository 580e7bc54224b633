//! Layered project configuration for the `loxvm` driver.
//!
//! Mirrors `faxt`'s `Config`: a `serde`+`toml` struct with per-field
//! defaults, discovered by searching the current directory, then the
//! user's home config, then the system config directory
//! (`SPEC_FULL.md` §10.3). `main.rs` merges the loaded file with whatever
//! the CLI flags override, flags winning.

use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "loxvm.toml";

/// Application configuration: the VM tuning knobs `SPEC_FULL.md` §10.3
/// names explicitly (GC growth factor, initial threshold, stack/frame
/// capacity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Global verbose setting.
    #[serde(default)]
    pub verbose: bool,

    /// GC settings.
    #[serde(default)]
    pub gc: GcConfig,

    /// Call-frame/value-stack capacity settings.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// GC-specific configuration options (`spec.md` §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GcConfig {
    /// Allocation-byte threshold that triggers the first collection.
    #[serde(default = "default_gc_initial_threshold")]
    pub initial_threshold: usize,

    /// Multiplier applied to live bytes to compute the next threshold.
    #[serde(default = "default_gc_growth_factor")]
    pub growth_factor: usize,
}

/// Call-frame/value-stack capacity options (`spec.md` §4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Maximum live call frames before `"Stack overflow."`.
    #[serde(default = "default_frames_max")]
    pub frames_max: usize,

    /// Initial value-stack capacity hint.
    #[serde(default = "default_stack_capacity_hint")]
    pub stack_capacity_hint: usize,
}

fn default_gc_initial_threshold() -> usize {
    loxvm_util::GC_INITIAL_THRESHOLD
}

fn default_gc_growth_factor() -> usize {
    loxvm_util::GC_GROWTH_FACTOR
}

fn default_frames_max() -> usize {
    loxvm_util::FRAMES_MAX
}

fn default_stack_capacity_hint() -> usize {
    loxvm_util::STACK_MAX
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            gc: GcConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: default_gc_initial_threshold(),
            growth_factor: default_gc_growth_factor(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            frames_max: default_frames_max(),
            stack_capacity_hint: default_stack_capacity_hint(),
        }
    }
}

impl Config {
    /// Turn this merged configuration into the `Vm`'s runtime limits.
    pub fn to_vm_config(&self) -> loxvm_vm::VmConfig {
        loxvm_vm::VmConfig {
            frames_max: self.limits.frames_max,
            stack_capacity_hint: self.limits.stack_capacity_hint,
            gc_initial_threshold: self.gc.initial_threshold,
            gc_growth_factor: self.gc.growth_factor,
        }
    }

    /// Load configuration from the default search locations, falling back
    /// to built-in defaults if no file is found anywhere.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("failed to serialize configuration: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("loxvm").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("loxvm").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::check_current_dir_config()
            .or_else(Self::check_home_config)
            .or_else(Self::check_system_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> Config {
        Config {
            verbose: true,
            gc: GcConfig { initial_threshold: 4096, growth_factor: 3 },
            limits: LimitsConfig { frames_max: 32, stack_capacity_hint: 8192 },
        }
    }

    #[test]
    fn default_config_matches_loxvm_util_constants() {
        let config = Config::default();
        assert_eq!(config.gc.initial_threshold, loxvm_util::GC_INITIAL_THRESHOLD);
        assert_eq!(config.gc.growth_factor, loxvm_util::GC_GROWTH_FACTOR);
        assert_eq!(config.limits.frames_max, loxvm_util::FRAMES_MAX);
    }

    #[test]
    fn config_save_and_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let original = sample_config();
        original.save_to_path(&config_path).unwrap();
        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn load_from_nonexistent_path_errors() {
        let result = Config::load_from_path(Path::new("/nonexistent/path/loxvm.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn to_vm_config_carries_every_field() {
        let config = sample_config();
        let vm_config = config.to_vm_config();
        assert_eq!(vm_config.frames_max, 32);
        assert_eq!(vm_config.stack_capacity_hint, 8192);
        assert_eq!(vm_config.gc_initial_threshold, 4096);
        assert_eq!(vm_config.gc_growth_factor, 3);
    }
}
