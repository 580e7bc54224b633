//! `init` command: scaffold a fresh `loxvm.toml` project config, the way
//! `faxt init` scaffolds a `faxt.toml` (`SPEC_FULL.md` §10.3).

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE_NAME};
use crate::error::{CliError, Result};

/// Arguments for the `init` command.
#[derive(Debug, Clone, Default)]
pub struct InitArgs {
    pub verbose: bool,
    /// Overwrite an existing `loxvm.toml` rather than erroring.
    pub force: bool,
    /// Directory to initialize (default: current directory).
    pub path: Option<PathBuf>,
}

/// Create `loxvm.toml` with built-in defaults at `args.path` (or the
/// current directory), refusing to overwrite an existing file unless
/// `args.force` is set.
pub fn run(args: InitArgs) -> Result<()> {
    let target = args.path.clone().unwrap_or_else(|| PathBuf::from("."));
    ensure_directory(&target)?;

    let config_path = target.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        return Err(CliError::Validation(format!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        )));
    }

    Config::default().save_to_path(&config_path)?;
    if args.verbose {
        log::info!("wrote {}", config_path.display());
    }
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        return Ok(());
    }
    if !path.is_dir() {
        return Err(CliError::Validation(format!("{} is not a directory", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_writes_a_default_config_in_an_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let args = InitArgs { path: Some(temp_dir.path().to_path_buf()), ..Default::default() };

        run(args).unwrap();

        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        assert!(config_path.exists());
        let loaded = Config::load_from_path(&config_path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let args = InitArgs { path: Some(temp_dir.path().to_path_buf()), ..Default::default() };
        run(args.clone()).unwrap();

        let result = run(args);
        assert!(matches!(result, Err(CliError::Validation(_))));
    }

    #[test]
    fn init_with_force_overwrites_an_existing_config() {
        let temp_dir = TempDir::new().unwrap();
        let args = InitArgs { path: Some(temp_dir.path().to_path_buf()), ..Default::default() };
        run(args.clone()).unwrap();

        let forced = InitArgs { force: true, ..args };
        assert!(run(forced).is_ok());
    }

    #[test]
    fn init_creates_the_target_directory_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested/project");
        let args = InitArgs { path: Some(nested.clone()), ..Default::default() };

        run(args).unwrap();
        assert!(nested.join(CONFIG_FILE_NAME).exists());
    }
}
