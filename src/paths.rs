// File: src/paths.rs
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const CONFIG_DIR_ENV: &str = "GRADECAL_CONFIG_DIR";
pub const SETTINGS_FILE_NAME: &str = "engine.toml";

pub struct AppPaths;

impl AppPaths {
    fn get_proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "gradecal", "gradecal")
    }

    /// Helper to ensure a directory exists before returning it.
    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }

    /// Environment override first, then the OS default.
    fn resolve_config_dir() -> Option<PathBuf> {
        if let Ok(dir) = env::var(CONFIG_DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Some(PathBuf::from(dir));
        }
        let proj = Self::get_proj_dirs()?;
        Some(proj.config_dir().to_path_buf())
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let path = Self::resolve_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::ensure_exists(path)
    }

    pub fn get_settings_file_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join(SETTINGS_FILE_NAME))
    }
}
