//! Application configuration

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub imaging: ImagingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log files older than this are removed at startup
    pub log_retention_days: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_retention_days: 7 }
    }
}

/// Cache window and background loading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Neighbours on each side warmed in the background
    pub preload_depth: usize,
    /// Neighbours on each side kept cached; must be >= preload_depth
    pub cleanup_safe_range: usize,
    pub preload_workers: usize,
    pub preload_queue_capacity: usize,
    /// Extra directories searched for native HDR/EXR decoder libraries
    pub native_library_dirs: Vec<PathBuf>,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            preload_depth: 2,
            cleanup_safe_range: 3,
            preload_workers: 2,
            preload_queue_capacity: 32,
            native_library_dirs: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the per-user config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::info!("Configuration loaded from {:?}", path);
            Ok(config.validated())
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the per-user config file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("com", "Lumen", "Lumen")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Repair inconsistent settings.
    ///
    /// A preload depth beyond the safe range would warm images only for the
    /// next cleanup to evict them, so it is clamped.
    pub fn validated(mut self) -> Self {
        let imaging = &mut self.imaging;

        if imaging.preload_depth > imaging.cleanup_safe_range {
            tracing::warn!(
                "preload_depth {} exceeds cleanup_safe_range {}; clamping",
                imaging.preload_depth,
                imaging.cleanup_safe_range
            );
            imaging.preload_depth = imaging.cleanup_safe_range;
        }

        if imaging.preload_workers == 0 {
            tracing::warn!("preload_workers must be at least 1");
            imaging.preload_workers = 1;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.imaging.preload_depth, 2);
        assert_eq!(config.imaging.cleanup_safe_range, 3);
        assert_eq!(config.general.log_retention_days, 7);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str("[imaging]\npreload_workers = 4\n").unwrap();
        assert_eq!(config.imaging.preload_workers, 4);
        assert_eq!(config.imaging.preload_depth, 2);
        assert_eq!(config.general, GeneralConfig::default());
    }

    #[test]
    fn test_depth_clamped_to_safe_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[imaging]\npreload_depth = 5\ncleanup_safe_range = 1\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.imaging.preload_depth, 1);
        assert_eq!(config.imaging.cleanup_safe_range, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.imaging.native_library_dirs.push(PathBuf::from("/opt/lumen/lib"));
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
