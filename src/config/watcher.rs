use crate::config::{Config, ConfigHandle};
use crate::error::ConfigError;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Re-reads the configuration file when it changes on disk
///
/// Polled by the monitoring loop between cycles. A changed file that fails to
/// load or validate is rejected and the thresholds already in force stay
/// active.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Create a watcher, remembering the file's current modification time
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified_at(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the thresholds if the file changed since the last poll
    ///
    /// # Returns
    ///
    /// `Ok(true)` if new thresholds were installed, `Ok(false)` if the file
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` of a changed file that could not be used.
    /// The modification time is still recorded so a broken file is reported
    /// once, not on every poll.
    pub fn poll(&mut self, handle: &ConfigHandle) -> Result<bool, ConfigError> {
        let modified = modified_at(&self.path);
        if modified == self.last_modified {
            debug!("Configuration file unchanged: {}", self.path.display());
            return Ok(false);
        }
        self.last_modified = modified;

        info!("Configuration file changed, reloading: {}", self.path.display());
        let config = Config::from_file(&self.path)?;
        handle.replace(config.thresholds)?;
        Ok(true)
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_config(path: &Path, config: &Config) {
        std::fs::write(path, toml::to_string(config).unwrap()).unwrap();
    }

    fn bump_mtime(path: &Path) {
        // Filesystems with coarse timestamps need the clock to move on
        let file = std::fs::File::options().write(true).open(path).unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        file.set_modified(later).unwrap();
    }

    #[test]
    fn test_unchanged_file_is_not_reloaded() {
        let file = NamedTempFile::new().unwrap();
        write_config(file.path(), &Config::default());

        let handle = ConfigHandle::new(ThresholdConfig::default()).unwrap();
        let mut watcher = ConfigWatcher::new(file.path());
        assert!(!watcher.poll(&handle).unwrap());
    }

    #[test]
    fn test_changed_file_swaps_thresholds() {
        let file = NamedTempFile::new().unwrap();
        write_config(file.path(), &Config::default());

        let handle = ConfigHandle::new(ThresholdConfig::default()).unwrap();
        let mut watcher = ConfigWatcher::new(file.path());

        let mut updated = Config::default();
        updated.thresholds.crew.max_duty_hours = 48.0;
        write_config(file.path(), &updated);
        bump_mtime(file.path());

        assert!(watcher.poll(&handle).unwrap());
        assert_eq!(handle.load().crew.max_duty_hours, 48.0);
    }

    #[test]
    fn test_invalid_change_keeps_previous_thresholds() {
        let file = NamedTempFile::new().unwrap();
        write_config(file.path(), &Config::default());

        let handle = ConfigHandle::new(ThresholdConfig::default()).unwrap();
        let mut watcher = ConfigWatcher::new(file.path());

        let mut broken = Config::default();
        broken.thresholds.delay.weights.weather = 0.1;
        write_config(file.path(), &broken);
        bump_mtime(file.path());

        assert!(watcher.poll(&handle).is_err());
        assert_eq!(*handle.load(), ThresholdConfig::default());
        // Reported once, then treated as seen
        assert!(!watcher.poll(&handle).unwrap());
    }
}
