use std::path::{Path, PathBuf};

use taskpilot::AppConfig;

pub struct CliContext {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The file the configuration was read from, if one existed.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
