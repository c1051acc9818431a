use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::LaunchOptions;
use serde::{Deserialize, Serialize};

/// Launch parameters for the headless browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserOptions {
    /// Run Chrome without a window
    pub headless: bool,
    /// Chrome executable; `None` lets headless_chrome find or fetch one
    pub executable: Option<PathBuf>,
    /// Chrome's sandbox does not work inside most containers
    pub sandbox: bool,
    /// Seconds without CDP traffic before Chrome is considered gone
    pub idle_timeout_secs: u64,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            sandbox: true,
            idle_timeout_secs: 300,
        }
    }
}

impl BrowserOptions {
    /// Launch parameters used on the production host
    pub fn production(executable: PathBuf) -> Self {
        Self {
            executable: Some(executable),
            sandbox: false,
            ..Self::default()
        }
    }

    pub fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(self.sandbox)
            .path(self.executable.clone())
            .idle_browser_timeout(Duration::from_secs(self.idle_timeout_secs))
            .build()
            .context("Failed to build launch options")
    }
}
