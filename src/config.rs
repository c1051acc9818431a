use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::matcher::{EligibilityPolicy, DEFAULT_DISTRICT_BLACKLIST};
use crate::models::Source;
use crate::scrapers::BrowserOptions;

const DEFAULT_DATABASE_URL: &str = "sqlite://flat-bot.db";
const DEFAULT_CHROME_PATH: &str = "/usr/bin/google-chrome";
const DEFAULT_RUN_INTERVAL_MINUTES: u64 = 5;

/// Distinguishes runtime behavior between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

/// Runtime configuration, read from the environment and an optional `.env`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub database_url: String,
    pub quiet: bool,
    pub chrome_path: Option<PathBuf>,
    pub district_blacklist: Vec<String>,
    pub sources: Vec<Source>,
    pub run_interval_minutes: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = if flag("PRODUCTION") {
            AppEnvironment::Production
        } else if flag("TEST") {
            AppEnvironment::Test
        } else {
            AppEnvironment::Development
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let district_blacklist = match env::var("DISTRICT_BLACKLIST") {
            Ok(value) => split_list(&value),
            Err(_) => DEFAULT_DISTRICT_BLACKLIST.iter().map(|d| d.to_string()).collect(),
        };

        let sources = match env::var("SOURCES") {
            Ok(value) => split_list(&value)
                .into_iter()
                .map(|name| name.parse().map_err(|_| ConfigError::UnknownSource(name)))
                .collect::<Result<Vec<Source>, _>>()?,
            Err(_) => Source::ALL.to_vec(),
        };

        let run_interval_minutes = match env::var("RUN_INTERVAL_MINUTES") {
            Ok(value) => parse_interval(&value)?,
            Err(_) => DEFAULT_RUN_INTERVAL_MINUTES,
        };

        Ok(Self {
            environment,
            database_url,
            quiet: flag("QUIET"),
            chrome_path: env::var("CHROME_PATH").ok().map(PathBuf::from),
            district_blacklist,
            sources,
            run_interval_minutes,
        })
    }

    pub fn browser_options(&self) -> BrowserOptions {
        match self.environment {
            AppEnvironment::Production => BrowserOptions::production(
                self.chrome_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CHROME_PATH)),
            ),
            AppEnvironment::Development | AppEnvironment::Test => BrowserOptions {
                executable: self.chrome_path.clone(),
                ..BrowserOptions::default()
            },
        }
    }

    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        EligibilityPolicy::new(self.district_blacklist.iter().cloned())
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn log_filter(&self, verbose: u8) -> &'static str {
        match verbose {
            0 if self.quiet || self.environment != AppEnvironment::Development => "warn",
            0 | 1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RUN_INTERVAL_MINUTES must be a positive number of minutes, got `{0}`")]
    InvalidInterval(String),

    #[error("SOURCES contains unknown source `{0}`")]
    UnknownSource(String),
}

fn parse_interval(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(ConfigError::InvalidInterval(value.to_string())),
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "DATABASE_URL",
            "PRODUCTION",
            "TEST",
            "QUIET",
            "CHROME_PATH",
            "DISTRICT_BLACKLIST",
            "SOURCES",
            "RUN_INTERVAL_MINUTES",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.database_url, "sqlite://flat-bot.db");
        assert!(!config.quiet);
        assert_eq!(config.sources, Source::ALL.to_vec());
        assert_eq!(config.run_interval_minutes, 5);
        assert_eq!(config.district_blacklist, vec!["Spandau", "Buch", "Steglitz-Zehlendorf"]);
        assert_eq!(config.browser_options(), BrowserOptions::default());
        assert_eq!(config.log_filter(0), "info");
    }

    #[test]
    fn production_uses_system_chrome_without_sandbox() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PRODUCTION", "true");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.environment, AppEnvironment::Production);
        let options = config.browser_options();
        assert_eq!(options.executable, Some(PathBuf::from("/usr/bin/google-chrome")));
        assert!(!options.sandbox);
        assert_eq!(config.log_filter(0), "warn");
        assert_eq!(config.log_filter(2), "debug");
    }

    #[test]
    fn reads_lists_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SOURCES", "wbm, degewo");
        env::set_var("DISTRICT_BLACKLIST", "Marzahn-Hellersdorf,  ,Reinickendorf");
        env::set_var("QUIET", "1");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.sources, vec![Source::Wbm, Source::Degewo]);
        assert_eq!(config.district_blacklist, vec!["Marzahn-Hellersdorf", "Reinickendorf"]);
        assert!(config.eligibility_policy().is_blacklisted(Some("Reinickendorf")));
        assert!(!config.eligibility_policy().is_blacklisted(Some("Spandau")));
        assert_eq!(config.log_filter(0), "warn");
    }

    #[test]
    fn rejects_unknown_source() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SOURCES", "degewo,vonovia");
        let result = AppConfig::load();
        reset_env();

        assert!(matches!(result, Err(ConfigError::UnknownSource(name)) if name == "vonovia"));
    }

    #[test]
    fn rejects_zero_interval() {
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("soon").is_err());
        assert_eq!(parse_interval(" 15 ").unwrap(), 15);
    }
}
