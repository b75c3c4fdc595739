use crate::crawler::{CrawlSettings, HarvestSettings};
use crate::proxy::DEFAULT_PROXY_SOURCE;
use crate::site::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub use_proxies: bool,
    #[serde(default = "default_proxy_source_url")]
    pub proxy_source_url: String,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_rotation_probability")]
    pub rotation_probability: f64,
    #[serde(default = "default_rotation_pause_ms")]
    pub rotation_pause_ms: u64,
    #[serde(default = "default_dwell_seconds")]
    pub dwell_seconds: Vec<u64>,
    #[serde(default = "default_decoy_probability")]
    pub decoy_probability: f64,
    #[serde(default = "default_load_more_pause_ms")]
    pub load_more_pause_ms: u64,
    #[serde(default = "default_max_load_more_clicks")]
    pub max_load_more_clicks: usize,
    #[serde(default = "default_control_timeout_secs")]
    pub control_timeout_secs: u64,
    #[serde(default = "default_ids_timeout_secs")]
    pub ids_timeout_secs: u64,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_site_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

fn default_proxy_source_url() -> String {
    DEFAULT_PROXY_SOURCE.to_string()
}

fn default_sample_size() -> usize {
    20
}

fn default_rotation_probability() -> f64 {
    0.25
}

fn default_rotation_pause_ms() -> u64 {
    2000
}

fn default_dwell_seconds() -> Vec<u64> {
    vec![3, 4, 5, 6]
}

fn default_decoy_probability() -> f64 {
    0.5
}

fn default_load_more_pause_ms() -> u64 {
    3000
}

fn default_max_load_more_clicks() -> usize {
    200
}

fn default_control_timeout_secs() -> u64 {
    10
}

fn default_ids_timeout_secs() -> u64 {
    30
}

fn default_output_path() -> String {
    "data/results.csv".to_string()
}

fn default_database_path() -> String {
    "data/matches.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tracing_level: default_tracing_level(),
            webdriver_url: default_webdriver_url(),
            site_base_url: default_site_base_url(),
            headless: false,
            user_agent: default_user_agent(),
            use_proxies: true,
            proxy_source_url: default_proxy_source_url(),
            sample_size: default_sample_size(),
            rotation_probability: default_rotation_probability(),
            rotation_pause_ms: default_rotation_pause_ms(),
            dwell_seconds: default_dwell_seconds(),
            decoy_probability: default_decoy_probability(),
            load_more_pause_ms: default_load_more_pause_ms(),
            max_load_more_clicks: default_max_load_more_clicks(),
            control_timeout_secs: default_control_timeout_secs(),
            ids_timeout_secs: default_ids_timeout_secs(),
            output_path: default_output_path(),
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Reads the YAML file at `path`, then applies environment overrides.
    /// Fails when the file does not exist so the caller can write a starter one.
    pub fn load(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let mut config: Config = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path))?;

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEBDRIVER_URL") {
            self.webdriver_url = url;
        }

        if let Some(url) = lookup("SITE_BASE_URL") {
            self.site_base_url = url;
        }

        if let Some(sample_size) = lookup("SAMPLE_SIZE") {
            self.sample_size = sample_size
                .parse()
                .context("Failed to parse SAMPLE_SIZE environment variable")?;
        }

        if let Some(probability) = lookup("ROTATION_PROBABILITY") {
            self.rotation_probability = probability
                .parse()
                .context("Failed to parse ROTATION_PROBABILITY environment variable")?;
        }

        if let Some(probability) = lookup("DECOY_PROBABILITY") {
            self.decoy_probability = probability
                .parse()
                .context("Failed to parse DECOY_PROBABILITY environment variable")?;
        }

        if let Some(use_proxies) = lookup("USE_PROXIES") {
            self.use_proxies = use_proxies
                .parse()
                .context("Failed to parse USE_PROXIES environment variable")?;
        }

        if let Some(headless) = lookup("HEADLESS") {
            self.headless = headless
                .parse()
                .context("Failed to parse HEADLESS environment variable")?;
        }

        if let Some(tracing_level) = lookup("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        if let Some(user_agent) = lookup("USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Some(output_path) = lookup("OUTPUT_PATH") {
            self.output_path = output_path;
        }

        if let Some(database_path) = lookup("DATABASE_PATH") {
            self.database_path = database_path;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.rotation_probability) {
            anyhow::bail!(
                "rotation_probability must be between 0 and 1, got {}",
                self.rotation_probability
            );
        }

        if !(0.0..=1.0).contains(&self.decoy_probability) {
            anyhow::bail!(
                "decoy_probability must be between 0 and 1, got {}",
                self.decoy_probability
            );
        }

        if self.webdriver_url.is_empty() {
            anyhow::bail!("webdriver_url is required (set via config file or WEBDRIVER_URL env var)");
        }

        if self.site_base_url.is_empty() {
            anyhow::bail!("site_base_url is required (set via config file or SITE_BASE_URL env var)");
        }

        Ok(())
    }

    pub fn create_default(path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            sample_size: self.sample_size,
            rotation_probability: self.rotation_probability,
            rotation_pause: Duration::from_millis(self.rotation_pause_ms),
            harvest: HarvestSettings {
                control_timeout: Duration::from_secs(self.control_timeout_secs),
                ids_timeout: Duration::from_secs(self.ids_timeout_secs),
                load_more_pause: Duration::from_millis(self.load_more_pause_ms),
                max_load_more_clicks: self.max_load_more_clicks,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str("sample_size: 5\nheadless: true\n").unwrap();
        assert_eq!(config.sample_size, 5);
        assert!(config.headless);
        assert_eq!(config.rotation_probability, 0.25);
        assert_eq!(config.dwell_seconds, vec![3, 4, 5, 6]);
        assert_eq!(config.site_base_url, "https://www.flashscore.com");
        assert!(config.use_proxies);
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("SAMPLE_SIZE", "7"),
                ("USE_PROXIES", "false"),
                ("ROTATION_PROBABILITY", "0.5"),
                ("OUTPUT_PATH", "out/run.json"),
            ]))
            .unwrap();

        assert_eq!(config.sample_size, 7);
        assert!(!config.use_proxies);
        assert_eq!(config.rotation_probability, 0.5);
        assert_eq!(config.output_path, "out/run.json");
        assert_eq!(config.database_path, "data/matches.db");
    }

    #[test]
    fn test_unparsable_override_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[("SAMPLE_SIZE", "twenty")]))
            .unwrap_err();
        assert!(err.to_string().contains("SAMPLE_SIZE"));
    }

    #[test]
    fn test_probabilities_must_be_in_unit_range() {
        let config = Config {
            rotation_probability: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            decoy_probability: -0.1,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_crawl_settings_carry_durations() {
        let config = Config {
            rotation_pause_ms: 1500,
            load_more_pause_ms: 0,
            ..Config::default()
        };
        let settings = config.crawl_settings();
        assert_eq!(settings.sample_size, 20);
        assert_eq!(settings.rotation_pause, Duration::from_millis(1500));
        assert_eq!(settings.harvest.load_more_pause, Duration::ZERO);
        assert_eq!(settings.harvest.ids_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_create_default_writes_starter_file() {
        let dir = std::env::temp_dir().join(format!("matchcrawler-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.yaml");
        let path_str = path.to_str().unwrap();

        assert!(Config::load(path_str).is_err());
        Config::create_default(path_str).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("webdriver_url"));

        fs::remove_dir_all(dir).unwrap();
    }
}
