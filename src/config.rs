//! Process configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::scrapers::{SiteConfig, eventbrite};
use crate::traits::SessionConfig;

/// Everything the binary needs to run the pipeline and serve it
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Site profile, with the listing location applied
    pub site: SiteConfig,
    /// Browser session settings
    pub session: SessionConfig,
    /// Detail pages visited at once
    pub concurrency: usize,
    /// Delay before the first refresh after startup
    pub startup_delay: Duration,
    /// Time between scheduled refreshes
    pub refresh_interval: Duration,
    /// Pause after the listing page reaches network idle
    pub listing_settle: Duration,
    /// Pause after a detail page reaches DOM ready
    pub detail_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            site: eventbrite(),
            session: SessionConfig::default(),
            concurrency: 3,
            startup_delay: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(30 * 60),
            listing_settle: Duration::from_secs(3),
            detail_settle: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = parse(&get, "PORT")? {
            config.port = port;
        }
        if let Some(location) = get("EVENT_LOCATION") {
            config.site.location = location;
        }
        config.session.executable = get("CHROME_EXECUTABLE_PATH")
            .or_else(|| get("PUPPETEER_EXECUTABLE_PATH"))
            .map(PathBuf::from);
        if let Some(width) = parse::<usize>(&get, "SCRAPE_CONCURRENCY")? {
            config.concurrency = width.max(1);
        }
        if let Some(secs) = parse(&get, "REFRESH_STARTUP_DELAY_SECS")? {
            config.startup_delay = Duration::from_secs(secs);
        }
        if let Some(mins) = parse::<u64>(&get, "REFRESH_INTERVAL_MINS")? {
            config.refresh_interval = interval_from_minutes(mins)?;
        }

        Ok(config)
    }
}

fn interval_from_minutes(mins: u64) -> Result<Duration> {
    if mins == 0 {
        bail!("REFRESH_INTERVAL_MINS must be at least 1");
    }
    mins.checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("REFRESH_INTERVAL_MINS is too large, got {mins}"))
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{key} must be a number, got {raw:?}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_map(&[]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.startup_delay, Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.session.default_timeout, Duration::from_secs(60));
        assert_eq!(config.session.listing_timeout, Duration::from_secs(120));
        assert!(config.session.disable_sandbox);
        assert!(config.session.executable.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("PORT", "8080"),
            ("EVENT_LOCATION", "australia--melbourne"),
            ("PUPPETEER_EXECUTABLE_PATH", "/usr/bin/google-chrome-stable"),
            ("SCRAPE_CONCURRENCY", "5"),
            ("REFRESH_STARTUP_DELAY_SECS", "1"),
            ("REFRESH_INTERVAL_MINS", "10"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.site.listing_url(),
            "https://www.eventbrite.com/d/australia--melbourne/events/"
        );
        assert_eq!(
            config.session.executable,
            Some(PathBuf::from("/usr/bin/google-chrome-stable"))
        );
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.startup_delay, Duration::from_secs(1));
        assert_eq!(config.refresh_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_chrome_path_takes_precedence() {
        let config = from_map(&[
            ("CHROME_EXECUTABLE_PATH", "/opt/chromium/chrome"),
            ("PUPPETEER_EXECUTABLE_PATH", "/usr/bin/google-chrome-stable"),
        ])
        .unwrap();
        assert_eq!(config.session.executable, Some(PathBuf::from("/opt/chromium/chrome")));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = from_map(&[("SCRAPE_CONCURRENCY", "0")]).unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = from_map(&[("REFRESH_INTERVAL_MINS", "0")]).unwrap_err();
        assert!(err.to_string().contains("REFRESH_INTERVAL_MINS"));
    }

    #[test]
    fn test_overflowing_interval_is_rejected() {
        let err = from_map(&[("REFRESH_INTERVAL_MINS", u64::MAX.to_string().as_str())]).unwrap_err();
        assert!(err.to_string().contains("REFRESH_INTERVAL_MINS"));
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = from_map(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
