//! Validated runtime configuration for [`Downloader`](crate::Downloader).

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    READ_TIMEOUT_SECS, RetryPolicy,
};
use crate::engine::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::progress::PROGRESS_FILE_NAME;

/// Allowed range for attempts per page.
pub const ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Allowed range for connect and read timeouts, in seconds.
pub const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

/// Invalid configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is not an absolute http(s) URL.
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl {
        /// Rejected input.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A numeric setting is outside its allowed range.
    #[error("{field} = {value} is out of range ({min}..={max})")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Smallest allowed value.
        min: u64,
        /// Largest allowed value.
        max: u64,
    },

    /// The backoff cap is below the first delay.
    #[error("max delay {max:?} is shorter than base delay {base:?}")]
    DelayOrder {
        /// Base delay.
        base: Duration,
        /// Cap.
        max: Duration,
    },
}

/// Settings for one [`Downloader`](crate::Downloader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Site root; landing pages live at `{base_url}/book/{work_id}/`.
    pub base_url: Url,
    /// Units fetched at once.
    pub concurrency: usize,
    /// Attempts per page, including the first.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout.
    pub read_timeout_secs: u64,
    /// Progress file; `None` means `<output_dir>/download_progress.json`.
    pub progress_file: Option<PathBuf>,
}

impl DownloaderConfig {
    /// Default settings for the site at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless `base_url` is an
    /// absolute http or https URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            progress_file: None,
        })
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme(&self.base_url)?;
        check_range(
            "concurrency",
            to_u64(self.concurrency),
            to_u64(MIN_CONCURRENCY),
            to_u64(MAX_CONCURRENCY),
        )?;
        check_range(
            "max_attempts",
            u64::from(self.max_attempts),
            u64::from(*ATTEMPTS_RANGE.start()),
            u64::from(*ATTEMPTS_RANGE.end()),
        )?;
        check_range(
            "connect_timeout_secs",
            self.connect_timeout_secs,
            *TIMEOUT_SECS_RANGE.start(),
            *TIMEOUT_SECS_RANGE.end(),
        )?;
        check_range(
            "read_timeout_secs",
            self.read_timeout_secs,
            *TIMEOUT_SECS_RANGE.start(),
            *TIMEOUT_SECS_RANGE.end(),
        )?;
        if self.max_delay < self.base_delay {
            return Err(ConfigError::DelayOrder {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }

    /// Retry policy built from the attempt and delay settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay, self.max_delay)
    }

    /// Progress file to use for downloads into `output_dir`.
    #[must_use]
    pub fn progress_path(&self, output_dir: &Path) -> PathBuf {
        self.progress_file
            .clone()
            .unwrap_or_else(|| output_dir.join(PROGRESS_FILE_NAME))
    }
}

fn parse_base_url(input: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(input.trim()).map_err(|error| ConfigError::InvalidBaseUrl {
        url: input.to_string(),
        reason: error.to_string(),
    })?;
    check_scheme(&url)?;
    Ok(url)
}

fn check_scheme(url: &Url) -> Result<(), ConfigError> {
    if matches!(url.scheme(), "http" | "https") && url.has_host() {
        Ok(())
    } else {
        Err(ConfigError::InvalidBaseUrl {
            url: url.to_string(),
            reason: "expected an http or https URL with a host".to_string(),
        })
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DownloaderConfig::new("https://novels.example").unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(32));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.read_timeout_secs, 30);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.progress_path(Path::new("novels")),
            PathBuf::from("novels/download_progress.json")
        );
    }

    #[test]
    fn test_base_url_must_be_http() {
        assert!(matches!(
            DownloaderConfig::new("ftp://novels.example"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            DownloaderConfig::new("not a url"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_validate_reports_out_of_range_field() {
        let mut config = DownloaderConfig::new("https://novels.example").unwrap();
        config.concurrency = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "concurrency",
                value: 0,
                min: 1,
                max: 32
            })
        );

        config.concurrency = 4;
        config.max_attempts = 11;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "max_attempts", .. })
        ));

        config.max_attempts = 2;
        config.read_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "read_timeout_secs", .. })
        ));
    }

    #[test]
    fn test_delay_order() {
        let mut config = DownloaderConfig::new("https://novels.example").unwrap();
        config.max_delay = Duration::from_millis(500);
        assert!(matches!(config.validate(), Err(ConfigError::DelayOrder { .. })));
    }

    #[test]
    fn test_explicit_progress_file_wins() {
        let mut config = DownloaderConfig::new("https://novels.example").unwrap();
        config.progress_file = Some(PathBuf::from("/state/progress.json"));
        assert_eq!(
            config.progress_path(Path::new("novels")),
            PathBuf::from("/state/progress.json")
        );
        assert_eq!(config.retry_policy().max_attempts(), 3);
    }
}
