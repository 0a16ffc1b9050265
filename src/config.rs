use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{ImagenError, Result};
use crate::models::ResponseFormat;

pub const DEFAULT_BASE_URL: &str = "https://api.thucchien.ai/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub const ENV_BASE_URL: &str = "LITELLM_BASE_URL";
pub const ENV_API_KEY: &str = "LITELLM_API_KEY";
pub const ENV_MODEL: &str = "IMAGEN_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "IMAGEN_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "IMAGEN_MAX_RETRIES";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn generations_url(&self) -> String {
        format!("{}/images/generations", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Which of the two request shapes to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProfileKind {
    /// One image per scene, inline base64 requested explicitly.
    Scene,
    /// One multi-scene prompt, several images, provider default format.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationProfile {
    pub model: String,
    pub image_count: u32,
    pub response_format: Option<ResponseFormat>,
}

impl GenerationProfile {
    pub fn scene() -> Self {
        Self {
            model: "imagen-2.0".to_string(),
            image_count: 1,
            response_format: Some(ResponseFormat::B64Json),
        }
    }

    pub fn batch() -> Self {
        Self {
            model: "imagen-4".to_string(),
            image_count: 4,
            response_format: None,
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Scene => Self::scene(),
            ProfileKind::Batch => Self::batch(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Clamped to at least one image.
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count.max(1);
        self
    }

    pub fn with_response_format(mut self, format: Option<ResponseFormat>) -> Self {
        self.response_format = format;
        self
    }
}

impl Default for GenerationProfile {
    fn default() -> Self {
        Self::scene()
    }
}

/// Retry policy for transport errors. Response-shape, parse and persistence
/// errors are never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_interval.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(self.max_interval.as_millis() as f64) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct ImagenConfig {
    pub credentials: Credentials,
    pub profile: GenerationProfile,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ImagenConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            profile: GenerationProfile::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_env(kind: ProfileKind) -> Result<Self> {
        Self::from_lookup(kind, |key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. `LITELLM_API_KEY` is
    /// required; everything else has a default.
    pub fn from_lookup<F>(kind: ProfileKind, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(ENV_API_KEY).ok_or_else(|| {
            ImagenError::Config(format!(
                "{} is not set; refusing to call the image API without a key",
                ENV_API_KEY
            ))
        })?;
        let base_url = non_empty(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut profile = GenerationProfile::for_kind(kind);
        if let Some(model) = non_empty(ENV_MODEL) {
            profile = profile.with_model(model.trim());
        }

        let timeout_secs = parse_number(ENV_TIMEOUT_SECS, non_empty(ENV_TIMEOUT_SECS))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ImagenError::Config(format!(
                "{} must be greater than zero",
                ENV_TIMEOUT_SECS
            )));
        }
        let max_retries = parse_number(ENV_MAX_RETRIES, non_empty(ENV_MAX_RETRIES))?
            .map(|n| {
                u32::try_from(n).map_err(|_| {
                    ImagenError::Config(format!("{} is too large: {}", ENV_MAX_RETRIES, n))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_RETRIES);

        Ok(Self {
            credentials: Credentials::new(base_url.trim(), api_key.trim()),
            profile,
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig::default().with_max_retries(max_retries),
        })
    }

    pub fn with_profile(mut self, profile: GenerationProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_number(key: &str, value: Option<String>) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| {
                ImagenError::Config(format!("{} must be a whole number, got '{}'", key, v))
            })
        })
        .transpose()
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
    fn test_missing_api_key_fails_fast() {
        let err = ImagenConfig::from_lookup(ProfileKind::Scene, lookup(&[])).unwrap_err();
        assert!(matches!(err, ImagenError::Config(_)));
        assert!(err.to_string().contains(ENV_API_KEY));

        let blank = ImagenConfig::from_lookup(ProfileKind::Scene, lookup(&[(ENV_API_KEY, "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn test_defaults() {
        let config =
            ImagenConfig::from_lookup(ProfileKind::Scene, lookup(&[(ENV_API_KEY, "sk-test")]))
                .unwrap();
        assert_eq!(config.credentials.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.credentials.api_key, "sk-test");
        assert_eq!(config.profile, GenerationProfile::scene());
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_overrides() {
        let config = ImagenConfig::from_lookup(
            ProfileKind::Batch,
            lookup(&[
                (ENV_API_KEY, "sk-test"),
                (ENV_BASE_URL, "http://localhost:4000/v1/"),
                (ENV_MODEL, "imagen-3"),
                (ENV_TIMEOUT_SECS, "15"),
                (ENV_MAX_RETRIES, "0"),
            ]),
        )
        .unwrap();
        assert_eq!(
            config.credentials.generations_url(),
            "http://localhost:4000/v1/images/generations"
        );
        assert_eq!(config.profile.model, "imagen-3");
        assert_eq!(config.profile.image_count, 4);
        assert_eq!(config.profile.response_format, None);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        let cases = [
            (ENV_TIMEOUT_SECS, "soon"),
            (ENV_TIMEOUT_SECS, "0"),
            (ENV_MAX_RETRIES, "-1"),
            (ENV_MAX_RETRIES, "4294967296"),
        ];
        for (key, value) in cases {
            let result = ImagenConfig::from_lookup(
                ProfileKind::Scene,
                lookup(&[(ENV_API_KEY, "sk-test"), (key, value)]),
            );
            assert!(matches!(result, Err(ImagenError::Config(_))), "{}={}", key, value);
        }
    }

    #[test]
    fn test_profiles() {
        let scene = GenerationProfile::scene();
        assert_eq!(scene.model, "imagen-2.0");
        assert_eq!(scene.image_count, 1);
        assert_eq!(scene.response_format, Some(ResponseFormat::B64Json));

        let batch = GenerationProfile::batch().with_image_count(0);
        assert_eq!(batch.model, "imagen-4");
        assert_eq!(batch.image_count, 1);
    }

    #[test]
    fn test_retry_delays_grow_and_cap() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(2), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(3), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(20), Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new(DEFAULT_BASE_URL, "sk-secret");
        assert!(!format!("{:?}", creds).contains("sk-secret"));
    }
}
