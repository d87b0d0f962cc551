use std::env;

use anyhow::{anyhow, Result};

use csv2thesis_core::{DEFAULT_MATCH_THRESHOLD, DEFAULT_TITLE_THRESHOLD};
use csv2thesis_extract::ExtractProvider;

/// Score at which a single top match is accepted without a question.
pub const AUTO_ACCEPT_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub provider: ExtractProvider,
    pub model: String,
    pub throttle_ms: u64,
    pub match_threshold: f64,
    pub title_threshold: f64,
}

impl ImportConfig {
    pub fn from_env() -> Result<Self> {
        let provider_name =
            env::var("CSV2THESIS_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());
        let provider = ExtractProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!(format!("unknown provider {provider_name}")))?;
        let model =
            env::var("CSV2THESIS_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
        let throttle_ms = env::var("CSV2THESIS_THROTTLE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(Self {
            provider,
            model,
            throttle_ms,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            title_threshold: DEFAULT_TITLE_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: Option<f64>) -> Result<Self> {
        if let Some(value) = threshold {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("--threshold must be between 0 and 1"));
            }
            self.match_threshold = value;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ImportConfig {
        ImportConfig {
            provider: ExtractProvider::Local,
            model: "local".to_string(),
            throttle_ms: 0,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            title_threshold: DEFAULT_TITLE_THRESHOLD,
        }
    }

    #[test]
    fn with_threshold_overrides_default() {
        let config = base().with_threshold(Some(0.9)).unwrap();
        assert_eq!(config.match_threshold, 0.9);
        let config = base().with_threshold(None).unwrap();
        assert_eq!(config.match_threshold, DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn with_threshold_rejects_out_of_range() {
        assert!(base().with_threshold(Some(1.5)).is_err());
        assert!(base().with_threshold(Some(-0.1)).is_err());
    }
}
