//! Configuration management for Kasa Learn

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::quiz::assembly::DEFAULT_MAX_QUESTIONS;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted learning backend
    pub backend_url: String,

    /// API key for the backend (sent as apikey + bearer token)
    pub api_key: String,

    /// Learner id used for attempts and progression
    pub user_id: String,

    /// Upper bound on questions administered per attempt
    pub max_quiz_questions: usize,

    /// Per-request network budget in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            user_id: "demo-learner".to_string(),
            max_quiz_questions: DEFAULT_MAX_QUESTIONS,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", "kasa-learn")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_bounds_questions_at_ten() {
        let config = Config::default();
        assert_eq!(config.max_quiz_questions, 10);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.backend_url, config.backend_url);
        assert_eq!(back.max_quiz_questions, config.max_quiz_questions);
    }

    #[test]
    fn config_deserializes_from_explicit_json() {
        let json = r#"{
            "backend_url": "https://kasa.example.co",
            "api_key": "anon",
            "user_id": "u-7",
            "max_quiz_questions": 7,
            "request_timeout_secs": 5
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_quiz_questions, 7);
        assert_eq!(config.user_id, "u-7");
    }
}
