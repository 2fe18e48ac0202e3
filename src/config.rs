//! Configuration management for the portal worker

use crate::error::{Result, PortalError};
use worker::Env;

/// Portal configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (production, staging, development)
    pub environment: String,

    /// Log level
    pub log_level: String,

    /// Gemini API
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub enable_grounding: bool, // Attach the googleSearch tool to analysis/news

    /// Account gating
    pub default_license: String,           // Seeded when no license is stored yet
    pub request_code_prefix: String,       // "AXQ" -> AXQ-1234
    pub admin_bootstrap_secret: Option<String>,
    pub session_ttl_hours: u64,            // 0 = sessions never expire

    /// News
    pub admin_command: String,             // Typed into news search to open the admin view
    pub news_default_query: String,
    pub news_article_count: usize,

    /// Client polling while an account is pending
    pub status_poll_seconds: u64,
}

impl Config {
    /// Load configuration from Cloudflare environment variables and secrets
    pub fn from_env(env: &Env) -> Result<Self> {
        let config = Self::from_lookup(|key| match key {
            "GEMINI_API_KEY" | "ADMIN_BOOTSTRAP_SECRET" => {
                env.secret(key).ok().map(|v| v.to_string())
            }
            _ => env.var(key).ok().map(|v| v.to_string()),
        });
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from any key lookup, applying defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            environment: text("ENVIRONMENT", "production"),

            log_level: text("LOG_LEVEL", "info").to_lowercase(),

            gemini_api_key: secret("GEMINI_API_KEY"),

            gemini_model: text("GEMINI_MODEL", "gemini-3-pro-preview"),

            gemini_base_url: text("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com")
                .trim_end_matches('/')
                .to_string(),

            enable_grounding: lookup("ENABLE_GROUNDING")
                .map(|v| v.trim().to_lowercase() == "true")
                .unwrap_or(true),

            default_license: text("DEFAULT_LICENSE", "AXQ-GOLD-2025").to_uppercase(),

            request_code_prefix: text("REQUEST_CODE_PREFIX", "AXQ"),

            admin_bootstrap_secret: secret("ADMIN_BOOTSTRAP_SECRET"),

            session_ttl_hours: lookup("SESSION_TTL_HOURS")
                .map(|v| v.trim().parse().unwrap_or(0))
                .unwrap_or(0),

            admin_command: text("ADMIN_COMMAND", "/admin"),

            news_default_query: text("NEWS_DEFAULT_QUERY", "Forex, Crypto, Gold"),

            news_article_count: lookup("NEWS_ARTICLE_COUNT")
                .map(|v| v.trim().parse().unwrap_or(6))
                .unwrap_or(6),

            status_poll_seconds: lookup("STATUS_POLL_SECONDS")
                .map(|v| v.trim().parse().unwrap_or(5))
                .unwrap_or(5),
        }
    }

    /// Whether debug lines should be logged
    pub fn debug_enabled(&self) -> bool {
        self.log_level == "debug"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.gemini_model.is_empty() {
            return Err(PortalError::Config("GEMINI_MODEL must not be empty".into()));
        }
        if self.news_article_count == 0 {
            return Err(PortalError::Config("NEWS_ARTICLE_COUNT must be positive".into()));
        }
        if self.default_license.is_empty() {
            return Err(PortalError::Config("DEFAULT_LICENSE must not be empty".into()));
        }
        if self.status_poll_seconds == 0 {
            return Err(PortalError::Config("STATUS_POLL_SECONDS must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.environment, "production");
        assert_eq!(config.gemini_model, "gemini-3-pro-preview");
        assert_eq!(config.default_license, "AXQ-GOLD-2025");
        assert_eq!(config.request_code_prefix, "AXQ");
        assert_eq!(config.admin_command, "/admin");
        assert_eq!(config.news_article_count, 6);
        assert_eq!(config.status_poll_seconds, 5);
        assert_eq!(config.session_ttl_hours, 0);
        assert!(config.enable_grounding);
        assert!(config.gemini_api_key.is_none());
        assert!(config.admin_bootstrap_secret.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "DEBUG"),
            ("DEFAULT_LICENSE", "axq-pro-2026"),
            ("GEMINI_BASE_URL", "http://localhost:8080/"),
            ("NEWS_ARTICLE_COUNT", "not-a-number"),
            ("ENABLE_GROUNDING", "false"),
            ("ADMIN_BOOTSTRAP_SECRET", "   "),
        ]));

        assert!(config.debug_enabled());
        assert_eq!(config.default_license, "AXQ-PRO-2026");
        assert_eq!(config.gemini_base_url, "http://localhost:8080");
        assert_eq!(config.news_article_count, 6);
        assert!(!config.enable_grounding);
        assert!(config.admin_bootstrap_secret.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_articles() {
        let config = Config::from_lookup(lookup_from(&[("NEWS_ARTICLE_COUNT", "0")]));
        assert!(matches!(config.validate(), Err(PortalError::Config(_))));
    }
}
