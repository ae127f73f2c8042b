use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

use crate::types::{Config, Region};

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let posthog_api_key = env
        .get_var("POSTHOG_API_KEY")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("POSTHOG_API_KEY must be provided via Secret env"))?;

    let region = match env.get_var("POSTHOG_REGION") {
        Some(raw) => Region::parse(&raw)
            .ok_or_else(|| anyhow!("Invalid POSTHOG_REGION '{}' (expected eu or us)", raw))?,
        None => Region::Eu,
    };

    let discord_bot_token = env
        .get_var("DISCORD_BOT_TOKEN")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("DISCORD_BOT_TOKEN must be provided via Secret env"))?;

    let discord_user_id: u64 = env
        .get_var("DISCORD_USER_ID")
        .ok_or_else(|| anyhow!("DISCORD_USER_ID must be set"))?
        .trim()
        .parse()
        .context("Invalid DISCORD_USER_ID")?;

    Ok(Config {
        posthog_api_key,
        region,
        discord_bot_token,
        discord_user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> MockEnvironment {
        MockEnvironment::new()
            .with_var("POSTHOG_API_KEY", "phx_test_key")
            .with_var("POSTHOG_REGION", "us")
            .with_var("DISCORD_BOT_TOKEN", "bot-token")
            .with_var("DISCORD_USER_ID", "123456789")
    }

    #[test]
    fn test_config_loading_with_env() {
        let config = load_config_with_env(&full_env()).unwrap();

        assert_eq!(config.posthog_api_key, "phx_test_key");
        assert_eq!(config.region, Region::Us);
        assert_eq!(config.discord_bot_token, "bot-token");
        assert_eq!(config.discord_user_id, 123456789);
    }

    #[test]
    fn test_config_loading_defaults_to_eu() {
        let env = MockEnvironment::new()
            .with_var("POSTHOG_API_KEY", "phx_test_key")
            .with_var("DISCORD_BOT_TOKEN", "bot-token")
            .with_var("DISCORD_USER_ID", "42");

        let config = load_config_with_env(&env).unwrap();
        assert_eq!(config.region, Region::Eu);
    }

    #[test]
    fn test_config_loading_missing_required() {
        // Missing POSTHOG_API_KEY
        let env = MockEnvironment::new()
            .with_var("DISCORD_BOT_TOKEN", "bot-token")
            .with_var("DISCORD_USER_ID", "42");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("POSTHOG_API_KEY"));

        // Missing DISCORD_BOT_TOKEN
        let env = MockEnvironment::new()
            .with_var("POSTHOG_API_KEY", "phx_test_key")
            .with_var("DISCORD_USER_ID", "42");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DISCORD_BOT_TOKEN"));

        // Missing DISCORD_USER_ID
        let env = MockEnvironment::new()
            .with_var("POSTHOG_API_KEY", "phx_test_key")
            .with_var("DISCORD_BOT_TOKEN", "bot-token");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DISCORD_USER_ID"));
    }

    #[test]
    fn test_config_loading_invalid_region() {
        let env = full_env().with_var("POSTHOG_REGION", "apac");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("POSTHOG_REGION"));
    }

    #[test]
    fn test_config_loading_invalid_user_id() {
        let env = full_env().with_var("DISCORD_USER_ID", "not-a-number");
        let result = load_config_with_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DISCORD_USER_ID"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let env = full_env().with_var("POSTHOG_API_KEY", "   ");
        assert!(load_config_with_env(&env).is_err());

        let env = full_env().with_var("DISCORD_BOT_TOKEN", "");
        assert!(load_config_with_env(&env).is_err());
    }
}
