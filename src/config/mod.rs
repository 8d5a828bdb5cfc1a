use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub engine: EngineDemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    CI,
    Production,
}

/// Knobs for the demo binary only — the `Engine` itself takes no
/// configuration beyond the requirements passed to `register_requirements`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDemoConfig {
    pub source_timeframe: String,
    pub warmup_bar_count: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_file = match env::var("NODE_ENV").as_deref() {
            Ok("production") => ".env.production",
            Ok("ci") => ".env.ci",
            _ => ".env.development",
        };
        dotenv::from_filename(env_file).ok();

        let config = Config {
            environment: Self::parse_environment(),
            engine: Self::parse_engine_config()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Environment {
        match env::var("NODE_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("ci") => Environment::CI,
            _ => Environment::Development,
        }
    }

    fn parse_engine_config() -> Result<EngineDemoConfig> {
        Ok(EngineDemoConfig {
            source_timeframe: env::var("ENGINE_SOURCE_TIMEFRAME").unwrap_or_else(|_| "1m".to_string()),
            warmup_bar_count: env::var("ENGINE_WARMUP_BAR_COUNT")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .context("Invalid ENGINE_WARMUP_BAR_COUNT")?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.engine.warmup_bar_count == 0 {
            anyhow::bail!("warmup bar count must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        std::env::set_var("NODE_ENV", "development");
        std::env::set_var("ENGINE_WARMUP_BAR_COUNT", "100");

        let config = Config::load();
        assert!(config.is_ok());
    }
}
