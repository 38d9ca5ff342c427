//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::llm::Provider;
use crate::tokens::GuardPolicy;

/// Environment variables consulted (in order) for the provider selection
pub const PROVIDER_ENV_VARS: [&str; 2] = ["DITWAH_PROVIDER", "DEFAULT_PROVIDER"];

/// Ditwah configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub guard: GuardConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Ceiling applied to incoming messages by the spam filter
    pub max_tokens: usize,
    pub policy: GuardPolicy,
    /// Ceiling applied to every outgoing prompt
    pub prompt_ceiling: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub log_file: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Groq,
            timeout_secs: 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            policy: GuardPolicy::Truncate,
            prompt_ceiling: 4000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            log_file: "llm_calls.csv".to_string(),
        }
    }
}

impl OutputConfig {
    /// Full path of the run log
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(&self.log_file)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("DITWAH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("ditwah")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(anyhow!(
                "retry.backoff_max_ms must not be smaller than retry.backoff_base_ms"
            ));
        }
        if self.guard.max_tokens == 0 || self.guard.prompt_ceiling == 0 {
            return Err(anyhow!("Token ceilings must be greater than zero"));
        }
        if self.output.log_file.trim().is_empty() {
            return Err(anyhow!("output.log_file must not be empty"));
        }
        Ok(())
    }

    /// Provider to use, honouring the environment override
    pub fn resolved_provider(&self) -> anyhow::Result<Provider> {
        for var in PROVIDER_ENV_VARS {
            if let Ok(value) = env::var(var) {
                if !value.trim().is_empty() {
                    return value
                        .parse()
                        .with_context(|| format!("Invalid provider in {}", var));
                }
            }
        }
        Ok(self.llm.provider)
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.provider" => Ok(self.llm.provider.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            "retry.max_attempts" => Ok(self.retry.max_attempts.to_string()),
            "retry.backoff_base_ms" => Ok(self.retry.backoff_base_ms.to_string()),
            "retry.backoff_max_ms" => Ok(self.retry.backoff_max_ms.to_string()),

            "guard.max_tokens" => Ok(self.guard.max_tokens.to_string()),
            "guard.policy" => Ok(self.guard.policy.to_string()),
            "guard.prompt_ceiling" => Ok(self.guard.prompt_ceiling.to_string()),

            "output.dir" => Ok(self.output.dir.display().to_string()),
            "output.log_file" => Ok(self.output.log_file.clone()),

            "llm.api_key" | "api_key" => {
                let provider = self.resolved_provider()?;
                Ok(match provider.api_key() {
                    Ok(key) => redact(&key),
                    Err(_) => format!("(not set - use {} env var)", provider.api_key_env()),
                })
            }

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `ditwah config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.provider" => {
                self.llm.provider = value.parse()?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "retry.max_attempts" => {
                let attempts: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_attempts value: {}", value))?;
                if attempts == 0 {
                    return Err(anyhow!("retry.max_attempts must be at least 1"));
                }
                self.retry.max_attempts = attempts;
            }
            "retry.backoff_base_ms" => {
                self.retry.backoff_base_ms = value
                    .parse()
                    .with_context(|| format!("Invalid backoff_base_ms value: {}", value))?;
            }
            "retry.backoff_max_ms" => {
                self.retry.backoff_max_ms = value
                    .parse()
                    .with_context(|| format!("Invalid backoff_max_ms value: {}", value))?;
            }

            "guard.max_tokens" => {
                let tokens: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
                if tokens == 0 {
                    return Err(anyhow!("guard.max_tokens must be greater than zero"));
                }
                self.guard.max_tokens = tokens;
            }
            "guard.policy" => {
                self.guard.policy = value.parse()?;
            }
            "guard.prompt_ceiling" => {
                let tokens: usize = value
                    .parse()
                    .with_context(|| format!("Invalid prompt_ceiling value: {}", value))?;
                if tokens == 0 {
                    return Err(anyhow!("guard.prompt_ceiling must be greater than zero"));
                }
                self.guard.prompt_ceiling = tokens;
            }

            "output.dir" => {
                self.output.dir = PathBuf::from(value);
            }
            "output.log_file" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("output.log_file must not be empty"));
                }
                self.output.log_file = value.to_string();
            }

            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration. \
                     Set OPENAI_API_KEY, GEMINI_API_KEY, or GROQ_API_KEY instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `ditwah config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "llm.provider",
            "llm.timeout_secs",
            "llm.api_key",
            "retry.max_attempts",
            "retry.backoff_base_ms",
            "retry.backoff_max_ms",
            "guard.max_tokens",
            "guard.policy",
            "guard.prompt_ceiling",
            "output.dir",
            "output.log_file",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn redact(key: &str) -> String {
    if key.len() <= 4 {
        "***".to_string()
    } else {
        format!("***{}", &key[key.len() - 4..])
    }
}
