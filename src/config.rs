//! Configuration management
//!
//! Loads settings from `<config_dir>/voxcode/config.toml` when present and
//! applies environment-variable overrides for provider API keys. Every field
//! has a default so a missing file yields a working (keyless) configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::client::Provider;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Speech-to-text settings
    #[serde(default)]
    pub stt: SttConfig,
    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Text-to-speech settings
    #[serde(default)]
    pub tts: TtsConfig,
    /// Prompt engine settings
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Session store settings
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Provider name: "whisper" (local subprocess) or "deepgram"
    #[serde(default = "default_stt_provider")]
    pub provider: String,
    #[serde(default)]
    pub deepgram_api_key: Option<String>,
    /// Path to the whisper.cpp CLI binary
    #[serde(default = "default_whisper_binary")]
    pub whisper_binary: String,
    /// Path to the whisper ggml model file
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
}

fn default_stt_provider() -> String {
    "whisper".to_string()
}

fn default_whisper_binary() -> String {
    "whisper-cli".to_string()
}

fn default_whisper_model() -> String {
    "models/ggml-base.bin".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: default_stt_provider(),
            deepgram_api_key: None,
            whisper_binary: default_whisper_binary(),
            whisper_model: default_whisper_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default backend when a request carries no provider override
    #[serde(default = "default_llm_provider")]
    pub default_provider: Provider,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
}

fn default_llm_provider() -> Provider {
    Provider::OpenAi
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-opus-20240229".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: default_llm_provider(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            anthropic_api_key: None,
            anthropic_model: default_anthropic_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Provider name: "piper" (local subprocess) or "elevenlabs"
    #[serde(default = "default_tts_provider")]
    pub provider: String,
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,
    /// Path to the piper binary
    #[serde(default = "default_piper_binary")]
    pub piper_binary: String,
    /// Piper voice model name or path
    #[serde(default = "default_piper_model")]
    pub piper_model: String,
}

fn default_tts_provider() -> String {
    "piper".to_string()
}

fn default_piper_binary() -> String {
    "piper".to_string()
}

fn default_piper_model() -> String {
    "en_US-lessac-medium".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: default_tts_provider(),
            elevenlabs_api_key: None,
            piper_binary: default_piper_binary(),
            piper_model: default_piper_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Directory holding YAML prompt templates
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Include chain-of-thought blocks in structured prompts
    #[serde(default = "default_true")]
    pub enable_cot: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            enable_cot: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

/// Get the config directory (~/.config/voxcode)
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("voxcode");
    Ok(dir)
}

impl Config {
    /// Load configuration from disk, then apply env-var overrides.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("config.toml");
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config.toml")?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(dir.join("config.toml"), content).context("Failed to write config.toml")?;
        Ok(())
    }

    /// API keys from the environment win over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("DEEPGRAM_API_KEY") {
            self.stt.deepgram_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            self.tts.elevenlabs_api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.stt.provider, "whisper");
        assert_eq!(config.llm.default_provider, Provider::OpenAi);
        assert_eq!(config.tts.provider, "piper");
        assert!(config.prompt.enable_cot);
        assert_eq!(config.session.max_sessions, 100);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
[api]
port = 9000

[llm]
default_provider = "anthropic"
anthropic_api_key = "sk-ant-test"
"#,
        )
        .unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.llm.default_provider, Provider::Anthropic);
        assert_eq!(config.llm.anthropic_api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(config.llm.openai_model, "gpt-4");
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored = Config::from_toml(&toml_str).unwrap();
        assert_eq!(restored.api.port, config.api.port);
        assert_eq!(restored.session.max_sessions, config.session.max_sessions);
    }
}
