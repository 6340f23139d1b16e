//! Text-to-speech providers
//!
//! A local piper subprocess and the ElevenLabs REST API behind one trait.
//! Both return complete audio buffers; ElevenLabs additionally supports a
//! chunked streaming synthesis path.

use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::TtsConfig;

const ELEVENLABS_DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
const ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";

/// A text-to-speech backend.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesize text to a complete audio buffer (WAV for piper, MP3 for
    /// ElevenLabs).
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>>;

    /// Synthesize as a stream of audio chunks. The default buffers the full
    /// synthesis into one chunk.
    async fn synthesize_stream(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let audio = self.synthesize(text, voice).await?;
        Ok(futures::stream::once(async move { Ok(Bytes::from(audio)) }).boxed())
    }
}

/// Local synthesis through the piper CLI, text on stdin, WAV on stdout.
pub struct PiperTts {
    binary: String,
    model: String,
}

impl PiperTts {
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TtsProvider for PiperTts {
    fn name(&self) -> &'static str {
        "piper"
    }

    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        let model = voice.unwrap_or(&self.model);
        debug!(model, chars = text.len(), "synthesizing with piper");

        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(model)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn piper binary '{}'", self.binary))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to open piper stdin"))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .context("Failed to write text to piper")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Piper process failed")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Piper exited with error: {}", stderr.trim());
        }

        Ok(output.stdout)
    }
}

/// Hosted synthesis through the ElevenLabs REST API.
pub struct ElevenLabsTts {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl ElevenLabsTts {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            base_url: "https://api.elevenlabs.io".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(text: &str) -> serde_json::Value {
        json!({
            "text": text,
            "model_id": ELEVENLABS_MODEL,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.5
            }
        })
    }

    async fn post_synthesis(&self, text: &str, voice: Option<&str>, stream: bool) -> Result<reqwest::Response> {
        let voice_id = voice.unwrap_or(ELEVENLABS_DEFAULT_VOICE);
        let endpoint = if stream {
            format!("{}/v1/text-to-speech/{}/stream", self.base_url, voice_id)
        } else {
            format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
        };

        let response = self
            .http
            .post(endpoint)
            .header("xi-api-key", &self.api_key)
            .json(&Self::request_body(text))
            .send()
            .await
            .context("ElevenLabs request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("ElevenLabs returned {}: {}", status, body);
        }

        Ok(response)
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsTts {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        debug!(chars = text.len(), "synthesizing with elevenlabs");
        let response = self.post_synthesis(text, voice, false).await?;
        let audio = response
            .bytes()
            .await
            .context("Failed to read ElevenLabs audio")?;
        Ok(audio.to_vec())
    }

    async fn synthesize_stream(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let response = self.post_synthesis(text, voice, true).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.context("ElevenLabs stream error"));
        Ok(stream.boxed())
    }
}

/// Build the configured TTS provider. Unknown provider names fall back to
/// piper with a warning.
pub fn create_tts_provider(config: &TtsConfig) -> Result<Box<dyn TtsProvider>> {
    match config.provider.as_str() {
        "elevenlabs" => {
            let key = config
                .elevenlabs_api_key
                .as_ref()
                .context("ElevenLabs selected but no API key configured")?;
            Ok(Box::new(ElevenLabsTts::new(key.clone())))
        }
        "piper" => Ok(Box::new(PiperTts::new(
            config.piper_binary.clone(),
            config.piper_model.clone(),
        ))),
        other => {
            warn!(provider = other, "unknown TTS provider, using piper");
            Ok(Box::new(PiperTts::new(
                config.piper_binary.clone(),
                config.piper_model.clone(),
            )))
        }
    }
}
