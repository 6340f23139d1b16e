//! Speech-to-text providers
//!
//! Two backends behind one trait: a local whisper.cpp CLI subprocess and the
//! Deepgram REST API. Raw PCM chunks (16 kHz mono s16le) are wrapped into a
//! temporary WAV before transcription.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::SttConfig;

pub const SAMPLE_RATE: u32 = 16_000;

/// Subprocess transcription cap; whisper on long clips can hang otherwise.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// A speech-to-text backend.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Transcribe an audio file on disk.
    async fn transcribe_file(&self, path: &Path) -> Result<String>;

    /// Transcribe raw PCM samples (16 kHz mono s16le) by staging them as a
    /// temporary WAV file.
    async fn transcribe_pcm(&self, pcm: &[u8]) -> Result<String> {
        let wav = write_temp_wav(pcm)?;
        self.transcribe_file(wav.path()).await
    }
}

/// Stage PCM bytes as a 16 kHz mono WAV in a temp file.
fn write_temp_wav(pcm: &[u8]) -> Result<tempfile::NamedTempFile> {
    if pcm.is_empty() {
        bail!("No audio data to transcribe");
    }

    let file = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .context("Failed to create temp WAV file")?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(file.path(), spec).context("Failed to create WAV writer")?;
    for sample in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
            .context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV")?;

    Ok(file)
}

/// Local transcription through the whisper.cpp CLI.
pub struct WhisperStt {
    binary: String,
    model: String,
}

impl WhisperStt {
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SttProvider for WhisperStt {
    fn name(&self) -> &'static str {
        "whisper"
    }

    async fn transcribe_file(&self, path: &Path) -> Result<String> {
        debug!(file = %path.display(), "transcribing with whisper");

        let child = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(path)
            .arg("--no-timestamps")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn whisper binary '{}'", self.binary))?;

        let output = tokio::time::timeout(TRANSCRIBE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("Whisper transcription timed out"))?
            .context("Whisper process failed")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Whisper exited with error: {}", stderr.trim());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(clean_transcript(&text))
    }
}

/// Collapse whisper CLI stdout into one clean transcript line.
fn clean_transcript(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hosted transcription through the Deepgram REST API.
pub struct DeepgramStt {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl DeepgramStt {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            base_url: "https://api.deepgram.com".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SttProvider for DeepgramStt {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    async fn transcribe_file(&self, path: &Path) -> Result<String> {
        debug!(file = %path.display(), "transcribing with deepgram");

        let audio = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

        let response = self
            .http
            .post(format!("{}/v1/listen", self.base_url))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .query(&[("model", "nova-2"), ("smart_format", "true")])
            .body(audio)
            .send()
            .await
            .context("Deepgram request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Deepgram returned {}: {}", status, body);
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to parse Deepgram response")?;

        extract_deepgram_transcript(&json)
            .ok_or_else(|| anyhow!("Deepgram response missing transcript"))
    }
}

/// Pull `results.channels[0].alternatives[0].transcript` out of a Deepgram
/// response body.
fn extract_deepgram_transcript(json: &Value) -> Option<String> {
    json.get("results")?
        .get("channels")?
        .get(0)?
        .get("alternatives")?
        .get(0)?
        .get("transcript")?
        .as_str()
        .map(str::to_string)
}

/// Build the configured STT provider. Unknown provider names fall back to
/// whisper with a warning.
pub fn create_stt_provider(config: &SttConfig) -> Result<Box<dyn SttProvider>> {
    match config.provider.as_str() {
        "deepgram" => {
            let key = config
                .deepgram_api_key
                .as_ref()
                .context("Deepgram selected but no API key configured")?;
            Ok(Box::new(DeepgramStt::new(key.clone())))
        }
        "whisper" => Ok(Box::new(WhisperStt::new(
            config.whisper_binary.clone(),
            config.whisper_model.clone(),
        ))),
        other => {
            warn!(provider = other, "unknown STT provider, using whisper");
            Ok(Box::new(WhisperStt::new(
                config.whisper_binary.clone(),
                config.whisper_model.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_transcript() {
        let raw = "\n  hello world \n\n this is a test  \n";
        assert_eq!(clean_transcript(raw), "hello world this is a test");
        assert_eq!(clean_transcript(""), "");
    }

    #[test]
    fn test_write_temp_wav_rejects_empty() {
        assert!(write_temp_wav(&[]).is_err());
    }

    #[test]
    fn test_write_temp_wav_layout() {
        let pcm: Vec<u8> = (0..64i16).flat_map(|s| s.to_le_bytes()).collect();
        let file = write_temp_wav(&pcm).unwrap();

        let reader = hound::WavReader::open(file.path()).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 64);
    }

    #[test]
    fn test_extract_deepgram_transcript() {
        let body = json!({
            "results": {
                "channels": [{
                    "alternatives": [{"transcript": "create a rest api", "confidence": 0.98}]
                }]
            }
        });
        assert_eq!(
            extract_deepgram_transcript(&body).as_deref(),
            Some("create a rest api")
        );
        assert!(extract_deepgram_transcript(&json!({})).is_none());
    }

    struct CountingStt;

    #[async_trait]
    impl SttProvider for CountingStt {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn transcribe_file(&self, path: &Path) -> Result<String> {
            let reader = hound::WavReader::open(path)?;
            Ok(format!("{} samples", reader.len()))
        }
    }

    #[tokio::test]
    async fn test_transcribe_pcm_stages_wav_for_provider() {
        let pcm: Vec<u8> = (0..32i16).flat_map(|s| s.to_le_bytes()).collect();
        let text = CountingStt.transcribe_pcm(&pcm).await.unwrap();
        assert_eq!(text, "32 samples");

        assert!(CountingStt.transcribe_pcm(&[]).await.is_err());
    }

    #[test]
    fn test_factory_selection() {
        let whisper = create_stt_provider(&SttConfig::default()).unwrap();
        assert_eq!(whisper.name(), "whisper");

        let deepgram = create_stt_provider(&SttConfig {
            provider: "deepgram".to_string(),
            deepgram_api_key: Some("dg-key".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(deepgram.name(), "deepgram");

        // Deepgram without a key is a configuration error
        assert!(create_stt_provider(&SttConfig {
            provider: "deepgram".to_string(),
            deepgram_api_key: None,
            ..Default::default()
        })
        .is_err());

        let fallback = create_stt_provider(&SttConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(fallback.name(), "whisper");
    }
}
