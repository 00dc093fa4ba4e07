//! Voice memo transcription against an OpenAI-compatible endpoint

use crate::config::Config;
use crate::error::{Result, RoofDeskError};
use crate::store::content_type_for;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub struct Transcriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Build from config. Both the URL and key must be set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = config
            .transcribe_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RoofDeskError::Config("transcription URL is not set (transcribe_url)".into()))?;
        let key = config
            .transcribe_key()
            .ok_or_else(|| {
                RoofDeskError::Config("transcription key is not set (ROOFDESK_TRANSCRIBE_KEY)".into())
            })?;
        // 音声アップロードは通常より長めに待つ
        Self::new(url, key, &config.transcribe_model, config.timeout_seconds.saturating_mul(4))
    }

    /// `None` when transcription is not configured
    pub fn optional(config: &Config) -> Option<Self> {
        Self::from_config(config).ok()
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    pub async fn transcribe_file(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(RoofDeskError::FileNotFound(path.display().to_string()));
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "memo".into());
        self.transcribe_bytes(bytes, &file_name).await
    }

    pub async fn transcribe_bytes(&self, bytes: Vec<u8>, file_name: &str) -> Result<String> {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type_for(&ext))?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        debug!(file = file_name, size, "transcribing");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoofDeskError::Transcription(format!("{}: {}", status, body.trim())));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.trim().to_string();
        info!(file = file_name, chars = text.len(), "transcribed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_url_and_key() {
        let mut config = Config::default();
        assert!(matches!(Transcriber::from_config(&config), Err(RoofDeskError::Config(_))));

        config.transcribe_url = Some("https://api.example.com/v1/".into());
        assert!(matches!(Transcriber::from_config(&config), Err(RoofDeskError::Config(_))));

        config.transcribe_key = Some("sk-test".into());
        let transcriber = Transcriber::from_config(&config).unwrap();
        assert_eq!(transcriber.endpoint(), "https://api.example.com/v1/audio/transcriptions");
    }

    #[test]
    fn test_oversized_timeout_does_not_overflow() {
        let mut config = Config::default();
        config.transcribe_url = Some("https://api.example.com/v1".into());
        config.transcribe_key = Some("sk-test".into());
        config.timeout_seconds = u64::MAX;
        assert!(Transcriber::from_config(&config).is_ok());
    }

    #[test]
    fn test_optional_is_none_without_config() {
        assert!(Transcriber::optional(&Config::default()).is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let transcriber = Transcriber::new("http://localhost:9", "k", "whisper-1", 1).unwrap();
        let result = transcriber.transcribe_file(Path::new("/nonexistent/memo.m4a")).await;
        assert!(matches!(result, Err(RoofDeskError::FileNotFound(_))));
    }
}
