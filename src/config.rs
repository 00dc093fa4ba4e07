use crate::error::{Result, RoofDeskError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosted backend base URL (e.g. https://xyz.example.co)
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    /// Storage bucket for photos, signatures and voice memos
    pub bucket: String,
    /// Local mirror directory (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,
    /// OpenAI-compatible base URL for voice memo transcription
    pub transcribe_url: Option<String>,
    pub transcribe_model: String,
    pub transcribe_key: Option<String>,
    pub timeout_seconds: u64,
    /// Environment overrides; resolved by the accessors and never saved
    #[serde(skip)]
    env: EnvOverrides,
}

#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    backend_url: Option<String>,
    api_key: Option<String>,
    data_dir: Option<PathBuf>,
    transcribe_key: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            backend_url: var("ROOFDESK_URL"),
            api_key: var("ROOFDESK_API_KEY"),
            data_dir: var("ROOFDESK_DATA_DIR").map(PathBuf::from),
            transcribe_key: var("ROOFDESK_TRANSCRIBE_KEY"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            bucket: "portal".into(),
            data_dir: None,
            transcribe_url: None,
            transcribe_model: "whisper-1".into(),
            transcribe_key: None,
            timeout_seconds: 30,
            env: EnvOverrides::default(),
        }
    }
}

impl Config {
    /// Load from disk (defaults when absent). Environment variables take
    /// precedence in the accessors but are never written back.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.env = EnvOverrides::from_env();
        Ok(config)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RoofDeskError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("roofdesk").join("config.json"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.env.data_dir.as_ref().or(self.data_dir.as_ref()) {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| RoofDeskError::Config("data directory not found".into()))?;
        Ok(base.join("roofdesk"))
    }

    /// Backend URL without a trailing slash, if one is configured
    pub fn backend_url(&self) -> Option<String> {
        self.env
            .backend_url
            .as_deref()
            .or(self.backend_url.as_deref())
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        self.env
            .api_key
            .clone()
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RoofDeskError::Config("API key is not set. Run `roofdesk config --set-api-key KEY`".into()))
    }

    pub fn transcribe_key(&self) -> Option<&str> {
        self.env
            .transcribe_key
            .as_deref()
            .or(self.transcribe_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    pub fn set_backend_url(&mut self, url: String) -> Result<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RoofDeskError::Validation(format!("backend URL must start with http(s)://: {}", url)));
        }
        self.backend_url = Some(url);
        self.save()
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_bucket(&mut self, bucket: String) -> Result<()> {
        if bucket.trim().is_empty() || bucket.contains('/') {
            return Err(RoofDeskError::Validation(format!("invalid bucket name: {:?}", bucket)));
        }
        self.bucket = bucket;
        self.save()
    }
}
