//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to each
//! subsystem at startup.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// DialogueConfig
// ---------------------------------------------------------------------------

/// Turn-taking parameters for the dialogue controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Number of questions requested from the question generator.
    pub question_count: usize,
    /// Per-question answer window in seconds.
    pub answer_secs: u32,
    /// Pause between the end of interviewer speech and opening the mic, so
    /// the recogniser does not pick up the playback tail.
    pub settle_ms: u64,
    /// Greeting spoken before the first question.
    pub intro: String,
    /// Closing line spoken after the last question is accepted.
    pub outro: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            question_count: 5,
            answer_secs: 120,
            settle_ms: 800,
            intro: "Hello, and welcome to your mock interview. Let's begin.".into(),
            outro: "That concludes the interview. Thank you for your time.".into(),
        }
    }
}

impl DialogueConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

// ---------------------------------------------------------------------------
// ProctorConfig
// ---------------------------------------------------------------------------

/// Webcam integrity monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Run the proctoring monitor at all.
    pub enabled: bool,
    /// Minimum gap between two surfaced warnings, regardless of kind.
    pub cooldown_ms: u64,
    /// How often a camera frame is pulled and analysed.
    pub analysis_interval_ms: u64,
    /// Mean luma (0–255) below which a single-face frame is `low-light`.
    pub luminance_threshold: u8,
    /// Side length in pixels of the centred square sampled for luminance.
    pub sample_region: u32,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 5_000,
            analysis_interval_ms: 500,
            luminance_threshold: 50,
            sample_region: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProvider / LlmConfig
// ---------------------------------------------------------------------------

/// Selects which backend generates questions and evaluates answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Ollama running locally; no authentication required.
    Ollama,
    /// Any OpenAI-compatible REST API (OpenAI, Groq, Together.ai, LM Studio …).
    OpenAiCompatible,
    /// No model at all: built-in question bank, every answer accepted.
    Offline,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Ollama
    }
}

/// Settings for the question-generation / evaluation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key, `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"qwen2.5:7b"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:7b".into(),
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// PersistenceConfig
// ---------------------------------------------------------------------------

/// Where the session row and recording go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// The interview backend's `/api/sessions/` and `/api/upload-video/`.
    Http,
    /// Recordings written under the local data directory.
    Local,
    /// Nothing is persisted.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// Base URL of the interview backend (HTTP backend only).
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Local,
            base_url: "http://localhost:8000".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderConfig / ResumeConfig / SpeechConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Size of each buffered media segment in bytes.
    pub segment_bytes: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            segment_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Extracted resume text is truncated to this many characters before it
    /// is sent to the question generator.
    pub max_chars: usize,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self { max_chars: 6_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Pacing of the console synthesiser.
    pub words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 170,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use mock_interview::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dialogue: DialogueConfig,
    pub proctor: ProctorConfig,
    pub llm: LlmConfig,
    pub persistence: PersistenceConfig,
    pub recorder: RecorderConfig,
    pub resume: ResumeConfig,
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
