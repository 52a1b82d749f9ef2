use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub search: SearchConfig,
    pub wikipedia: WikipediaConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from the default path
    /// (~/.config/research-shell/config.toml), falling back to defaults if
    /// the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("research-shell")
            .join("config.toml")
    }

    /// Data directory for prompt history etc.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("research-shell")
    }
}

/// LLM provider configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL for the OpenAI-compatible API.
    pub api_base: String,
    /// Model name.
    pub model: String,
    /// API key. Takes precedence over `api_key_env` when set.
    pub api_key: Option<String>,
    /// Environment variable to read the API key from when `api_key` is unset.
    pub api_key_env: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from config, then from the configured env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
    }
}

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of tool dispatches per run (the iteration budget).
    pub max_iterations: usize,
    /// System prompt framing the research task.
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            system_prompt: "You are a helpful research assistant. Use the available tools \
                 to gather information and answer questions thoroughly.\n\n\
                 Available tools:\n\
                 - web_search: Search the web for current information\n\
                 - wikipedia: Search Wikipedia for encyclopedic information\n\
                 - save_text_to_file: Save your research to a file\n\n\
                 When you have gathered sufficient information, provide a \
                 comprehensive answer with proper formatting."
                .into(),
        }
    }
}

/// Web search backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// DuckDuckGo HTML endpoint (substitutable for tests).
    pub api_base: String,
    /// Maximum number of results to format.
    pub max_results: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://html.duckduckgo.com/html/".into(),
            max_results: 5,
            timeout_secs: 15,
        }
    }
}

/// Encyclopedic lookup backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    /// MediaWiki api.php endpoint (substitutable for tests).
    pub api_base: String,
    /// Maximum number of matched entries to include.
    pub max_results: usize,
    /// Maximum characters per excerpt.
    pub max_chars: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_base: "https://en.wikipedia.org/w/api.php".into(),
            max_results: 2,
            max_chars: 1000,
            timeout_secs: 15,
        }
    }
}

/// Research output log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination for the append-only research log.
    pub log_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("research_output.txt"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Enable CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            cors: true,
        }
    }
}
