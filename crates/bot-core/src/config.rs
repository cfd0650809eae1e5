use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Top-level config (`bot.toml` + `BOT_*` env overrides). Loaded once at
/// startup in the gateway binary and passed by reference through every
/// constructor — no global mutable singleton.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub workers: WorkerPoolConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub humanizer: HumanizerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet-window duration in milliseconds. 0 disables coalescing —
    /// every enqueue flushes synchronously.
    #[serde(default = "default_debounce_window_ms")]
    pub window_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: default_debounce_window_ms(),
        }
    }
}

fn default_debounce_window_ms() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_worker_count() -> usize {
    8
}
fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Bounded tail length per chat key. 0 disables truncation.
    #[serde(default = "default_turn_limit")]
    pub turn_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            turn_limit: default_turn_limit(),
        }
    }
}

fn default_turn_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizerConfig {
    #[serde(default = "default_profile_name")]
    pub profile: String,
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
        }
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub gemini: Option<GeminiConfig>,
    pub openai: Option<OpenAiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub default_model: String,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub default_model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Allows plaintext HTTP MCP servers. Never set in production; exists so
    /// local-dev MCP servers under test don't need TLS.
    #[serde(default)]
    pub allow_plaintext_http: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            allow_plaintext_http: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_mcp_check_interval_ms")]
    pub mcp_check_interval_ms: u64,
    #[serde(default = "default_credential_check_interval_ms")]
    pub credential_check_interval_ms: u64,
    #[serde(default = "default_periodic_check_hours")]
    pub periodic_check_hours: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            mcp_check_interval_ms: default_mcp_check_interval_ms(),
            credential_check_interval_ms: default_credential_check_interval_ms(),
            periodic_check_hours: default_periodic_check_hours(),
        }
    }
}

fn default_mcp_check_interval_ms() -> u64 {
    2_000
}
fn default_credential_check_interval_ms() -> u64 {
    200
}
fn default_periodic_check_hours() -> u64 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8790
}

impl BotConfig {
    /// Load config: embedded defaults, then an optional TOML file on disk,
    /// then `BOT_*` environment overrides (nested via `_`-split keys).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULTS_TOML));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        let config: BotConfig = figment
            .merge(Env::prefixed("BOT_").split("_"))
            .extract()
            .map_err(|e| crate::error::BotError::Config(e.to_string()))?;
        Ok(config)
    }
}
