//! Configuration management for PaperLedger services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Conventional variable names (DATABASE_URL, OPENAI_API_KEY, HEDERA_*, ...)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ledger client configuration
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Hosted LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Quote and payment configuration
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Conversational agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted upload, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Media types accepted by the upload endpoint
    #[serde(default = "default_allowed_media_types")]
    pub allowed_media_types: Vec<String>,

    /// Redact upstream error messages in responses
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL. `memory` selects the in-process store.
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Storage provider: fs, memory
    #[serde(default = "default_storage_provider")]
    pub provider: String,

    /// Base directory for the filesystem bucket
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Ledger provider: hedera, memory, none
    #[serde(default = "default_ledger_provider")]
    pub provider: String,

    /// Network selection: mainnet, testnet, previewnet
    #[serde(default = "default_network")]
    pub network: String,

    /// Operator account id (`0.0.1234`) or long-zero EVM address (`0x...`)
    pub operator_id: Option<String>,

    /// Operator private key (DER or raw hex)
    pub operator_key: Option<String>,

    /// Main registry topic; created at startup if absent or unreachable
    pub registry_topic_id: Option<String>,

    /// Existing platform token to reuse
    pub token_id: Option<String>,

    /// Platform token name, used when a token has to be created
    pub token_name: Option<String>,

    /// Platform token symbol
    pub token_symbol: Option<String>,

    /// Initial supply in the token's smallest unit
    #[serde(default = "default_token_supply")]
    pub token_initial_supply: u64,

    /// Token decimals
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// LLM provider: openai, template
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the hosted model
    pub api_key: Option<String>,

    /// API base URL (for compatible endpoints)
    pub api_base: Option<String>,

    /// Chat model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum output tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    /// Payment mode: simulated, ledger
    #[serde(default = "default_payment_mode")]
    pub mode: String,

    /// Platform fee added on top of the papers cost, in percent
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: f64,

    /// Account receiving ledger payments
    pub recipient_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Base URL of the gateway
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Maximum characters of paper content forwarded to the LLM
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_allowed_media_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "text/plain".to_string(),
        "text/markdown".to_string(),
    ]
}
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_storage_provider() -> String { "fs".to_string() }
fn default_blob_dir() -> String { "data/blobs".to_string() }
fn default_ledger_provider() -> String { "hedera".to_string() }
fn default_network() -> String { "testnet".to_string() }
fn default_token_supply() -> u64 { 1_000_000 }
fn default_token_decimals() -> u32 { 2 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_max_tokens() -> u32 { 500 }
fn default_llm_timeout() -> u64 { 30 }
fn default_payment_mode() -> String { "simulated".to_string() }
fn default_platform_fee_percent() -> f64 { 5.0 }
fn default_server_url() -> String { "http://localhost:8080".to_string() }
fn default_excerpt_chars() -> usize { 4000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }

/// Conventional environment names mapped onto configuration keys.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("PORT", "server.port"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("HEDERA_NETWORK", "ledger.network"),
    ("HEDERA_ACCOUNT_ID", "ledger.operator_id"),
    ("HEDERA_PRIVATE_KEY", "ledger.operator_key"),
    ("HEDERA_REGISTRY_TOPIC_ID", "ledger.registry_topic_id"),
    ("PLATFORM_TOKEN_ID", "ledger.token_id"),
    ("PLATFORM_TOKEN_NAME", "ledger.token_name"),
    ("PLATFORM_TOKEN_SYMBOL", "ledger.token_symbol"),
    ("PLATFORM_TOKEN_INITIAL_SUPPLY", "ledger.token_initial_supply"),
    ("SERVER_URL", "agent.server_url"),
];

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("database.url", "postgres://localhost/paperledger")?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in ENV_ALIASES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Whether the in-process document store was requested
    pub fn uses_memory_database(&self) -> bool {
        self.database.url == "memory"
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            blob_dir: default_blob_dir(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            provider: default_ledger_provider(),
            network: default_network(),
            operator_id: None,
            operator_key: None,
            registry_topic_id: None,
            token_id: None,
            token_name: None,
            token_symbol: None,
            token_initial_supply: default_token_supply(),
            token_decimals: default_token_decimals(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            mode: default_payment_mode(),
            platform_fee_percent: default_platform_fee_percent(),
            recipient_account: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                max_upload_bytes: default_max_upload_bytes(),
                allowed_media_types: default_allowed_media_types(),
                production: false,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/paperledger".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            llm: LlmConfig::default(),
            payment: PaymentConfig::default(),
            agent: AgentConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
