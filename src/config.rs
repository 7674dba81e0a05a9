//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{DEFAULT_LLM_TIMEOUT, LlmBackend, LlmConfig};
use crate::lookup::AirtableConfig;
use crate::lookup::airtable::DEFAULT_LOOKUP_TIMEOUT;
use crate::routing::LookupFailurePolicy;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_AIRTABLE_BASE_ID: &str = "app8CI7NAZqhQ4G1Y";
pub const DEFAULT_INTERNAL_DOMAINS: &str = "hunch.co.nz";

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub llm: LlmConfig,
    pub airtable: AirtableConfig,
    /// HTTP listen port.
    pub port: u16,
    /// The agency's own email domains.
    pub internal_domains: Vec<String>,
    pub lookup_policy: LookupFailurePolicy,
    /// Daily-rolling log files go here when set.
    pub log_dir: Option<PathBuf>,
}

impl TrafficConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Read configuration through `get`, which returns a variable's value.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("ANTHROPIC_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;
        let model = var("DOT_TRAFFIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let port = match var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("'{raw}' is not a port number: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let lookup_policy = match var("DOT_TRAFFIC_LOOKUP_POLICY") {
            Some(raw) => raw
                .parse::<LookupFailurePolicy>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "DOT_TRAFFIC_LOOKUP_POLICY".to_string(),
                    message,
                })?,
            None => LookupFailurePolicy::default(),
        };

        let internal_domains: Vec<String> = var("DOT_TRAFFIC_INTERNAL_DOMAINS")
            .unwrap_or_else(|| DEFAULT_INTERNAL_DOMAINS.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            llm: LlmConfig {
                backend: LlmBackend::Anthropic,
                api_key: SecretString::from(api_key),
                model,
                timeout: secs_or(&var, "DOT_TRAFFIC_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT)?,
            },
            airtable: AirtableConfig {
                api_key: var("AIRTABLE_API_KEY").map(SecretString::from),
                base_id: var("AIRTABLE_BASE_ID")
                    .unwrap_or_else(|| DEFAULT_AIRTABLE_BASE_ID.to_string()),
                projects_table: var("AIRTABLE_PROJECTS_TABLE")
                    .unwrap_or_else(|| "Projects".to_string()),
                clients_table: var("AIRTABLE_CLIENTS_TABLE")
                    .unwrap_or_else(|| "Clients".to_string()),
                timeout: secs_or(&var, "AIRTABLE_TIMEOUT_SECS", DEFAULT_LOOKUP_TIMEOUT)?,
            },
            port,
            internal_domains,
            lookup_policy,
            log_dir: var("DOT_TRAFFIC_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn secs_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a positive number of seconds"),
        }),
    }
}
