//! Classroom configuration.
//!
//! Configuration is loaded from environment variables. The directory API
//! token is redacted in Debug output.

use crate::bridge::BridgeSettings;
use crate::classroom::ClassroomSettings;
use crate::eligibility::{
    EligibilityPolicy, DEFAULT_JOIN_LEAD_MINUTES, DEFAULT_START_LEAD_MINUTES, MAX_LEAD_MINUTES,
};
use crate::models::{Role, RoleContext};
use crate::tasks::PollerSettings;
use common::config::{ObservabilityConfig, DEFAULT_LOG_FILTER};
use common::secret::SecretString;
use common::types::PrincipalId;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default session list refresh interval.
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

/// Default bound on loading the conferencing engine client library.
pub const DEFAULT_ENGINE_LOAD_TIMEOUT_SECONDS: u64 = 15;

/// Default bound on room creation plus the wait for "conference joined".
pub const DEFAULT_ROOM_JOIN_TIMEOUT_SECONDS: u64 = 30;

/// Default per-request timeout for the session directory.
pub const DEFAULT_DIRECTORY_TIMEOUT_SECONDS: u64 = 10;

/// Default conferencing engine domain.
pub const DEFAULT_ENGINE_DOMAIN: &str = "meet.jit.si";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Classroom configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the session directory API.
    pub directory_url: String,

    /// Bearer token for the session directory.
    /// Protected by `SecretString` to prevent accidental logging.
    pub api_token: SecretString,

    /// Per-request directory timeout in seconds (default: 10).
    pub directory_timeout_seconds: u64,

    /// Session list refresh interval in seconds (default: 30).
    pub poll_interval_seconds: u64,

    /// Minutes before start from which an instructor may start (default: 15).
    pub start_lead_minutes: i64,

    /// Minutes before start from which participants may join (default: 10).
    pub join_lead_minutes: i64,

    /// Engine client library load timeout in seconds (default: 15).
    pub engine_load_timeout_seconds: u64,

    /// Room creation and join timeout in seconds (default: 30).
    pub room_join_timeout_seconds: u64,

    /// Conferencing engine domain (default: "meet.jit.si").
    pub engine_domain: String,

    /// Health endpoint bind address (default: "0.0.0.0:8090").
    pub health_bind_address: String,

    /// Principal the agent polls for.
    pub principal_id: PrincipalId,

    /// Role of that principal (default: student).
    pub role: Role,

    /// Display name of that principal.
    pub display_name: String,

    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

/// Custom Debug implementation that redacts the API token.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("directory_url", &self.directory_url)
            .field("api_token", &"[REDACTED]")
            .field("directory_timeout_seconds", &self.directory_timeout_seconds)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("start_lead_minutes", &self.start_lead_minutes)
            .field("join_lead_minutes", &self.join_lead_minutes)
            .field(
                "engine_load_timeout_seconds",
                &self.engine_load_timeout_seconds,
            )
            .field("room_join_timeout_seconds", &self.room_join_timeout_seconds)
            .field("engine_domain", &self.engine_domain)
            .field("health_bind_address", &self.health_bind_address)
            .field("principal_id", &self.principal_id)
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Parse an optional variable, falling back to `default` only when unset.
fn parse_var<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(s) => s
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{name}={s:?}: {e}"))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let directory_url = vars
            .get("CLASSROOM_DIRECTORY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("CLASSROOM_DIRECTORY_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        if !(directory_url.starts_with("http://") || directory_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "CLASSROOM_DIRECTORY_URL must be an http(s) URL".to_string(),
            ));
        }

        let api_token = SecretString::from(
            vars.get("CLASSROOM_API_TOKEN")
                .ok_or_else(|| ConfigError::MissingEnvVar("CLASSROOM_API_TOKEN".to_string()))?
                .clone(),
        );

        let principal_id = vars
            .get("CLASSROOM_PRINCIPAL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("CLASSROOM_PRINCIPAL_ID".to_string()))
            .and_then(|s| {
                Uuid::parse_str(s).map(PrincipalId).map_err(|e| {
                    ConfigError::InvalidValue(format!("CLASSROOM_PRINCIPAL_ID is not a UUID: {e}"))
                })
            })?;

        let role = match vars.get("CLASSROOM_ROLE") {
            Some(s) => s.parse::<Role>().map_err(ConfigError::InvalidValue)?,
            None => Role::Student,
        };

        let display_name = vars
            .get("CLASSROOM_DISPLAY_NAME")
            .cloned()
            .unwrap_or_else(|| "Classroom Agent".to_string());

        let directory_timeout_seconds = parse_var(
            vars,
            "CLASSROOM_DIRECTORY_TIMEOUT_SECONDS",
            DEFAULT_DIRECTORY_TIMEOUT_SECONDS,
        )?;

        let poll_interval_seconds = parse_var(
            vars,
            "CLASSROOM_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?;

        // tokio::time::interval panics on a zero period
        if poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "CLASSROOM_POLL_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let start_lead_minutes = parse_var(
            vars,
            "CLASSROOM_START_LEAD_MINUTES",
            DEFAULT_START_LEAD_MINUTES,
        )?;

        let join_lead_minutes = parse_var(
            vars,
            "CLASSROOM_JOIN_LEAD_MINUTES",
            DEFAULT_JOIN_LEAD_MINUTES,
        )?;

        if !(0..=MAX_LEAD_MINUTES).contains(&start_lead_minutes)
            || !(0..=MAX_LEAD_MINUTES).contains(&join_lead_minutes)
        {
            return Err(ConfigError::InvalidValue(format!(
                "eligibility lead minutes must be between 0 and {MAX_LEAD_MINUTES}"
            )));
        }

        let engine_load_timeout_seconds = parse_var(
            vars,
            "CLASSROOM_ENGINE_LOAD_TIMEOUT_SECONDS",
            DEFAULT_ENGINE_LOAD_TIMEOUT_SECONDS,
        )?;

        let room_join_timeout_seconds = parse_var(
            vars,
            "CLASSROOM_ROOM_JOIN_TIMEOUT_SECONDS",
            DEFAULT_ROOM_JOIN_TIMEOUT_SECONDS,
        )?;

        let engine_domain = vars
            .get("CLASSROOM_ENGINE_DOMAIN")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENGINE_DOMAIN.to_string());

        let health_bind_address = vars
            .get("CLASSROOM_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let observability = ObservabilityConfig {
            log_level: vars
                .get("CLASSROOM_LOG_LEVEL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            json_logs: vars
                .get("CLASSROOM_JSON_LOGS")
                .is_some_and(|s| matches!(s.as_str(), "1" | "true" | "yes")),
        };

        Ok(Config {
            directory_url,
            api_token,
            directory_timeout_seconds,
            poll_interval_seconds,
            start_lead_minutes,
            join_lead_minutes,
            engine_load_timeout_seconds,
            room_join_timeout_seconds,
            engine_domain,
            health_bind_address,
            principal_id,
            role,
            display_name,
            observability,
        })
    }

    /// Eligibility windows shared by the instructor and student views.
    #[must_use]
    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        EligibilityPolicy::new(self.start_lead_minutes, self.join_lead_minutes)
    }

    /// Settings for the session discovery poller.
    #[must_use]
    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            policy: self.eligibility_policy(),
        }
    }

    /// Settings for the meeting bridge.
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            engine_domain: self.engine_domain.clone(),
            engine_load_timeout: Duration::from_secs(self.engine_load_timeout_seconds),
            room_join_timeout: Duration::from_secs(self.room_join_timeout_seconds),
        }
    }

    /// Settings for entering a classroom.
    #[must_use]
    pub fn classroom_settings(&self) -> ClassroomSettings {
        ClassroomSettings {
            policy: self.eligibility_policy(),
            bridge: self.bridge_settings(),
        }
    }

    /// Principal context the agent acts as.
    #[must_use]
    pub fn role_context(&self) -> RoleContext {
        RoleContext::new(self.principal_id, self.role, self.display_name.clone())
    }
}
