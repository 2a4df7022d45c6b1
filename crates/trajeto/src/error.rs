//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use trajeto_config::ConfigError;
use trajeto_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}: {reason}")]
    #[diagnostic(
        code(trajeto::connection_failed),
        help(
            "Check that the notification server is reachable.\n\
             Run with -v to see each connection attempt."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Session ended: {reason}")]
    #[diagnostic(
        code(trajeto::session_ended),
        help(
            "The server closed the channel and no fallback was available.\n\
             Enable polling in your profile (fallback_enabled = true) to keep listening."
        )
    )]
    SessionEnded { reason: String },

    #[error("Connection timed out after {seconds}s")]
    #[diagnostic(code(trajeto::timeout))]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}': {reason}")]
    #[diagnostic(
        code(trajeto::auth_failed),
        help(
            "The session token was rejected.\n\
             Store a fresh one with: trajeto config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String, reason: String },

    #[error("No session token configured for profile '{profile}'")]
    #[diagnostic(
        code(trajeto::no_token),
        help(
            "Configure a token with: trajeto config init\n\
             Or set the TRAJETO_TOKEN environment variable."
        )
    )]
    NoToken { profile: String },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("History entry '{id}' not found")]
    #[diagnostic(
        code(trajeto::not_found),
        help("Run: trajeto history list to see stored entries")
    )]
    EntryNotFound { id: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(trajeto::validation))]
    Validation { field: String, reason: String },

    #[error("Operation not supported: {operation}")]
    #[diagnostic(
        code(trajeto::unsupported),
        help("The server URL must use ws:// or wss://.")
    )]
    Unsupported { operation: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(trajeto::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: trajeto config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(trajeto::no_config),
        help(
            "Create a profile with: trajeto config init\n\
             Or pass --server wss://... (expected config at: {path})"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(trajeto::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(trajeto::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Internal ────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(trajeto::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SessionEnded { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::EntryNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingToken => CliError::NoToken {
                profile: "current".into(),
            },
            CoreError::Unsupported { operation } => CliError::Unsupported { operation },
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::History { message } | CoreError::Internal(message) => {
                CliError::Internal(message)
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoToken { profile } => CliError::NoToken { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "run `trajeto config profiles`".into(),
            },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_token_exits_with_auth_code() {
        let err: CliError = CoreError::AuthenticationFailed {
            message: "HTTP 401".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err: CliError = ConfigError::Validation {
            field: "server".into(),
            reason: "bad".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn missing_profile_token_keeps_profile_name() {
        let err: CliError = ConfigError::NoToken {
            profile: "escola".into(),
        }
        .into();
        assert!(matches!(err, CliError::NoToken { ref profile } if profile == "escola"));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
