//! Error types for the beacon CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (0 success, 1 validation/context, 2 auth, 3 api, 4 other)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for beacon operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    Auth,
    Context,
    Resolution,
    Api,
    Network,
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Auth => "AUTH_ERROR",
            Self::Context => "CONTEXT_ERROR",
            Self::Resolution => "RESOLUTION_ERROR",
            Self::Api => "API_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Exit code per the CLI surface: 0 success, 1 validation/context,
    /// 2 auth, 3 api, 4 other.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation | Self::Context | Self::Resolution => 1,
            Self::Auth => 2,
            Self::Api => 3,
            Self::Network | Self::Internal => 4,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required: {reason}")]
    Auth { reason: String },

    #[error("{0}")]
    Context(String),

    #[error("{kind} not found: {id}")]
    Resolution { kind: String, id: String },

    #[error("{detail}")]
    Api {
        status: u16,
        detail: String,
        endpoint: String,
    },

    /// All targets failed; preserves the first failing target's status so
    /// callers can still distinguish e.g. a blanket 401 from a 503.
    #[error("Failed to fetch issues from {count} project(s): {detail}")]
    CompositeApi {
        count: usize,
        status: Option<u16>,
        detail: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Auth { .. } => ErrorCode::Auth,
            Self::Context(_) => ErrorCode::Context,
            Self::Resolution { .. } => ErrorCode::Resolution,
            Self::Api { .. } | Self::CompositeApi { .. } => ErrorCode::Api,
            Self::Network(_) => ErrorCode::Network,
            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Internal(_) => {
                ErrorCode::Internal
            }
        }
    }

    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// The `ApiError`'s status code, when this variant carries one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::CompositeApi { status, .. } => *status,
            _ => None,
        }
    }

    /// Context-aware recovery hint. `None` if no actionable suggestion.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Auth { .. } => Some("Run `beacon login` to authenticate".to_string()),
            Self::Context(_) => Some(
                "Pass a target explicitly, e.g. `beacon issues list org/project`, \
                 or set BEACON_ORG/BEACON_PROJECT"
                    .to_string(),
            ),
            Self::Validation(msg) if msg.contains("limit") => {
                Some("Use `-c last` to continue instead of raising --limit past 1000".to_string())
            }
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut err = serde_json::json!({
            "status": self.status(),
            "message": self.to_string(),
        });
        if let Some(hint) = self.hint() {
            err["hint"] = serde_json::Value::String(hint);
        }
        serde_json::json!({
            "code": code.as_str(),
            "exit_code": code.exit_code(),
            "status": err["status"],
            "message": err["message"],
            "hint": err.get("hint").cloned().unwrap_or(serde_json::Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_surface() {
        assert_eq!(Error::Validation("x".into()).exit_code(), 1);
        assert_eq!(Error::Context("x".into()).exit_code(), 1);
        assert_eq!(
            Error::Resolution { kind: "org".into(), id: "acme".into() }.exit_code(),
            1
        );
        assert_eq!(Error::Auth { reason: "x".into() }.exit_code(), 2);
        assert_eq!(
            Error::Api { status: 502, detail: "x".into(), endpoint: "/e".into() }.exit_code(),
            3
        );
        assert_eq!(Error::Network("x".into()).exit_code(), 4);
    }

    #[test]
    fn composite_api_preserves_first_status() {
        let e = Error::CompositeApi {
            count: 2,
            status: Some(502),
            detail: "bad gateway".into(),
        };
        assert_eq!(e.status(), Some(502));
        assert!(e.to_string().starts_with("Failed to fetch issues from 2 project(s)"));
    }
}
