//! Error types for the capture gateway.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("camera did not answer within {0:?}")]
    Timeout(Duration),

    #[error("camera unreachable: {0}")]
    ConnectionFailed(String),

    #[error("camera returned HTTP {0}")]
    BadStatus(u16),

    #[error("workflow webhook returned HTTP {0}")]
    WebhookStatus(u16),

    #[error("Config: {0}")]
    Config(String),
}

impl GatewayError {
    /// Short machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_)               => "io",
            Self::Http(_)             => "http",
            Self::NotFound(_)         => "not_found",
            Self::InvalidArgument(_)  => "invalid_argument",
            Self::Timeout(_)          => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::BadStatus(_)        => "bad_status",
            Self::WebhookStatus(_)    => "webhook_status",
            Self::Config(_)           => "config",
        }
    }

    /// True for failures caused by a remote peer rather than the gateway.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ConnectionFailed(_) | Self::BadStatus(_) | Self::WebhookStatus(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
