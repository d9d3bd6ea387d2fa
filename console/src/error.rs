//! Error types for the console.
//!
//! None of these end the session: transport errors feed the reconnect
//! policy, input and calibration errors decline a single operator action.
//! Only [`ConfigError`] can stop the process, and only at startup.

use crate::calibration::LimitSlot;
use thiserror::Error;

/// Why a WebSocket session ended.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("closed by device")]
    ClosedByPeer,

    #[error("no handshake within {0:?}")]
    ConnectTimeout(std::time::Duration),
}

/// Rejected operator input. The matching action is dropped and nothing is
/// sent to the device.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("{field}: '{value}' is not a finite number")]
    NotANumber { field: &'static str, value: String },

    #[error("{field}: '{value}' is not a whole number")]
    NotAnInteger { field: &'static str, value: String },

    #[error("step increment must be at least 1 (got {0})")]
    StepTooSmall(i64),

    #[error("terminal line is empty")]
    EmptyLine,

    #[error("unknown motor '{0}' (expected 1 or 2)")]
    UnknownMotor(String),

    #[error("unknown direction '{0}' (expected in or out)")]
    UnknownDirection(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
}

/// A calibration commit that was declined.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no telemetry received yet")]
    NoTelemetry,

    #[error("{0} is already set for this run (use reset-limits to start over)")]
    SlotAlreadySet(LimitSlot),
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid device host '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("bubble radius must be greater than 8 (got {0})")]
    BubbleRadius(f64),

    #[error("reconnect delay must be at least {min} ms (got {0})", min = crate::config::MIN_RECONNECT_MS)]
    ReconnectDelay(u64),
}
