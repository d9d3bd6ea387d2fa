use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod command;

pub use command::Command;

/// Default WebSocket path served by the leveling controller.
pub const WS_PATH: &str = "/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MotorId {
    M1,
    M2,
}

impl MotorId {
    pub const ALL: [MotorId; 2] = [MotorId::M1, MotorId::M2];

    pub fn number(self) -> u8 {
        match self {
            MotorId::M1 => 1,
            MotorId::M2 => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotorId::M1 => "M1",
            MotorId::M2 => "M2",
        }
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MotorId> for u8 {
    fn from(id: MotorId) -> Self {
        id.number()
    }
}

impl TryFrom<u8> for MotorId {
    type Error = UnknownMotor;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MotorId::M1),
            2 => Ok(MotorId::M2),
            other => Err(UnknownMotor(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown motor id {0} (expected 1 or 2)")]
pub struct UnknownMotor(pub u8);

/// One status update from the leveling controller. Every frame fully
/// replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub pitch: f64,
    pub roll: f64,
    pub state: String,
    pub level: bool,
    pub m1: i64,
    pub m2: i64,
    pub m_min: i64,
    pub m_max: i64,
    pub m1_lim: bool,
    pub m2_lim: bool,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    pub temp: f64,
    pub cal: bool,
    /// Controller uptime in milliseconds.
    pub up: u64,

    // Settings echo. Older firmware omits these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kp_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ki_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kp_r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ki_r: Option<f64>,
}

impl TelemetryFrame {
    pub fn motor_position(&self, motor: MotorId) -> i64 {
        match motor {
            MotorId::M1 => self.m1,
            MotorId::M2 => self.m2,
        }
    }

    pub fn motor_at_limit(&self, motor: MotorId) -> bool {
        match motor {
            MotorId::M1 => self.m1_lim,
            MotorId::M2 => self.m2_lim,
        }
    }
}

/// Messages pushed by the controller over the WebSocket:
///   { "t": "status", ...TelemetryFrame... }
///   { "t": "log",    "msg": "..." }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum WsInMsg {
    Status(TelemetryFrame),
    Log { msg: String },
}
