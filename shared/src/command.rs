use crate::MotorId;
use serde::{Deserialize, Serialize};

/// Commands sent to the leveling controller.
///
/// The wire shape is a flat object discriminated by `cmd`, e.g.
/// `{"cmd":"motor","id":1,"steps":100}`. Step counts are sent exactly as
/// given: callers that move motor 2 through the mirrored controls are
/// expected to have flipped its sign already.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireCommand", from = "WireCommand")]
pub enum Command {
    Motor { id: MotorId, steps: i32 },
    Both { m1_steps: i32, m2_steps: i32 },
    Gains { kp_pitch: f64, ki_pitch: f64, kp_roll: f64, ki_roll: f64 },
    Tolerance { degrees: f64 },
    StabTimeout { seconds: f64 },
    Serial { text: String },
    MotorReset { id: MotorId },
    Stop,
    Speed { rpm: u32 },
    ResetBoth,
    UnlockLimits,
    LockLimits,
    CalibrateImu,
    Release,
}

impl Command {
    /// The `cmd` tag this command is sent under.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Motor { .. } => "motor",
            Command::Both { .. } => "both",
            Command::Gains { .. } => "gains",
            Command::Tolerance { .. } => "tolerance",
            Command::StabTimeout { .. } => "stabTimeout",
            Command::Serial { .. } => "serial",
            Command::MotorReset { id: MotorId::M1 } => "mreset1",
            Command::MotorReset { id: MotorId::M2 } => "mreset2",
            Command::Stop => "mstop",
            Command::Speed { .. } => "mspeed",
            Command::ResetBoth => "mreset",
            Command::UnlockLimits => "munlock",
            Command::LockLimits => "mlock",
            Command::CalibrateImu => "calibrate",
            Command::Release => "release",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "cmd")]
enum WireCommand {
    #[serde(rename = "motor")]
    Motor { id: MotorId, steps: i32 },
    #[serde(rename = "both")]
    Both { m1: i32, m2: i32 },
    #[serde(rename = "gains")]
    Gains {
        #[serde(rename = "kpP")]
        kp_p: f64,
        #[serde(rename = "kiP")]
        ki_p: f64,
        #[serde(rename = "kpR")]
        kp_r: f64,
        #[serde(rename = "kiR")]
        ki_r: f64,
    },
    #[serde(rename = "tolerance")]
    Tolerance { deg: f64 },
    #[serde(rename = "stabTimeout")]
    StabTimeout { sec: f64 },
    #[serde(rename = "serial")]
    Serial { text: String },
    #[serde(rename = "mreset1")]
    MReset1,
    #[serde(rename = "mreset2")]
    MReset2,
    #[serde(rename = "mstop")]
    MStop,
    #[serde(rename = "mspeed")]
    MSpeed { value: u32 },
    #[serde(rename = "mreset")]
    MReset,
    #[serde(rename = "munlock")]
    MUnlock,
    #[serde(rename = "mlock")]
    MLock,
    #[serde(rename = "calibrate")]
    Calibrate,
    #[serde(rename = "release")]
    Release,
}

impl From<Command> for WireCommand {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Motor { id, steps } => WireCommand::Motor { id, steps },
            Command::Both { m1_steps, m2_steps } => WireCommand::Both {
                m1: m1_steps,
                m2: m2_steps,
            },
            Command::Gains {
                kp_pitch,
                ki_pitch,
                kp_roll,
                ki_roll,
            } => WireCommand::Gains {
                kp_p: kp_pitch,
                ki_p: ki_pitch,
                kp_r: kp_roll,
                ki_r: ki_roll,
            },
            Command::Tolerance { degrees } => WireCommand::Tolerance { deg: degrees },
            Command::StabTimeout { seconds } => WireCommand::StabTimeout { sec: seconds },
            Command::Serial { text } => WireCommand::Serial { text },
            Command::MotorReset { id: MotorId::M1 } => WireCommand::MReset1,
            Command::MotorReset { id: MotorId::M2 } => WireCommand::MReset2,
            Command::Stop => WireCommand::MStop,
            Command::Speed { rpm } => WireCommand::MSpeed { value: rpm },
            Command::ResetBoth => WireCommand::MReset,
            Command::UnlockLimits => WireCommand::MUnlock,
            Command::LockLimits => WireCommand::MLock,
            Command::CalibrateImu => WireCommand::Calibrate,
            Command::Release => WireCommand::Release,
        }
    }
}

impl From<WireCommand> for Command {
    fn from(wire: WireCommand) -> Self {
        match wire {
            WireCommand::Motor { id, steps } => Command::Motor { id, steps },
            WireCommand::Both { m1, m2 } => Command::Both {
                m1_steps: m1,
                m2_steps: m2,
            },
            WireCommand::Gains {
                kp_p,
                ki_p,
                kp_r,
                ki_r,
            } => Command::Gains {
                kp_pitch: kp_p,
                ki_pitch: ki_p,
                kp_roll: kp_r,
                ki_roll: ki_r,
            },
            WireCommand::Tolerance { deg } => Command::Tolerance { degrees: deg },
            WireCommand::StabTimeout { sec } => Command::StabTimeout { seconds: sec },
            WireCommand::Serial { text } => Command::Serial { text },
            WireCommand::MReset1 => Command::MotorReset { id: MotorId::M1 },
            WireCommand::MReset2 => Command::MotorReset { id: MotorId::M2 },
            WireCommand::MStop => Command::Stop,
            WireCommand::MSpeed { value } => Command::Speed { rpm: value },
            WireCommand::MReset => Command::ResetBoth,
            WireCommand::MUnlock => Command::UnlockLimits,
            WireCommand::MLock => Command::LockLimits,
            WireCommand::Calibrate => Command::CalibrateImu,
            WireCommand::Release => Command::Release,
        }
    }
}
