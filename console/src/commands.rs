//! Builds outbound [`Command`]s from operator input.
//!
//! Motor 2 is mounted mirrored relative to motor 1. [`mirror_steps`] is the
//! only place that knows this; every control that moves motor 2 in the
//! platform's nominal frame goes through it.

use crate::calibration::StepIncrement;
use crate::error::InputError;
use leveler_shared::{Command, MotorId};

/// Limit-jog direction in the platform's nominal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    In,
    Out,
}

impl JogDirection {
    fn sign(self) -> i32 {
        match self {
            JogDirection::In => -1,
            JogDirection::Out => 1,
        }
    }
}

/// Which motors a limit jog drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogTarget {
    Motor(MotorId),
    Both,
}

/// Converts a nominal step count into the count sent for `motor`.
pub fn mirror_steps(motor: MotorId, nominal: i32) -> i32 {
    match motor {
        MotorId::M1 => nominal,
        MotorId::M2 => nominal.saturating_neg(),
    }
}

/// Direct jog from the motor test controls. Steps are sent in the motor's
/// own direction, unmirrored.
pub fn motor(id: MotorId, steps: &str) -> Result<Command, InputError> {
    Ok(Command::Motor {
        id,
        steps: parse_steps("steps", steps)?,
    })
}

/// Moves both motors together by the same nominal amount.
pub fn both(steps: &str) -> Result<Command, InputError> {
    Ok(both_nominal(parse_steps("steps", steps)?))
}

/// Nudge used while finding travel limits: `step` steps in `direction`.
pub fn limit_jog(target: JogTarget, direction: JogDirection, step: StepIncrement) -> Command {
    let nominal = step.get().saturating_mul(direction.sign());
    match target {
        JogTarget::Motor(id) => Command::Motor {
            id,
            steps: mirror_steps(id, nominal),
        },
        JogTarget::Both => both_nominal(nominal),
    }
}

fn both_nominal(nominal: i32) -> Command {
    Command::Both {
        m1_steps: mirror_steps(MotorId::M1, nominal),
        m2_steps: mirror_steps(MotorId::M2, nominal),
    }
}

pub fn gains(kp_pitch: &str, ki_pitch: &str, kp_roll: &str, ki_roll: &str) -> Result<Command, InputError> {
    Ok(Command::Gains {
        kp_pitch: parse_finite("kpP", kp_pitch)?,
        ki_pitch: parse_finite("kiP", ki_pitch)?,
        kp_roll: parse_finite("kpR", kp_roll)?,
        ki_roll: parse_finite("kiR", ki_roll)?,
    })
}

pub fn tolerance(degrees: &str) -> Result<Command, InputError> {
    Ok(Command::Tolerance {
        degrees: parse_finite("tolerance", degrees)?,
    })
}

pub fn stab_timeout(seconds: &str) -> Result<Command, InputError> {
    Ok(Command::StabTimeout {
        seconds: parse_finite("stabTimeout", seconds)?,
    })
}

pub fn speed(rpm: &str) -> Result<Command, InputError> {
    let rpm = rpm.trim();
    let value = rpm.parse::<u32>().map_err(|_| InputError::NotAnInteger {
        field: "rpm",
        value: rpm.to_string(),
    })?;
    Ok(Command::Speed { rpm: value })
}

pub fn motor_reset(id: MotorId) -> Command {
    Command::MotorReset { id }
}

fn parse_finite(field: &'static str, raw: &str) -> Result<f64, InputError> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::NotANumber {
            field,
            value: raw.to_string(),
        })
}

fn parse_steps(field: &'static str, raw: &str) -> Result<i32, InputError> {
    let raw = raw.trim();
    raw.parse::<i32>().map_err(|_| InputError::NotAnInteger {
        field,
        value: raw.to_string(),
    })
}
