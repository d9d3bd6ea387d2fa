//! Line grammar for the operator prompt.
//!
//! Parsing only decides *which* action was asked for. Numeric arguments stay
//! text here and are validated by the command builders, so a bad number is
//! reported the same way whichever control produced it.

use crate::commands::{JogDirection, JogTarget};
use crate::error::InputError;
use leveler_shared::MotorId;

pub const HELP: &str = "\
motor <1|2> <steps>            jog one motor (raw direction)
both <steps>                   jog both motors together
limit <1|2|both> <in|out>      jog by the step increment
step <n>                       set the step increment
set-in <1|2> | set-out <1|2>   record a travel limit
config                         show the limit summary
reset-limits                   start a new calibration run
zero <1|2|all>                 reset position counters
gains <kpP> <kiP> <kpR> <kiR>  PI gains
tol <deg> | stab <sec>         tolerance / stability timeout
speed <rpm>                    motor speed
stop | release | calibrate | lock | unlock
> <text> | say <text>          raw serial command
reconnect | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroTarget {
    Motor(MotorId),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorAction {
    Motor { motor: MotorId, steps: String },
    Both { steps: String },
    LimitJog { target: JogTarget, direction: JogDirection },
    SetStep(String),
    SetIn(MotorId),
    SetOut(MotorId),
    ShowConfig,
    ResetLimits,
    Zero(ZeroTarget),
    Gains {
        kp_pitch: String,
        ki_pitch: String,
        kp_roll: String,
        ki_roll: String,
    },
    Tolerance(String),
    StabTimeout(String),
    Speed(String),
    Stop,
    Release,
    Calibrate,
    Lock,
    Unlock,
    Terminal(String),
    Reconnect,
    Help,
    Quit,
}

pub fn parse_action(line: &str) -> Result<OperatorAction, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(InputError::EmptyLine);
    }
    if let Some(rest) = line.strip_prefix('>') {
        return Ok(OperatorAction::Terminal(rest.trim().to_string()));
    }

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (line, ""),
    };
    let keyword = keyword.to_ascii_lowercase();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let action = match (keyword.as_str(), args.as_slice()) {
        ("motor" | "m", [motor, steps]) => OperatorAction::Motor {
            motor: parse_motor(motor)?,
            steps: steps.to_string(),
        },
        ("motor" | "m", _) => return Err(InputError::Usage("motor <1|2> <steps>")),

        ("both", [steps]) => OperatorAction::Both {
            steps: steps.to_string(),
        },
        ("both", _) => return Err(InputError::Usage("both <steps>")),

        ("limit", [target, direction]) => OperatorAction::LimitJog {
            target: parse_jog_target(target)?,
            direction: parse_direction(direction)?,
        },
        ("limit", _) => return Err(InputError::Usage("limit <1|2|both> <in|out>")),

        ("step", [n]) => OperatorAction::SetStep(n.to_string()),
        ("step", _) => return Err(InputError::Usage("step <n>")),

        ("set-in", [motor]) => OperatorAction::SetIn(parse_motor(motor)?),
        ("set-out", [motor]) => OperatorAction::SetOut(parse_motor(motor)?),
        ("set-in" | "set-out", _) => return Err(InputError::Usage("set-in|set-out <1|2>")),

        ("config", []) => OperatorAction::ShowConfig,
        ("reset-limits", []) => OperatorAction::ResetLimits,

        ("zero", [target]) if target.eq_ignore_ascii_case("all") => {
            OperatorAction::Zero(ZeroTarget::All)
        }
        ("zero", [motor]) => OperatorAction::Zero(ZeroTarget::Motor(parse_motor(motor)?)),
        ("zero", _) => return Err(InputError::Usage("zero <1|2|all>")),

        ("gains", [kp_p, ki_p, kp_r, ki_r]) => OperatorAction::Gains {
            kp_pitch: kp_p.to_string(),
            ki_pitch: ki_p.to_string(),
            kp_roll: kp_r.to_string(),
            ki_roll: ki_r.to_string(),
        },
        ("gains", _) => return Err(InputError::Usage("gains <kpP> <kiP> <kpR> <kiR>")),

        ("tol", [deg]) => OperatorAction::Tolerance(deg.to_string()),
        ("tol", _) => return Err(InputError::Usage("tol <deg>")),
        ("stab", [sec]) => OperatorAction::StabTimeout(sec.to_string()),
        ("stab", _) => return Err(InputError::Usage("stab <sec>")),
        ("speed", [rpm]) => OperatorAction::Speed(rpm.to_string()),
        ("speed", _) => return Err(InputError::Usage("speed <rpm>")),

        ("stop", []) => OperatorAction::Stop,
        ("release", []) => OperatorAction::Release,
        ("calibrate", []) => OperatorAction::Calibrate,
        ("lock", []) => OperatorAction::Lock,
        ("unlock", []) => OperatorAction::Unlock,

        ("say", _) => OperatorAction::Terminal(rest.to_string()),
        ("reconnect", []) => OperatorAction::Reconnect,
        ("help" | "?", _) => OperatorAction::Help,
        ("quit" | "exit", []) => OperatorAction::Quit,

        _ => return Err(InputError::UnknownCommand(line.to_string())),
    };
    Ok(action)
}

fn parse_motor(raw: &str) -> Result<MotorId, InputError> {
    match raw.trim_start_matches(['m', 'M']) {
        "1" => Ok(MotorId::M1),
        "2" => Ok(MotorId::M2),
        _ => Err(InputError::UnknownMotor(raw.to_string())),
    }
}

fn parse_jog_target(raw: &str) -> Result<JogTarget, InputError> {
    if raw.eq_ignore_ascii_case("both") {
        Ok(JogTarget::Both)
    } else {
        parse_motor(raw).map(JogTarget::Motor)
    }
}

fn parse_direction(raw: &str) -> Result<JogDirection, InputError> {
    match raw.to_ascii_lowercase().as_str() {
        "in" | "-" => Ok(JogDirection::In),
        "out" | "+" => Ok(JogDirection::Out),
        _ => Err(InputError::UnknownDirection(raw.to_string())),
    }
}
