//! Travel-limit calibration.
//!
//! The operator jogs each motor to its inner and outer physical stop and
//! commits the position the device reports there. Once all four stops are
//! known the console prints the shared min/max envelope for `config.h`.
//! Nothing here is ever sent to the device.

use crate::error::{CalibrationError, InputError};
use leveler_shared::{MotorId, TelemetryFrame};
use std::fmt;

pub const DEFAULT_STEP_INCREMENT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSlot {
    M1In,
    M1Out,
    M2In,
    M2Out,
}

impl LimitSlot {
    pub const ALL: [LimitSlot; 4] = [
        LimitSlot::M1In,
        LimitSlot::M1Out,
        LimitSlot::M2In,
        LimitSlot::M2Out,
    ];

    pub fn inner(motor: MotorId) -> Self {
        match motor {
            MotorId::M1 => LimitSlot::M1In,
            MotorId::M2 => LimitSlot::M2In,
        }
    }

    pub fn outer(motor: MotorId) -> Self {
        match motor {
            MotorId::M1 => LimitSlot::M1Out,
            MotorId::M2 => LimitSlot::M2Out,
        }
    }

    pub fn motor(self) -> MotorId {
        match self {
            LimitSlot::M1In | LimitSlot::M1Out => MotorId::M1,
            LimitSlot::M2In | LimitSlot::M2Out => MotorId::M2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitSlot::M1In => "M1 IN",
            LimitSlot::M1Out => "M1 OUT",
            LimitSlot::M2In => "M2 IN",
            LimitSlot::M2Out => "M2 OUT",
        }
    }
}

impl fmt::Display for LimitSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jog size used by the limit controls. Always at least one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepIncrement(i32);

impl StepIncrement {
    pub fn new(steps: i64) -> Result<Self, InputError> {
        if steps < 1 {
            return Err(InputError::StepTooSmall(steps));
        }
        i32::try_from(steps)
            .map(StepIncrement)
            .map_err(|_| InputError::NotAnInteger {
                field: "step",
                value: steps.to_string(),
            })
    }

    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let raw = raw.trim();
        let steps = raw.parse::<i64>().map_err(|_| InputError::NotAnInteger {
            field: "step",
            value: raw.to_string(),
        })?;
        Self::new(steps)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl Default for StepIncrement {
    fn default() -> Self {
        StepIncrement(DEFAULT_STEP_INCREMENT)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationState {
    pub m1_in: Option<i64>,
    pub m1_out: Option<i64>,
    pub m2_in: Option<i64>,
    pub m2_out: Option<i64>,
}

impl CalibrationState {
    pub fn get(&self, slot: LimitSlot) -> Option<i64> {
        match slot {
            LimitSlot::M1In => self.m1_in,
            LimitSlot::M1Out => self.m1_out,
            LimitSlot::M2In => self.m2_in,
            LimitSlot::M2Out => self.m2_out,
        }
    }

    fn slot_mut(&mut self, slot: LimitSlot) -> &mut Option<i64> {
        match slot {
            LimitSlot::M1In => &mut self.m1_in,
            LimitSlot::M1Out => &mut self.m1_out,
            LimitSlot::M2In => &mut self.m2_in,
            LimitSlot::M2Out => &mut self.m2_out,
        }
    }
}

/// Shared travel bounds for both motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub min_position: i64,
    pub max_position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedConfig {
    Complete(Envelope),
    Incomplete { missing: Vec<LimitSlot> },
}

impl DerivedConfig {
    pub const REQUIRED_ACTION: &'static str = "set all four limits";
}

impl fmt::Display for DerivedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedConfig::Complete(envelope) => write!(
                f,
                "travel envelope {}..{}",
                envelope.min_position, envelope.max_position
            ),
            DerivedConfig::Incomplete { missing } => {
                write!(f, "{} (missing: ", Self::REQUIRED_ACTION)?;
                for (i, slot) in missing.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(slot.as_str())?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationTracker {
    state: CalibrationState,
    step: StepIncrement,
}

impl CalibrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn step_increment(&self) -> StepIncrement {
        self.step
    }

    pub fn set_step_increment(&mut self, raw: &str) -> Result<StepIncrement, InputError> {
        self.step = StepIncrement::parse(raw)?;
        Ok(self.step)
    }

    pub fn commit_in(
        &mut self,
        motor: MotorId,
        frame: Option<&TelemetryFrame>,
    ) -> Result<i64, CalibrationError> {
        self.commit(LimitSlot::inner(motor), frame)
    }

    pub fn commit_out(
        &mut self,
        motor: MotorId,
        frame: Option<&TelemetryFrame>,
    ) -> Result<i64, CalibrationError> {
        self.commit(LimitSlot::outer(motor), frame)
    }

    /// Stores the motor position from `frame` into `slot`. Each slot takes
    /// one value per run; [`reset`](Self::reset) starts a new run.
    fn commit(
        &mut self,
        slot: LimitSlot,
        frame: Option<&TelemetryFrame>,
    ) -> Result<i64, CalibrationError> {
        let frame = frame.ok_or(CalibrationError::NoTelemetry)?;
        let entry = self.state.slot_mut(slot);
        if entry.is_some() {
            return Err(CalibrationError::SlotAlreadySet(slot));
        }
        let position = frame.motor_position(slot.motor());
        *entry = Some(position);
        Ok(position)
    }

    pub fn reset(&mut self) {
        self.state = CalibrationState::default();
    }

    pub fn derive_config(&self) -> DerivedConfig {
        let mut values = Vec::with_capacity(LimitSlot::ALL.len());
        let mut missing = Vec::new();
        for slot in LimitSlot::ALL {
            match self.state.get(slot) {
                Some(v) => values.push(v),
                None => missing.push(slot),
            }
        }

        match (values.iter().min(), values.iter().max()) {
            (Some(&min_position), Some(&max_position)) if missing.is_empty() => {
                DerivedConfig::Complete(Envelope {
                    min_position,
                    max_position,
                })
            }
            _ => DerivedConfig::Incomplete { missing },
        }
    }

    /// Text the operator copies into the firmware configuration.
    pub fn config_snippet(&self) -> String {
        let show = |slot| match self.state.get(slot) {
            Some(v) => v.to_string(),
            None => "?".to_string(),
        };

        let mut lines = vec![
            format!(
                "M1: IN={}  OUT={}",
                show(LimitSlot::M1In),
                show(LimitSlot::M1Out)
            ),
            format!(
                "M2: IN={}  OUT={}",
                show(LimitSlot::M2In),
                show(LimitSlot::M2Out)
            ),
            String::new(),
        ];

        match self.derive_config() {
            DerivedConfig::Complete(envelope) => {
                lines.push("// config.h values:".to_string());
                lines.push(format!("#define MOTOR_MIN_POSITION {}", envelope.min_position));
                lines.push(format!("#define MOTOR_MAX_POSITION {}", envelope.max_position));
            }
            incomplete @ DerivedConfig::Incomplete { .. } => {
                lines.push(format!("// {incomplete}"));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(m1: i64, m2: i64) -> TelemetryFrame {
        TelemetryFrame {
            m1,
            m2,
            ..TelemetryFrame::default()
        }
    }

    fn calibrated() -> CalibrationTracker {
        let mut t = CalibrationTracker::new();
        t.commit_in(MotorId::M1, Some(&at(200, 0))).unwrap();
        t.commit_out(MotorId::M1, Some(&at(800, 0))).unwrap();
        t.commit_in(MotorId::M2, Some(&at(0, 150))).unwrap();
        t.commit_out(MotorId::M2, Some(&at(0, 900))).unwrap();
        t
    }

    #[test]
    fn envelope_spans_all_four_values() {
        assert_eq!(
            calibrated().derive_config(),
            DerivedConfig::Complete(Envelope {
                min_position: 150,
                max_position: 900
            })
        );
    }

    #[test]
    fn envelope_is_joint_not_per_motor() {
        let mut t = CalibrationTracker::new();
        t.commit_in(MotorId::M1, Some(&at(-300, 0))).unwrap();
        t.commit_out(MotorId::M1, Some(&at(100, 0))).unwrap();
        t.commit_in(MotorId::M2, Some(&at(0, 50))).unwrap();
        t.commit_out(MotorId::M2, Some(&at(0, 1200))).unwrap();
        assert_eq!(
            t.derive_config(),
            DerivedConfig::Complete(Envelope {
                min_position: -300,
                max_position: 1200
            })
        );
    }

    #[test]
    fn incomplete_lists_unset_slots() {
        let mut t = CalibrationTracker::new();
        t.commit_in(MotorId::M1, Some(&at(200, 0))).unwrap();
        t.commit_out(MotorId::M2, Some(&at(0, 900))).unwrap();
        assert_eq!(
            t.derive_config(),
            DerivedConfig::Incomplete {
                missing: vec![LimitSlot::M1Out, LimitSlot::M2In]
            }
        );
    }

    #[test]
    fn commit_without_frame_is_declined() {
        let mut t = CalibrationTracker::new();
        assert_eq!(
            t.commit_in(MotorId::M1, None),
            Err(CalibrationError::NoTelemetry)
        );
        assert_eq!(t.state(), &CalibrationState::default());
    }

    #[test]
    fn commit_reads_the_matching_motor() {
        let mut t = CalibrationTracker::new();
        assert_eq!(t.commit_out(MotorId::M2, Some(&at(11, 22))), Ok(22));
        assert_eq!(t.state().m2_out, Some(22));
        assert_eq!(t.state().m1_out, None);
    }

    #[test]
    fn slots_are_set_once_per_run() {
        let mut t = CalibrationTracker::new();
        t.commit_in(MotorId::M1, Some(&at(200, 0))).unwrap();
        assert_eq!(
            t.commit_in(MotorId::M1, Some(&at(250, 0))),
            Err(CalibrationError::SlotAlreadySet(LimitSlot::M1In))
        );
        assert_eq!(t.state().m1_in, Some(200));

        t.reset();
        assert_eq!(t.commit_in(MotorId::M1, Some(&at(250, 0))), Ok(250));
    }

    #[test]
    fn step_increment_must_be_positive() {
        let mut t = CalibrationTracker::new();
        assert_eq!(t.step_increment().get(), DEFAULT_STEP_INCREMENT);
        assert_eq!(t.set_step_increment("0"), Err(InputError::StepTooSmall(0)));
        assert!(t.set_step_increment("-5").is_err());
        assert!(t.set_step_increment("ten").is_err());
        assert_eq!(t.step_increment().get(), DEFAULT_STEP_INCREMENT);
        assert_eq!(t.set_step_increment(" 25 ").map(StepIncrement::get), Ok(25));
        assert_eq!(t.step_increment().get(), 25);
    }

    #[test]
    fn snippet_while_incomplete() {
        let mut t = CalibrationTracker::new();
        t.commit_in(MotorId::M1, Some(&at(200, 0))).unwrap();
        assert_eq!(
            t.config_snippet(),
            "M1: IN=200  OUT=?\nM2: IN=?  OUT=?\n\n\
             // set all four limits (missing: M1 OUT, M2 IN, M2 OUT)"
        );
    }

    #[test]
    fn summary_names_what_is_left() {
        let mut t = CalibrationTracker::new();
        assert_eq!(
            t.derive_config().to_string(),
            "set all four limits (missing: M1 IN, M1 OUT, M2 IN, M2 OUT)"
        );
        t.commit_out(MotorId::M1, Some(&at(800, 0))).unwrap();
        assert!(t.derive_config().to_string().starts_with(DerivedConfig::REQUIRED_ACTION));
        assert_eq!(calibrated().derive_config().to_string(), "travel envelope 150..900");
    }

    #[test]
    fn snippet_when_complete() {
        assert_eq!(
            calibrated().config_snippet(),
            "M1: IN=200  OUT=800\nM2: IN=150  OUT=900\n\n\
             // config.h values:\n\
             #define MOTOR_MIN_POSITION 150\n\
             #define MOTOR_MAX_POSITION 900"
        );
    }
}
