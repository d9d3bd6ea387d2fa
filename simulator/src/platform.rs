//! Bench model of the leveling platform.
//!
//! Motors move instantly, tilt follows motor positions linearly, and the
//! IMU readings are derived from the tilt with a small deterministic wobble
//! so the dashboard has something moving to show.

use leveler_shared::{Command, MotorId, TelemetryFrame};
use std::time::Instant;

pub const MOTOR_MIN_POSITION: i64 = -2048;
pub const MOTOR_MAX_POSITION: i64 = 2048;

/// Tilt produced per motor step, in degrees.
const DEG_PER_STEP: f64 = 0.005;
const BASE_PITCH_DEG: f64 = 2.5;
const BASE_ROLL_DEG: f64 = -1.2;
const WOBBLE_DEG: f64 = 0.02;

pub const DEFAULT_TOLERANCE_DEG: f64 = 0.5;
pub const DEFAULT_STAB_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_GAINS: Gains = Gains {
    kp_pitch: 1.0,
    ki_pitch: 0.05,
    kp_roll: 0.5,
    ki_roll: 0.03,
};
pub const DEFAULT_SPEED_RPM: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp_pitch: f64,
    pub ki_pitch: f64,
    pub kp_roll: f64,
    pub ki_roll: f64,
}

#[derive(Debug)]
pub struct Platform {
    m1: i64,
    m2: i64,
    m1_lim: bool,
    m2_lim: bool,
    limits_locked: bool,
    speed_rpm: u32,
    tolerance: f64,
    stab_timeout_ms: u64,
    gains: Gains,
    calibrated: bool,
    state: &'static str,
    tick: u64,
    started: Instant,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform {
    pub fn new() -> Self {
        Self {
            m1: 0,
            m2: 0,
            m1_lim: false,
            m2_lim: false,
            limits_locked: true,
            speed_rpm: DEFAULT_SPEED_RPM,
            tolerance: DEFAULT_TOLERANCE_DEG,
            stab_timeout_ms: DEFAULT_STAB_TIMEOUT_MS,
            gains: DEFAULT_GAINS,
            calibrated: false,
            state: "IDLE",
            tick: 0,
            started: Instant::now(),
        }
    }

    pub fn position(&self, motor: MotorId) -> i64 {
        match motor {
            MotorId::M1 => self.m1,
            MotorId::M2 => self.m2,
        }
    }

    pub fn limits_locked(&self) -> bool {
        self.limits_locked
    }

    pub fn speed_rpm(&self) -> u32 {
        self.speed_rpm
    }

    /// Applies one command and returns the log lines the controller would
    /// print in response.
    pub fn apply(&mut self, command: &Command) -> Vec<String> {
        match command {
            Command::Motor { id, steps } => {
                self.state = "TEST_MODE";
                self.step(*id, i64::from(*steps));
                vec![format!("{id} -> {}", self.position(*id))]
            }
            Command::Both { m1_steps, m2_steps } => {
                self.state = "TEST_MODE";
                self.step(MotorId::M1, i64::from(*m1_steps));
                self.step(MotorId::M2, i64::from(*m2_steps));
                vec![self.positions_line()]
            }
            Command::Gains {
                kp_pitch,
                ki_pitch,
                kp_roll,
                ki_roll,
            } => {
                self.gains = Gains {
                    kp_pitch: *kp_pitch,
                    ki_pitch: *ki_pitch,
                    kp_roll: *kp_roll,
                    ki_roll: *ki_roll,
                };
                vec![format!(
                    "Gains: pitch Kp={kp_pitch:.3} Ki={ki_pitch:.3}, roll Kp={kp_roll:.3} Ki={ki_roll:.3}"
                )]
            }
            Command::Tolerance { degrees } => {
                self.tolerance = degrees.abs();
                vec![format!("Tolerance: {:.2} deg", self.tolerance)]
            }
            Command::StabTimeout { seconds } => {
                self.stab_timeout_ms = (seconds.max(0.0) * 1000.0).round() as u64;
                vec![format!("Stability timeout: {} ms", self.stab_timeout_ms)]
            }
            Command::Serial { text } => self.serial(text),
            Command::MotorReset { id } => {
                match id {
                    MotorId::M1 => (self.m1, self.m1_lim) = (0, false),
                    MotorId::M2 => (self.m2, self.m2_lim) = (0, false),
                }
                vec![format!("{id} position reset")]
            }
            Command::ResetBoth => {
                (self.m1, self.m2) = (0, 0);
                (self.m1_lim, self.m2_lim) = (false, false);
                vec!["Motor positions reset".to_string()]
            }
            Command::Stop => {
                self.state = "IDLE";
                vec!["Motors stopped".to_string()]
            }
            Command::Speed { rpm } => {
                self.speed_rpm = *rpm;
                vec![format!("Speed: {rpm} RPM")]
            }
            Command::UnlockLimits => {
                self.limits_locked = false;
                (self.m1_lim, self.m2_lim) = (false, false);
                vec!["Motor limits UNLOCKED".to_string()]
            }
            Command::LockLimits => {
                self.limits_locked = true;
                self.m1 = self.clamp(MotorId::M1, self.m1);
                self.m2 = self.clamp(MotorId::M2, self.m2);
                vec!["Motor limits locked".to_string()]
            }
            Command::CalibrateImu => {
                self.calibrated = true;
                vec!["IMU calibration complete".to_string()]
            }
            Command::Release => {
                self.state = "IDLE";
                vec!["Motors released".to_string()]
            }
        }
    }

    fn serial(&self, text: &str) -> Vec<String> {
        match text.trim() {
            "mpos" => vec![self.positions_line()],
            "help" => vec!["Commands: mpos, m1 <steps>, m2 <steps>, mreset, help".to_string()],
            other => vec![format!("echo: {other}")],
        }
    }

    fn positions_line(&self) -> String {
        format!("M1={} M2={}", self.m1, self.m2)
    }

    fn step(&mut self, motor: MotorId, steps: i64) {
        let target = self.position(motor).saturating_add(steps);
        let clamped = self.clamp(motor, target);
        match motor {
            MotorId::M1 => self.m1 = clamped,
            MotorId::M2 => self.m2 = clamped,
        }
    }

    /// Clamps to the travel range when limits are locked and latches the
    /// limit flag for a move that hits a bound.
    fn clamp(&mut self, motor: MotorId, target: i64) -> i64 {
        if !self.limits_locked {
            return target;
        }
        let clamped = target.clamp(MOTOR_MIN_POSITION, MOTOR_MAX_POSITION);
        let at_limit = clamped == MOTOR_MIN_POSITION || clamped == MOTOR_MAX_POSITION;
        match motor {
            MotorId::M1 => self.m1_lim = at_limit,
            MotorId::M2 => self.m2_lim = at_limit,
        }
        clamped
    }

    /// Pitch and roll before wobble. Motor 2 is mirrored, so the nominal
    /// lift of the platform is `m1 - m2`.
    pub fn tilt(&self) -> (f64, f64) {
        let lift = (self.m1 - self.m2) as f64 / 2.0;
        let twist = (self.m1 + self.m2) as f64 / 2.0;
        (
            BASE_PITCH_DEG - lift * DEG_PER_STEP,
            BASE_ROLL_DEG - twist * DEG_PER_STEP,
        )
    }

    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn status_frame(&self) -> TelemetryFrame {
        let (pitch, roll) = self.tilt();
        let phase = self.tick as f64 * 0.7;
        let pitch = pitch + WOBBLE_DEG * phase.sin();
        let roll = roll + WOBBLE_DEG * phase.cos();
        let level = pitch.abs() <= self.tolerance && roll.abs() <= self.tolerance;
        let state = match (self.state, level) {
            ("TEST_MODE", _) => "TEST_MODE",
            (_, true) => "LEVEL_OK",
            (other, false) => other,
        };

        TelemetryFrame {
            pitch,
            roll,
            state: state.to_string(),
            level,
            m1: self.m1,
            m2: self.m2,
            m_min: MOTOR_MIN_POSITION,
            m_max: MOTOR_MAX_POSITION,
            m1_lim: self.m1_lim,
            m2_lim: self.m2_lim,
            ax: round3(roll.to_radians().sin()),
            ay: round3(pitch.to_radians().sin()),
            az: round3(pitch.to_radians().cos() * roll.to_radians().cos()),
            gx: round3(WOBBLE_DEG * phase.cos()),
            gy: round3(WOBBLE_DEG * phase.sin()),
            gz: 0.0,
            temp: round3(24.0 + 0.5 * (phase / 10.0).sin()),
            cal: self.calibrated,
            up: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            tol: Some(self.tolerance),
            st_ms: Some(self.stab_timeout_ms),
            kp_p: Some(self.gains.kp_pitch),
            ki_p: Some(self.gains.ki_pitch),
            kp_r: Some(self.gains.kp_roll),
            ki_r: Some(self.gains.ki_roll),
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
