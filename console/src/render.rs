//! Telemetry to display-state mapping.
//!
//! Everything here is a pure function of one [`TelemetryFrame`]; applying
//! the result to a screen is the job of [`crate::surface`].

use leveler_shared::{MotorId, TelemetryFrame};
use std::fmt;

/// Tilt (degrees) that puts the bubble on the outer ring.
pub const BUBBLE_FULL_SCALE_DEG: f64 = 10.0;
/// The bubble is kept this far inside the ring.
pub const BUBBLE_MARGIN: f64 = 8.0;
/// Below this total tilt an unlevel platform is "almost there".
pub const WARNING_TILT_DEG: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Good,
    Warning,
    Alert,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Good => "good",
            StatusColor::Warning => "warning",
            StatusColor::Alert => "alert",
        }
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bubble position relative to the ring center; `y` grows downwards like
/// screen coordinates, so a nose-up pitch gives a negative `y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubblePoint {
    pub x: f64,
    pub y: f64,
}

impl BubblePoint {
    pub fn distance(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeView {
    pub motor: MotorId,
    pub position: i64,
    /// Fill in percent, always within `0..=100`.
    pub percent: f64,
    pub at_limit: bool,
}

/// Device settings echoed back in the status frame, when the firmware sends them.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub tolerance: String,
    pub stability_timeout: String,
    pub gains: String,
}

/// Everything the dashboard shows for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryView {
    pub pitch: String,
    pub roll: String,
    pub state: String,
    pub badge_class: String,
    pub color: StatusColor,
    pub bubble: BubblePoint,
    pub bubble_radius: f64,
    pub gauges: [GaugeView; 2],
    pub accel: String,
    pub gyro: String,
    pub temperature: String,
    pub calibrated: String,
    pub uptime: String,
    pub settings: Option<SettingsView>,
}

pub fn render(frame: &TelemetryFrame, bubble_radius: f64) -> TelemetryView {
    TelemetryView {
        pitch: format!("{:.2}", frame.pitch),
        roll: format!("{:.2}", frame.roll),
        state: frame.state.clone(),
        badge_class: format!("badge-{}", frame.state.to_lowercase()),
        color: classify(frame.level, frame.pitch, frame.roll),
        bubble: project_bubble(frame.pitch, frame.roll, bubble_radius),
        bubble_radius,
        gauges: MotorId::ALL.map(|motor| gauge(frame, motor)),
        accel: format!("{}, {}, {} g", frame.ax, frame.ay, frame.az),
        gyro: format!("{}, {}, {} °/s", frame.gx, frame.gy, frame.gz),
        temperature: format!("{} °C", frame.temp),
        calibrated: if frame.cal { "Yes" } else { "No" }.to_string(),
        uptime: format_uptime(frame.up),
        settings: settings(frame),
    }
}

/// Projects the tilt onto the ring, clamping the bubble `BUBBLE_MARGIN`
/// inside the edge without changing its direction.
pub fn project_bubble(pitch: f64, roll: f64, radius: f64) -> BubblePoint {
    let mut x = (roll / BUBBLE_FULL_SCALE_DEG) * radius;
    let mut y = -(pitch / BUBBLE_FULL_SCALE_DEG) * radius;

    let limit = radius - BUBBLE_MARGIN;
    let dist = x.hypot(y);
    if dist > limit {
        let scale = limit / dist;
        x *= scale;
        y *= scale;
    }

    BubblePoint { x, y }
}

pub fn classify(level: bool, pitch: f64, roll: f64) -> StatusColor {
    if level {
        StatusColor::Good
    } else if (pitch * pitch + roll * roll).sqrt() < WARNING_TILT_DEG {
        StatusColor::Warning
    } else {
        StatusColor::Alert
    }
}

/// Position within the shared travel range, in percent.
///
/// An empty or inverted range is treated as a range of one step so the bar
/// never divides by zero or fills backwards.
pub fn gauge_percent(position: i64, min: i64, max: i64) -> f64 {
    // Widen before subtracting: a range spanning the whole i64 space overflows.
    let span = i128::from(max) - i128::from(min);
    let range = if span <= 0 { 1.0 } else { span as f64 };
    let offset = (i128::from(position) - i128::from(min)) as f64;
    (offset / range * 100.0).clamp(0.0, 100.0)
}

fn gauge(frame: &TelemetryFrame, motor: MotorId) -> GaugeView {
    let position = frame.motor_position(motor);
    GaugeView {
        motor,
        position,
        percent: gauge_percent(position, frame.m_min, frame.m_max),
        at_limit: frame.motor_at_limit(motor),
    }
}

pub fn format_uptime(ms: u64) -> String {
    let s = ms / 1000;
    if s < 60 {
        format!("{s}s")
    } else if s < 3600 {
        format!("{}m {}s", s / 60, s % 60)
    } else {
        format!("{}h {}m", s / 3600, (s % 3600) / 60)
    }
}

fn settings(frame: &TelemetryFrame) -> Option<SettingsView> {
    let tolerance = frame.tol?;
    let gains = match (frame.kp_p, frame.ki_p, frame.kp_r, frame.ki_r) {
        (Some(kp_p), Some(ki_p), Some(kp_r), Some(ki_r)) => {
            format!("pitch Kp={kp_p} Ki={ki_p}  roll Kp={kp_r} Ki={ki_r}")
        }
        _ => "-".to_string(),
    };
    let stability_timeout = match frame.st_ms {
        Some(ms) => format!("{:.1} s", ms as f64 / 1000.0),
        None => "-".to_string(),
    };

    Some(SettingsView {
        tolerance: format!("{tolerance:.2}°"),
        stability_timeout,
        gains,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const R: f64 = 90.0;

    fn frame() -> TelemetryFrame {
        TelemetryFrame {
            pitch: 1.234,
            roll: -0.5,
            state: "LEVEL_OK".to_string(),
            level: true,
            m1: 0,
            m2: 1024,
            m_min: -2048,
            m_max: 2048,
            m1_lim: false,
            m2_lim: true,
            ax: 0.012,
            ay: -0.004,
            az: 0.998,
            gx: 0.1,
            gy: 0.0,
            gz: -0.2,
            temp: 27.4,
            cal: true,
            up: 3_723_000,
            ..TelemetryFrame::default()
        }
    }

    #[test]
    fn bubble_follows_roll_right_and_pitch_up() {
        let p = project_bubble(2.0, 1.0, R);
        assert!((p.x - 9.0).abs() < 1e-9);
        assert!((p.y + 18.0).abs() < 1e-9);
    }

    #[test]
    fn bubble_at_rest_is_centered() {
        assert_eq!(project_bubble(0.0, 0.0, R), BubblePoint { x: 0.0, y: 0.0 });
    }

    #[test]
    fn bubble_is_clamped_inside_ring() {
        let p = project_bubble(0.0, 45.0, R);
        assert!((p.x - (R - BUBBLE_MARGIN)).abs() < 1e-9);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn classification_examples() {
        assert_eq!(classify(true, 9.0, 9.0), StatusColor::Good);
        assert_eq!(classify(false, 1.0, 1.0), StatusColor::Warning);
        assert_eq!(classify(false, 3.0, 0.0), StatusColor::Alert);
        assert_eq!(classify(false, 2.0, 0.0), StatusColor::Alert);
        assert_eq!(classify(false, f64::NAN, 0.0), StatusColor::Alert);
    }

    #[test]
    fn gauge_examples() {
        assert_eq!(gauge_percent(0, -2048, 2048), 50.0);
        assert_eq!(gauge_percent(-2048, -2048, 2048), 0.0);
        assert_eq!(gauge_percent(4096, -2048, 2048), 100.0);
        assert_eq!(gauge_percent(-5000, -2048, 2048), 0.0);
    }

    #[test]
    fn gauge_with_empty_or_inverted_range() {
        assert_eq!(gauge_percent(10, 10, 10), 0.0);
        assert_eq!(gauge_percent(11, 10, 10), 100.0);
        assert_eq!(gauge_percent(5, 100, -100), 0.0);
        assert_eq!(gauge_percent(i64::MAX, i64::MIN, i64::MAX), 100.0);
    }

    #[test]
    fn uptime_formats() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59_999), "59s");
        assert_eq!(format_uptime(61_000), "1m 1s");
        assert_eq!(format_uptime(3_599_000), "59m 59s");
        assert_eq!(format_uptime(3_723_000), "1h 2m");
    }

    #[test]
    fn renders_full_view() {
        let view = render(&frame(), R);
        assert_eq!(view.pitch, "1.23");
        assert_eq!(view.roll, "-0.50");
        assert_eq!(view.state, "LEVEL_OK");
        assert_eq!(view.badge_class, "badge-level_ok");
        assert_eq!(view.color, StatusColor::Good);
        assert_eq!(view.gauges[0].percent, 50.0);
        assert!(!view.gauges[0].at_limit);
        assert_eq!(view.gauges[1].motor, MotorId::M2);
        assert_eq!(view.gauges[1].position, 1024);
        assert_eq!(view.gauges[1].percent, 75.0);
        assert!(view.gauges[1].at_limit);
        assert_eq!(view.accel, "0.012, -0.004, 0.998 g");
        assert_eq!(view.gyro, "0.1, 0, -0.2 °/s");
        assert_eq!(view.temperature, "27.4 °C");
        assert_eq!(view.calibrated, "Yes");
        assert_eq!(view.uptime, "1h 2m");
        assert_eq!(view.settings, None);
    }

    #[test]
    fn renders_settings_echo() {
        let mut f = frame();
        f.tol = Some(0.5);
        f.st_ms = Some(3000);
        f.kp_p = Some(1.0);
        f.ki_p = Some(0.05);
        f.kp_r = Some(0.5);
        f.ki_r = Some(0.03);
        let settings = render(&f, R).settings.unwrap();
        assert_eq!(settings.tolerance, "0.50°");
        assert_eq!(settings.stability_timeout, "3.0 s");
        assert_eq!(settings.gains, "pitch Kp=1 Ki=0.05  roll Kp=0.5 Ki=0.03");
    }

    proptest! {
        #[test]
        fn gauge_is_always_within_bounds(pos in any::<i64>(), min in any::<i64>(), max in any::<i64>()) {
            let pct = gauge_percent(pos, min, max);
            prop_assert!(pct.is_finite());
            prop_assert!((0.0..=100.0).contains(&pct));
        }

        #[test]
        fn bubble_stays_inside_ring(pitch in -1.0e6f64..1.0e6, roll in -1.0e6f64..1.0e6, radius in 9.0f64..500.0) {
            let p = project_bubble(pitch, roll, radius);
            prop_assert!(p.distance() <= (radius - BUBBLE_MARGIN) * (1.0 + 1e-12));
        }

        #[test]
        fn bubble_clamp_keeps_direction(pitch in -90.0f64..90.0, roll in -90.0f64..90.0) {
            prop_assume!(pitch.hypot(roll) > 1e-6);
            let raw_x = (roll / BUBBLE_FULL_SCALE_DEG) * R;
            let raw_y = -(pitch / BUBBLE_FULL_SCALE_DEG) * R;
            let p = project_bubble(pitch, roll, R);
            prop_assert!((p.y.atan2(p.x) - raw_y.atan2(raw_x)).abs() < 1e-9);
        }

        #[test]
        fn classification_is_a_partition(level in any::<bool>(), pitch in -20.0f64..20.0, roll in -20.0f64..20.0) {
            let expected = if level {
                StatusColor::Good
            } else if (pitch * pitch + roll * roll).sqrt() < 2.0 {
                StatusColor::Warning
            } else {
                StatusColor::Alert
            };
            prop_assert_eq!(classify(level, pitch, roll), expected);
        }
    }
}
