//! Where the console shows things.
//!
//! The session never formats output itself; it hands view values to a
//! [`Surface`]. The binary uses [`TextSurface`] on stdout.

use crate::calibration::StepIncrement;
use crate::render::{GaugeView, TelemetryView};
use crate::terminal::{LineOrigin, TerminalLine};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::warn;

pub trait Surface {
    fn show_connectivity(&mut self, connected: bool);
    fn show_telemetry(&mut self, view: &TelemetryView);
    fn show_terminal_line(&mut self, line: &TerminalLine);
    fn show_calibration(&mut self, snippet: &str, step: StepIncrement);
    /// One-line message for the operator, e.g. why an action was declined.
    fn show_notice(&mut self, notice: &str);
    /// Draws anything held back by throttling once it is due.
    fn flush(&mut self) {}
}

const GAUGE_WIDTH: usize = 20;

/// Plain-text surface. Telemetry arrives far faster than anyone can read,
/// so redraws are limited to one per `render_interval`. A frame that lands
/// inside the interval is kept and drawn by the next [`Surface::flush`]
/// once the interval has passed, so the last frame of a burst always shows.
pub struct TextSurface<W: Write> {
    out: W,
    render_interval: Duration,
    last_render: Option<Instant>,
    pending: Option<String>,
}

impl<W: Write> TextSurface<W> {
    pub fn new(out: W, render_interval: Duration) -> Self {
        Self {
            out,
            render_interval,
            last_render: None,
            pending: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            warn!("failed to write to display: {e}");
        }
    }

    fn render_due(&mut self) -> bool {
        let now = Instant::now();
        match self.last_render {
            Some(at) if now.duration_since(at) < self.render_interval => false,
            _ => {
                self.last_render = Some(now);
                true
            }
        }
    }

    fn draw_pending(&mut self) {
        if let Some(text) = self.pending.take() {
            self.emit(&text);
        }
    }
}

impl<W: Write> Surface for TextSurface<W> {
    fn show_connectivity(&mut self, connected: bool) {
        let text = if connected {
            "link: connected"
        } else {
            "link: disconnected"
        };
        // The last picture before a link change must not be lost.
        self.draw_pending();
        self.emit(text);
    }

    fn show_telemetry(&mut self, view: &TelemetryView) {
        let text = format_telemetry(view);
        if self.render_due() {
            self.pending = None;
            self.emit(&text);
        } else {
            self.pending = Some(text);
        }
    }

    fn show_terminal_line(&mut self, line: &TerminalLine) {
        let tag = match line.origin {
            LineOrigin::Operator => "tx",
            LineOrigin::Device => "rx",
            LineOrigin::Console => "--",
        };
        let text = format!("{} {tag} {}", line.at.format("%H:%M:%S"), line.text);
        self.emit(&text);
    }

    fn show_calibration(&mut self, snippet: &str, step: StepIncrement) {
        let text = format!("step increment: {}\n{snippet}", step.get());
        self.emit(&text);
    }

    fn show_notice(&mut self, notice: &str) {
        self.emit(&format!("! {notice}"));
    }

    fn flush(&mut self) {
        if self.pending.is_some() && self.render_due() {
            self.draw_pending();
        }
    }
}

fn format_telemetry(view: &TelemetryView) -> String {
    let mut lines = vec![
        format!(
            "pitch {}°  roll {}°  [{}] {}",
            view.pitch, view.roll, view.state, view.color
        ),
        format!(
            "bubble ({:+.1}, {:+.1}) r={}",
            view.bubble.x, view.bubble.y, view.bubble_radius
        ),
    ];
    lines.extend(view.gauges.iter().map(format_gauge));
    lines.push(format!(
        "accel {}  gyro {}  temp {}  cal {}  up {}",
        view.accel, view.gyro, view.temperature, view.calibrated, view.uptime
    ));
    if let Some(settings) = &view.settings {
        lines.push(format!(
            "tol {}  stab {}  gains {}",
            settings.tolerance, settings.stability_timeout, settings.gains
        ));
    }
    lines.join("\n")
}

fn format_gauge(gauge: &GaugeView) -> String {
    let filled = ((gauge.percent / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    let filled = filled.min(GAUGE_WIDTH);
    format!(
        "{} [{}{}] {:>6} {:5.1}%{}",
        gauge.motor,
        "#".repeat(filled),
        ".".repeat(GAUGE_WIDTH - filled),
        gauge.position,
        gauge.percent,
        if gauge.at_limit { "  LIMIT" } else { "" }
    )
}
