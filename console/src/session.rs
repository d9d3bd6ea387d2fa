//! One operator session: the connection plus everything shown around it.

use crate::calibration::{CalibrationTracker, DerivedConfig, LimitSlot};
use crate::commands;
use crate::config::ConsoleConfig;
use crate::connection::{
    ConnectionEvent, ConnectionHandler, ConnectionManager, ConnectionState, Connector, WsConnector,
};
use crate::error::{CalibrationError, InputError};
use crate::input::{self, HELP, OperatorAction, ZeroTarget};
use crate::render::{self, TelemetryView};
use crate::surface::Surface;
use crate::terminal::TerminalBridge;
use leveler_shared::{Command, TelemetryFrame};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const CONNECTED_MARKER: &str = "[Connected]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Display-side state. Receives telemetry and log lines from the link and
/// owns the calibration workflow and the terminal scrollback.
pub struct Console<S: Surface> {
    surface: S,
    bubble_radius: f64,
    last_frame: Option<TelemetryFrame>,
    view: Option<TelemetryView>,
    connected: bool,
    calibration: CalibrationTracker,
    terminal: TerminalBridge,
}

impl<S: Surface> Console<S> {
    pub fn new(surface: S, bubble_radius: f64) -> Self {
        Self {
            surface,
            bubble_radius,
            last_frame: None,
            view: None,
            connected: false,
            calibration: CalibrationTracker::new(),
            terminal: TerminalBridge::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn last_frame(&self) -> Option<&TelemetryFrame> {
        self.last_frame.as_ref()
    }

    pub fn view(&self) -> Option<&TelemetryView> {
        self.view.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn calibration(&self) -> &CalibrationTracker {
        &self.calibration
    }

    pub fn terminal(&self) -> &TerminalBridge {
        &self.terminal
    }

    fn decline(&mut self, err: &dyn std::fmt::Display) {
        debug!("declined operator action: {err}");
        self.surface.show_notice(&err.to_string());
    }

    fn show_calibration(&mut self) {
        let snippet = self.calibration.config_snippet();
        self.surface
            .show_calibration(&snippet, self.calibration.step_increment());
    }

    fn report_commit(&mut self, slot: LimitSlot, result: Result<i64, CalibrationError>) {
        match result {
            Ok(position) => {
                info!("{slot} set to {position}");
                self.show_calibration();
            }
            Err(e) => self.decline(&e),
        }
    }

    fn set_step(&mut self, raw: &str) {
        match self.calibration.set_step_increment(raw) {
            Ok(_) => self.show_calibration(),
            Err(e) => self.decline(&e),
        }
    }

    fn submit_terminal(&mut self, text: &str) -> Result<Command, InputError> {
        let command = self.terminal.submit(text)?;
        if let Some(line) = self.terminal.last() {
            self.surface.show_terminal_line(line);
        }
        Ok(command)
    }
}

impl<S: Surface> ConnectionHandler for Console<S> {
    fn on_connectivity_change(&mut self, connected: bool) {
        self.connected = connected;
        self.surface.show_connectivity(connected);
        if connected {
            let line = self.terminal.push_console(CONNECTED_MARKER);
            self.surface.show_terminal_line(line);
        }
    }

    fn on_frame(&mut self, frame: TelemetryFrame) {
        let view = render::render(&frame, self.bubble_radius);
        self.surface.show_telemetry(&view);
        self.last_frame = Some(frame);
        self.view = Some(view);
    }

    fn on_log(&mut self, msg: String) {
        let line = self.terminal.push_device(msg);
        self.surface.show_terminal_line(line);
    }
}

pub struct Session<S: Surface, C: Connector = WsConnector> {
    connection: ConnectionManager<C>,
    console: Console<S>,
}

impl<S: Surface, C: Connector> Session<S, C> {
    /// Builds the session and starts connecting. The returned receiver must
    /// be drained into [`Session::handle_connection_event`].
    pub fn start(
        config: &ConsoleConfig,
        connector: C,
        surface: S,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (connection, events) =
            ConnectionManager::start(config.ws_url.as_str(), connector, config.reconnect_delay);
        let session = Self {
            connection,
            console: Console::new(surface, config.bubble_radius),
        };
        (session, events)
    }

    pub fn console(&self) -> &Console<S> {
        &self.console
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        self.connection.handle_event(event, &mut self.console);
    }

    /// Lets the surface draw telemetry it held back while throttled.
    pub fn flush_display(&mut self) {
        self.console.surface.flush();
    }

    /// Parses and runs one line typed at the prompt. Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }
        match input::parse_action(line) {
            Ok(action) => self.handle_action(action),
            Err(e) => {
                self.console.decline(&e);
                Flow::Continue
            }
        }
    }

    pub fn handle_action(&mut self, action: OperatorAction) -> Flow {
        let command = match action {
            OperatorAction::Motor { motor, steps } => commands::motor(motor, &steps),
            OperatorAction::Both { steps } => commands::both(&steps),
            OperatorAction::LimitJog { target, direction } => Ok(commands::limit_jog(
                target,
                direction,
                self.console.calibration.step_increment(),
            )),
            OperatorAction::Gains {
                kp_pitch,
                ki_pitch,
                kp_roll,
                ki_roll,
            } => commands::gains(&kp_pitch, &ki_pitch, &kp_roll, &ki_roll),
            OperatorAction::Tolerance(deg) => commands::tolerance(&deg),
            OperatorAction::StabTimeout(sec) => commands::stab_timeout(&sec),
            OperatorAction::Speed(rpm) => commands::speed(&rpm),
            OperatorAction::Zero(ZeroTarget::Motor(id)) => Ok(commands::motor_reset(id)),
            OperatorAction::Zero(ZeroTarget::All) => Ok(Command::ResetBoth),
            OperatorAction::Stop => Ok(Command::Stop),
            OperatorAction::Release => Ok(Command::Release),
            OperatorAction::Calibrate => Ok(Command::CalibrateImu),
            OperatorAction::Lock => Ok(Command::LockLimits),
            OperatorAction::Unlock => Ok(Command::UnlockLimits),
            OperatorAction::Terminal(text) => self.console.submit_terminal(&text),

            OperatorAction::SetStep(raw) => {
                self.console.set_step(&raw);
                return Flow::Continue;
            }
            OperatorAction::SetIn(motor) => {
                let console = &mut self.console;
                let result = console
                    .calibration
                    .commit_in(motor, console.last_frame.as_ref());
                console.report_commit(LimitSlot::inner(motor), result);
                return Flow::Continue;
            }
            OperatorAction::SetOut(motor) => {
                let console = &mut self.console;
                let result = console
                    .calibration
                    .commit_out(motor, console.last_frame.as_ref());
                console.report_commit(LimitSlot::outer(motor), result);
                return Flow::Continue;
            }
            OperatorAction::ShowConfig => {
                self.console.show_calibration();
                let derived = self.console.calibration.derive_config();
                if matches!(derived, DerivedConfig::Incomplete { .. }) {
                    self.console.surface.show_notice(&derived.to_string());
                }
                return Flow::Continue;
            }
            OperatorAction::ResetLimits => {
                self.console.calibration.reset();
                self.console.show_calibration();
                return Flow::Continue;
            }
            OperatorAction::Reconnect => {
                self.connection.reconnect(&mut self.console);
                return Flow::Continue;
            }
            OperatorAction::Help => {
                for line in HELP.lines() {
                    self.console.surface.show_notice(line);
                }
                return Flow::Continue;
            }
            OperatorAction::Quit => {
                self.teardown();
                return Flow::Quit;
            }
        };

        match command {
            Ok(command) => self.send(&command),
            Err(e) => self.console.decline(&e),
        }
        Flow::Continue
    }

    fn send(&mut self, command: &Command) {
        if self.connection.send(command) {
            debug!("sent '{}'", command.name());
        }
    }

    /// Ends the session; the link is closed and no reconnect follows.
    pub fn teardown(&mut self) {
        let was_connected = self.connection.state() == ConnectionState::Connected;
        self.connection.teardown();
        if was_connected {
            self.console.on_connectivity_change(false);
        }
    }
}
