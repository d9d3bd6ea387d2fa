use crate::error::InputError;
use chrono::{DateTime, Local};
use leveler_shared::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    /// Typed by the operator and sent as a serial command.
    Operator,
    /// Echoed by the device over the log channel.
    Device,
    /// Console bookkeeping such as the connect marker.
    Console,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalLine {
    pub at: DateTime<Local>,
    pub origin: LineOrigin,
    pub text: String,
}

/// Serial passthrough with an interleaved, append-only scrollback.
///
/// Sent lines are recorded when they are sent, not when the device answers;
/// replies arrive as ordinary device lines with no link to the request.
#[derive(Debug, Default)]
pub struct TerminalBridge {
    scrollback: Vec<TerminalLine>,
}

impl TerminalBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns an operator line into a `Serial` command and records it.
    pub fn submit(&mut self, raw: &str) -> Result<Command, InputError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(InputError::EmptyLine);
        }
        self.push(LineOrigin::Operator, format!(">> {text}"));
        Ok(Command::Serial {
            text: text.to_string(),
        })
    }

    pub fn push_device(&mut self, msg: String) -> &TerminalLine {
        self.push(LineOrigin::Device, msg)
    }

    pub fn push_console(&mut self, msg: impl Into<String>) -> &TerminalLine {
        self.push(LineOrigin::Console, msg.into())
    }

    pub fn last(&self) -> Option<&TerminalLine> {
        self.scrollback.last()
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[TerminalLine] {
        &self.scrollback
    }

    fn push(&mut self, origin: LineOrigin, text: String) -> &TerminalLine {
        self.scrollback.push(TerminalLine {
            at: Local::now(),
            origin,
            text,
        });
        &self.scrollback[self.scrollback.len() - 1]
    }
}
