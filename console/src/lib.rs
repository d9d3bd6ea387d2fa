//! Operator console for the two-axis leveling platform.
//!
//! Talks to the controller over one WebSocket, renders its telemetry,
//! turns operator input into commands and walks the operator through
//! travel-limit calibration.

pub mod calibration;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod input;
pub mod render;
pub mod session;
pub mod surface;
pub mod terminal;

pub use config::{Args, ConsoleConfig};
pub use connection::{ConnectionManager, ConnectionState, WsConnector};
pub use session::{Flow, Session};
