//! Persistent WebSocket link to the leveling controller.
//!
//! The manager is driven from one event loop: socket tasks and the
//! reconnect timer report back through a [`ConnectionEvent`] channel and the
//! loop feeds each event to [`ConnectionManager::handle_event`]. Each
//! connection attempt gets a new epoch; events from older attempts are
//! ignored, so a socket replaced by a reconnect can never touch the state.

use crate::error::ConnectionError;
use futures_util::{SinkExt, StreamExt};
use leveler_shared::{Command, TelemetryFrame, WsInMsg};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

pub const RECONNECT_DELAY: Duration = Duration::from_millis(2_000);

/// Upper bound on the TCP plus WebSocket handshake of one attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Every this many decode failures a warning is logged with the running count.
const DECODE_FAILURE_WARN_EVERY: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Opened {
        epoch: u64,
        outbound: mpsc::UnboundedSender<String>,
    },
    Message {
        epoch: u64,
        text: String,
    },
    Closed {
        epoch: u64,
        reason: String,
    },
    ReconnectDue {
        epoch: u64,
    },
}

/// Receiver side of the session: what the console does with a live link.
pub trait ConnectionHandler {
    fn on_connectivity_change(&mut self, connected: bool);
    fn on_frame(&mut self, frame: TelemetryFrame);
    fn on_log(&mut self, msg: String);
}

/// Opens one connection attempt and reports its lifetime as events.
///
/// An implementation sends `Opened` once the channel is usable, then
/// `Message` per inbound text, then exactly one `Closed`.
pub trait Connector {
    fn open(
        &self,
        url: &str,
        epoch: u64,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> JoinHandle<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

impl Connector for WsConnector {
    fn open(
        &self,
        url: &str,
        epoch: u64,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(run_socket(
            url.to_string(),
            epoch,
            self.connect_timeout,
            events,
        ))
    }
}

async fn run_socket(
    url: String,
    epoch: u64,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let reason = match socket_session(&url, epoch, connect_timeout, &events).await {
        Ok(()) => ConnectionError::ClosedByPeer.to_string(),
        Err(e) => e.to_string(),
    };
    let _ = events.send(ConnectionEvent::Closed { epoch, reason });
}

async fn socket_session(
    url: &str,
    epoch: u64,
    connect_timeout: Duration,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> Result<(), ConnectionError> {
    debug!("[WS] connecting to {url} (epoch={epoch})");
    let (ws_stream, _) =
        tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout(connect_timeout))??;
    let (mut write, mut read) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if events
        .send(ConnectionEvent::Opened {
            epoch,
            outbound: tx,
        })
        .is_err()
    {
        return Ok(());
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let result = loop {
        let Some(item) = read.next().await else {
            break Ok(());
        };
        match item {
            Ok(Message::Text(text)) => {
                let text = text.as_str().to_string();
                if events.send(ConnectionEvent::Message { epoch, text }).is_err() {
                    break Ok(());
                }
            }
            Ok(Message::Close(_)) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e.into()),
        }
    };

    writer.abort();
    result
}

pub struct ConnectionManager<C: Connector = WsConnector> {
    url: String,
    connector: C,
    state: ConnectionState,
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    socket: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    reconnect_delay: Duration,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    decode_failures: u64,
    torn_down: bool,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates the manager and immediately starts the first attempt.
    /// Must be called inside a tokio runtime.
    pub fn start(
        url: impl Into<String>,
        connector: C,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut manager = Self {
            url: url.into(),
            connector,
            state: ConnectionState::Disconnected,
            epoch: 0,
            outbound: None,
            socket: None,
            reconnect_timer: None,
            reconnect_delay,
            events_tx,
            decode_failures: 0,
            torn_down: false,
        };
        manager.connect();
        (manager, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    fn connect(&mut self) {
        self.cancel_reconnect();
        self.drop_socket();
        self.epoch += 1;
        self.state = ConnectionState::Connecting;
        info!("[WS] connecting to {} (epoch={})", self.url, self.epoch);
        self.socket = Some(
            self.connector
                .open(&self.url, self.epoch, self.events_tx.clone()),
        );
    }

    /// Drops the current link, if any, and starts a fresh attempt now.
    pub fn reconnect<H: ConnectionHandler + ?Sized>(&mut self, handler: &mut H) {
        let was_connected = self.state == ConnectionState::Connected;
        self.torn_down = false;
        self.connect();
        if was_connected {
            handler.on_connectivity_change(false);
        }
    }

    /// Ends the session. No further attempts are made after this.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel_reconnect();
        self.drop_socket();
        // Anything still in flight belongs to a dead epoch now.
        self.epoch += 1;
        self.state = ConnectionState::Disconnected;
        info!("[WS] session torn down");
    }

    /// Serializes and sends `command` if the link is up; otherwise does
    /// nothing. Returns whether the command was handed to the socket.
    pub fn send(&self, command: &Command) -> bool {
        if self.state != ConnectionState::Connected {
            debug!("[WS] {:?}: dropping '{}' command", self.state, command.name());
            return false;
        }
        let Some(outbound) = &self.outbound else {
            return false;
        };
        match serde_json::to_string(command) {
            Ok(text) => {
                trace!("[WS] -> {text}");
                outbound.send(text).is_ok()
            }
            Err(e) => {
                warn!("[WS] failed to encode '{}' command: {e}", command.name());
                false
            }
        }
    }

    pub fn handle_event<H: ConnectionHandler + ?Sized>(
        &mut self,
        event: ConnectionEvent,
        handler: &mut H,
    ) {
        match event {
            ConnectionEvent::Opened { epoch, outbound } if epoch == self.epoch => {
                self.state = ConnectionState::Connected;
                self.outbound = Some(outbound);
                info!("[WS] open (epoch={epoch})");
                handler.on_connectivity_change(true);
            }
            ConnectionEvent::Message { epoch, text } if epoch == self.epoch => {
                self.dispatch_inbound(&text, handler);
            }
            ConnectionEvent::Closed { epoch, reason } if epoch == self.epoch => {
                let was_connected = self.state == ConnectionState::Connected;
                self.state = ConnectionState::Disconnected;
                self.outbound = None;
                self.socket = None;
                warn!("[WS] link lost: {reason}");
                if was_connected {
                    handler.on_connectivity_change(false);
                }
                self.schedule_reconnect();
            }
            ConnectionEvent::ReconnectDue { epoch }
                if epoch == self.epoch && self.reconnect_timer.is_some() =>
            {
                self.reconnect_timer = None;
                self.connect();
            }
            stale => trace!("[WS] ignoring stale event {stale:?}"),
        }
    }

    fn dispatch_inbound<H: ConnectionHandler + ?Sized>(&mut self, text: &str, handler: &mut H) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<WsInMsg>(line) {
                Ok(WsInMsg::Status(frame)) => handler.on_frame(frame),
                Ok(WsInMsg::Log { msg }) => handler.on_log(msg),
                Err(e) => self.note_decode_failure(line, &e),
            }
        }
    }

    fn note_decode_failure(&mut self, line: &str, err: &serde_json::Error) {
        self.decode_failures += 1;
        debug!("[WS] dropped undecodable message ({err}): {line:?}");
        if self.decode_failures % DECODE_FAILURE_WARN_EVERY == 1 {
            warn!(
                "[WS] {} inbound message(s) failed to decode so far; latest: {err}",
                self.decode_failures
            );
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.torn_down || self.reconnect_timer.is_some() {
            return;
        }
        let epoch = self.epoch;
        let delay = self.reconnect_delay;
        let events = self.events_tx.clone();
        debug!("[WS] reconnecting in {delay:?}");
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ConnectionEvent::ReconnectDue { epoch });
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn drop_socket(&mut self) {
        self.outbound = None;
        if let Some(socket) = self.socket.take() {
            socket.abort();
        }
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.cancel_reconnect();
        self.drop_socket();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts attempts; the "socket" never does anything on its own.
    #[derive(Clone, Default)]
    pub(crate) struct CountingConnector {
        pub attempts: Rc<Cell<usize>>,
    }

    impl Connector for CountingConnector {
        fn open(
            &self,
            _url: &str,
            _epoch: u64,
            _events: mpsc::UnboundedSender<ConnectionEvent>,
        ) -> JoinHandle<()> {
            self.attempts.set(self.attempts.get() + 1);
            tokio::spawn(std::future::pending())
        }
    }

    #[derive(Default)]
    struct Recorder {
        connectivity: Vec<bool>,
        frames: Vec<TelemetryFrame>,
        logs: Vec<String>,
    }

    impl ConnectionHandler for Recorder {
        fn on_connectivity_change(&mut self, connected: bool) {
            self.connectivity.push(connected);
        }
        fn on_frame(&mut self, frame: TelemetryFrame) {
            self.frames.push(frame);
        }
        fn on_log(&mut self, msg: String) {
            self.logs.push(msg);
        }
    }

    fn manager() -> (
        ConnectionManager<CountingConnector>,
        mpsc::UnboundedReceiver<ConnectionEvent>,
        Rc<Cell<usize>>,
    ) {
        let connector = CountingConnector::default();
        let attempts = connector.attempts.clone();
        let (m, rx) = ConnectionManager::start("ws://bench/ws", connector, RECONNECT_DELAY);
        (m, rx, attempts)
    }

    /// Pretends the current attempt succeeded; returns the device end of
    /// the outbound channel.
    pub(crate) fn open<C: Connector, H: ConnectionHandler>(
        m: &mut ConnectionManager<C>,
        handler: &mut H,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let epoch = m.epoch;
        m.handle_event(
            ConnectionEvent::Opened {
                epoch,
                outbound: tx,
            },
            handler,
        );
        rx
    }

    pub(crate) fn current_epoch<C: Connector>(m: &ConnectionManager<C>) -> u64 {
        m.epoch
    }

    fn close<C: Connector, H: ConnectionHandler>(m: &mut ConnectionManager<C>, handler: &mut H) {
        let epoch = m.epoch;
        m.handle_event(
            ConnectionEvent::Closed {
                epoch,
                reason: "test".into(),
            },
            handler,
        );
    }

    const STATUS: &str = r#"{"t":"status","pitch":0.5,"roll":0.25,"state":"LEVEL_OK","level":true,"m1":10,"m2":-10,"mMin":-2048,"mMax":2048,"m1Lim":false,"m2Lim":false,"ax":0,"ay":0,"az":1,"gx":0,"gy":0,"gz":0,"temp":25,"cal":true,"up":1000}"#;

    #[tokio::test]
    async fn starts_connecting() {
        let (m, _rx, attempts) = manager();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn opened_event_connects_and_signals() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(rec.connectivity, vec![true]);
    }

    #[tokio::test]
    async fn send_serializes_when_connected() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let mut device = open(&mut m, &mut rec);
        assert!(m.send(&Command::Stop));
        assert_eq!(device.try_recv().unwrap(), r#"{"cmd":"mstop"}"#);
    }

    #[tokio::test]
    async fn send_while_not_connected_is_a_silent_no_op() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        assert!(!m.send(&Command::Stop));

        let mut device = open(&mut m, &mut rec);
        close(&mut m, &mut rec);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.send(&Command::Stop));
        assert!(device.try_recv().is_err());
    }

    #[tokio::test]
    async fn routes_status_and_log_lines() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);
        let epoch = m.epoch;
        let text = format!("{STATUS}\n{{\"t\":\"log\",\"msg\":\"hello\"}}\n");
        m.handle_event(ConnectionEvent::Message { epoch, text }, &mut rec);
        assert_eq!(rec.frames.len(), 1);
        assert_eq!(rec.frames[0].m1, 10);
        assert_eq!(rec.logs, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn malformed_input_is_dropped_and_counted() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);
        let epoch = m.epoch;
        for text in ["{not json", r#"{"t":"status","pitch":1}"#, r#"{"t":"nope"}"#] {
            m.handle_event(
                ConnectionEvent::Message {
                    epoch,
                    text: text.to_string(),
                },
                &mut rec,
            );
        }
        assert!(rec.frames.is_empty());
        assert_eq!(m.decode_failures(), 3);
        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(!m.reconnect_pending());
        assert_eq!(rec.connectivity, vec![true]);
    }

    #[tokio::test]
    async fn stale_epoch_events_are_ignored() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let stale = m.epoch;
        m.reconnect(&mut rec);
        m.handle_event(
            ConnectionEvent::Message {
                epoch: stale,
                text: STATUS.to_string(),
            },
            &mut rec,
        );
        m.handle_event(
            ConnectionEvent::Closed {
                epoch: stale,
                reason: "old socket".into(),
            },
            &mut rec,
        );
        assert!(rec.frames.is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.reconnect_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn close_schedules_exactly_one_reconnect() {
        let (mut m, mut rx, attempts) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);

        // Error and close can both be reported for one failure.
        close(&mut m, &mut rec);
        close(&mut m, &mut rec);
        assert_eq!(rec.connectivity, vec![true, false]);
        assert!(m.reconnect_pending());

        let started = tokio::time::Instant::now();
        let event = rx.recv().await.unwrap();
        assert!(started.elapsed() >= RECONNECT_DELAY);
        assert!(matches!(event, ConnectionEvent::ReconnectDue { .. }));
        m.handle_event(event, &mut rec);
        assert_eq!(attempts.get(), 2);
        assert_eq!(m.state(), ConnectionState::Connecting);

        let next = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await;
        assert!(next.is_err(), "no second reconnect expected");
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_retries_again() {
        let (mut m, mut rx, attempts) = manager();
        let mut rec = Recorder::default();
        close(&mut m, &mut rec);
        assert!(rec.connectivity.is_empty());

        let event = rx.recv().await.unwrap();
        m.handle_event(event, &mut rec);
        close(&mut m, &mut rec);
        let event = rx.recv().await.unwrap();
        m.handle_event(event, &mut rec);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_reconnect() {
        let (mut m, mut rx, attempts) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);
        close(&mut m, &mut rec);
        assert!(m.reconnect_pending());

        m.teardown();
        assert!(!m.reconnect_pending());
        assert_eq!(m.state(), ConnectionState::Disconnected);

        let next = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await;
        assert!(next.is_err(), "timer should have been cancelled");
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_reconnect_replaces_pending_timer() {
        let (mut m, mut rx, attempts) = manager();
        let mut rec = Recorder::default();
        close(&mut m, &mut rec);
        assert!(m.reconnect_pending());

        m.reconnect(&mut rec);
        assert!(!m.reconnect_pending());
        assert_eq!(attempts.get(), 2);

        let next = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await;
        assert!(next.is_err());
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn manual_reconnect_while_connected_signals_loss() {
        let (mut m, _rx, _) = manager();
        let mut rec = Recorder::default();
        let _device = open(&mut m, &mut rec);
        m.reconnect(&mut rec);
        assert_eq!(rec.connectivity, vec![true, false]);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.send(&Command::Stop));
    }
}
