use crate::platform::Platform;
use leveler_shared::WsInMsg;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const OUTBOUND_CAPACITY: usize = 256;

pub struct SimState {
    /// The simulated controller.
    pub platform: Mutex<Platform>,

    /// Status frames and log lines → every connected console
    pub out_tx: broadcast::Sender<WsInMsg>,
}

impl SimState {
    pub fn new(platform: Platform) -> Self {
        let (out_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            platform: Mutex::new(platform),
            out_tx,
        }
    }

    pub fn platform(&self) -> MutexGuard<'_, Platform> {
        // A panic while holding the lock leaves the model usable.
        self.platform.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcasts to all clients; having none connected is fine.
    pub fn publish(&self, msg: WsInMsg) {
        let _ = self.out_tx.send(msg);
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new(Platform::new())
    }
}
