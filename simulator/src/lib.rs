//! Bench stand-in for the leveling controller's WebSocket endpoint.

pub mod platform;
pub mod state;
pub mod web;

pub use state::SimState;
pub use web::router;

use leveler_shared::WsInMsg;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{MissedTickBehavior, interval};

/// Serves the simulator on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<SimState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Publishes one status frame per `tick` until the process ends.
pub async fn status_task(state: Arc<SimState>, tick: Duration) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let frame = {
            let mut platform = state.platform();
            platform.advance();
            platform.status_frame()
        };
        state.publish(WsInMsg::Status(frame));
    }
}
