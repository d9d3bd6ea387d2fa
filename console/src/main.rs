use clap::Parser;
use leveler_console::surface::TextSurface;
use leveler_console::{Args, ConsoleConfig, Flow, Session, WsConnector};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout is the display; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LEVELER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ConsoleConfig::from_args(&args)?;
    info!("console for {} (type 'help')", config.ws_url);

    let surface = TextSurface::new(std::io::stdout(), config.render_interval);
    let (mut session, mut events) = Session::start(&config, WsConnector::default(), surface);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut redraw = tokio::time::interval(config.render_interval.max(Duration::from_millis(10)));
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = events.recv() => session.handle_connection_event(event),
            _ = redraw.tick() => session.flush_display(),
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if session.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                None => {
                    // Keep monitoring when stdin is closed (e.g. piped input ran out).
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    session.teardown();
    Ok(())
}
