use crate::error::ConfigError;
use crate::render::BUBBLE_MARGIN;
use clap::Parser;
use leveler_shared::WS_PATH;
use std::time::Duration;
use url::Url;

/// Address of the controller's own access point.
pub const DEFAULT_HOST: &str = "192.168.4.1";
pub const DEFAULT_RECONNECT_MS: u64 = 2_000;
/// Shortest retry delay accepted; anything lower hammers an absent device.
pub const MIN_RECONNECT_MS: u64 = 250;
pub const DEFAULT_BUBBLE_RADIUS: f64 = 90.0;
pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Controller host: `192.168.4.1`, `leveler.local:8080`, `http://10.0.0.5`, ...
    #[arg(long, env = "LEVELER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Delay before a new connection attempt after the link drops (ms, at least 250)
    #[arg(long, env = "LEVELER_RECONNECT_MS", default_value_t = DEFAULT_RECONNECT_MS)]
    pub reconnect_ms: u64,

    /// Radius of the bubble-level ring, in display units
    #[arg(long, env = "LEVELER_BUBBLE_RADIUS", default_value_t = DEFAULT_BUBBLE_RADIUS)]
    pub bubble_radius: f64,

    /// Minimum time between two telemetry redraws (ms, 0 = every frame)
    #[arg(
        long,
        env = "LEVELER_RENDER_INTERVAL_MS",
        default_value_t = DEFAULT_RENDER_INTERVAL_MS
    )]
    pub render_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub ws_url: Url,
    pub reconnect_delay: Duration,
    pub bubble_radius: f64,
    pub render_interval: Duration,
}

impl ConsoleConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !(args.bubble_radius > BUBBLE_MARGIN) {
            return Err(ConfigError::BubbleRadius(args.bubble_radius));
        }
        if args.reconnect_ms < MIN_RECONNECT_MS {
            return Err(ConfigError::ReconnectDelay(args.reconnect_ms));
        }
        Ok(Self {
            ws_url: ws_endpoint(&args.host)?,
            reconnect_delay: Duration::from_millis(args.reconnect_ms),
            bubble_radius: args.bubble_radius,
            render_interval: Duration::from_millis(args.render_interval_ms),
        })
    }
}

/// Builds the fixed `ws(s)://host[:port]/ws` endpoint from whatever the
/// operator typed as the host. Any path, query or fragment is discarded.
pub fn ws_endpoint(host: &str) -> Result<Url, ConfigError> {
    let host = host.trim().trim_end_matches('/');
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|source| ConfigError::InvalidHost {
        host: host.to_string(),
        source,
    })?;

    let ws_scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(ws_scheme)
        .map_err(|()| ConfigError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_path(WS_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
