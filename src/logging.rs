use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn parse_level(raw: &str) -> Result<Level> {
    raw.trim()
        .parse::<Level>()
        .map_err(|_| anyhow!("unknown log level `{}` (expected trace, debug, info, warn or error)", raw))
}

/// Installs the global fmt subscriber. A second call leaves the first one in place.
pub fn init(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
