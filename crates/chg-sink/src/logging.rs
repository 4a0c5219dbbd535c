//! Subscriber setup for host processes.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary. Hosts that have no subscriber of their own can call
//! [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g.
/// `CHG_LOG=chg_sink=debug`.
pub const LOG_ENV: &str = "CHG_LOG";

/// Install a global `fmt` subscriber filtered by `CHG_LOG`, falling back to
/// `default_level` when the variable is unset or invalid.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_an_error() {
        let _ = init_tracing("warn");
        assert!(init_tracing("debug").is_err());
    }
}
