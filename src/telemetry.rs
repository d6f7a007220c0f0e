use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Fallback filter used by the binaries when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the process-wide fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (every bin
/// passes [`DEFAULT_FILTER`]). Events carry target, file and line. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))?;

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing subscriber already set: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let _ = init_tracing(DEFAULT_FILTER);
        assert!(init_tracing(DEFAULT_FILTER).is_err());
    }
}
