use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "anishift=warn";

// Diagnostics go to stderr; stdout carries command output.
pub fn init(verbose: u8) {
    let fallback = match verbose {
        0 => DEFAULT_FILTER,
        1 => "anishift=info",
        2 => "anishift=debug",
        _ => "anishift=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
