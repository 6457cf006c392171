use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logs to stderr so the document printed on stdout stays clean. `RUST_LOG`
/// overrides the default filter.
pub fn init(verbose: bool) {
    let default = if verbose {
        "slator_core=debug,slator_media=debug,slator_story=debug"
    } else {
        "slator_story=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );
    if subscriber.try_init().is_err() {
        eprintln!("tracing already initialized");
    }
}
