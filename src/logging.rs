use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn setup_logger() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(if cfg!(debug_assertions) {
            LevelFilter::DEBUG.into()
        } else {
            LevelFilter::INFO.into()
        })
        .with_env_var("MDREVIEW_LOG")
        .from_env_lossy();

    let fmt = fmt::layer()
        .with_target(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(fmt)
        .with(env_filter)
        .init();
}
