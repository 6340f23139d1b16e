//! voxcode - voice-driven development assistant

use voxcode::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging defaults to INFO, override with RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    cli::run().await
}
