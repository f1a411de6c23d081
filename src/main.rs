use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use digicard::config::{self, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if config::help_requested(&args) {
        println!("{}", config::USAGE);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let settings = Settings::from_env_and_args()?;
    info!(target: "startup", "digicard starting: RUST_LOG='{}', settings={:?}", rust_log, settings);

    digicard::server::run(settings).await
}
