use clap::Parser;
use firewatch_server::{logging, runtime, AppConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    logging::init_tracing(&config.logging.level);
    tracing::info!("Starting Firewatch server with config: {}", args.config);

    runtime::serve(config).await
}
