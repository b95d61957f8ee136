use clap::Parser;
use nfc_realtime::cli::{Cli, Commands};
use nfc_realtime::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });
    let mut config = config.apply_env();
    if let Some(url) = cli.url.clone() {
        config.realtime.url = url;
    }

    // Initialize telemetry
    nfc_realtime::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Listen(args) => {
            tracing::info!("Starting listen mode");
            args.execute(&config).await?;
        }
        Commands::Send(args) => {
            args.execute(&config).await?;
        }
        Commands::Track(args) => {
            tracing::info!("Starting attendance tracking");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
