use clap::Parser;
use payloadscope::{cli, config, errors};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    debug!(
        built = env!("BUILD_TIMESTAMP"),
        git = option_env!("GIT_HASH").unwrap_or("unknown"),
        "payloadscope starting"
    );

    let config_path = cli.config.as_str();
    let result = match cli.command {
        cli::Commands::Plan => cli::plan::handle_plan(config_path).await,
        cli::Commands::Attack(args) => cli::attack::handle_attack(config_path, args).await,
        cli::Commands::Monitor(args) => cli::monitor::handle_monitor(config_path, args).await,
        cli::Commands::Periodic => cli::monitor::handle_periodic(config_path).await,
        cli::Commands::Fuzz => cli::attack::handle_fuzz(config_path).await,
        cli::Commands::Report(args) => cli::report::handle_report(config_path, args).await,
        cli::Commands::Validate(args) => handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), errors::FuzzError> {
    let path = std::path::PathBuf::from(&args.config);
    let _config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    Ok(())
}
