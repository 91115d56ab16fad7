use anyhow::Result;
use colored::Colorize;

use crate::{
    app::{get_config_dir, init_config, Config},
    exchange::resolve_endpoint,
};

use super::Commands;

/// Handle CLI subcommands
pub fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("Initializing Parley configuration...");
            let path = init_config()?;
            println!("Configuration initialized successfully! ({})", path.display());
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Status => {
            show_status(config)?;
            Ok(true)
        }
        Commands::Chat => Ok(false), // Continue to chat interface
    }
}

/// Show version information
pub fn show_version() {
    println!("Parley v{}", env!("CARGO_PKG_VERSION"));
    println!("   Chat with a remote responder from the terminal");
}

/// Show configuration and endpoint status
fn show_status(config: &Config) -> Result<()> {
    println!("Parley Status:");
    println!();

    let config_path = get_config_dir()?.join("config.toml");
    if config_path.exists() {
        println!("  [OK] Configuration: {}", config_path.display());
    } else {
        println!("  [WARNING] Configuration: Not found (using defaults)");
    }

    match resolve_endpoint(config.endpoint.as_deref()) {
        Some(endpoint) => println!("  [OK] Endpoint: {}", endpoint.green()),
        None => println!(
            "  [ERROR] Endpoint: {} (set PARLEY_ENDPOINT or run `parley init`)",
            "not configured".red()
        ),
    }

    println!("  Request timeout: {}s", config.request_timeout_secs);
    println!("  Late responses: {:?}", config.late_responses);
    println!();
    Ok(())
}
