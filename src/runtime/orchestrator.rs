use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::{
    app::{load_config, load_config_file, Config},
    cli::{handle_command, Cli},
    exchange::ExchangeFactory,
    session::SessionController,
};

use super::non_interactive::NonInteractiveRunner;
use super::repl::Repl;

/// Load configuration for a CLI invocation (explicit file > layered sources)
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        load_config_file(config_path)?
    } else {
        match load_config() {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("⚠️  Failed to load config: {}. Using defaults.", e);
                Config::default()
            }
        }
    };

    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    Ok(config)
}

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        let config = resolve_config(&cli)?;
        Ok(Self { cli, config })
    }

    /// Run the orchestrator
    pub async fn run(self) -> Result<()> {
        // Handle subcommands
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.config)? {
                return Ok(()); // Command handled, exit
            }
            // Continue to chat for Commands::Chat
        }

        let exchange = ExchangeFactory::create(&self.config)?;

        if let Some(prompt) = self.cli.prompt.clone() {
            let runner = NonInteractiveRunner::new(exchange, &self.config);
            let result = runner.execute(prompt).await;
            println!("{}", runner.format_result(&result, self.cli.output_format));
            if !result.is_success() {
                std::process::exit(1);
            }
            return Ok(());
        }

        if exchange.is_configured() {
            println!("Connected to {}", exchange.name().green());
        } else {
            println!(
                "{} messages will fail until an endpoint is set (PARLEY_ENDPOINT or `parley init`).",
                "No endpoint configured:".yellow()
            );
        }

        let controller = Arc::new(SessionController::new(
            exchange,
            self.config.late_responses,
        ));
        Repl::new(controller, self.config.ui.clone()).run().await
    }
}
