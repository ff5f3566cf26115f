//! askdb - Ask a relational database questions in plain language.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use askdb::cli::Cli;
use askdb::config::{Config, ConnectionConfig};
use askdb::console::{self, Console, ConsoleReporter};
use askdb::db;
use askdb::llm::{OllamaClient, OllamaConfig, OllamaStatus};
use askdb::logging;
use askdb::session::Orchestrator;

#[tokio::main]
async fn main() {
    // Missing .env is fine
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if cli.log_stderr {
        logging::init_stderr_logging();
    } else {
        logging::init_file_logging();
    }

    if let Err(e) = dotenv {
        info!("No .env file loaded: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let connection = config.connection()?;

    let db = db::connect(&connection)
        .await
        .with_context(|| format!("Failed to connect to {}", connection.display_string()))?;
    let llm = OllamaClient::new(OllamaConfig::from(&config.llm))?;

    print_banner(&connection, &llm).await;

    let orchestrator = Orchestrator::new(db, Box::new(llm), config.session.max_attempts)?;
    let console = Console::terminal().await?;

    let outcome = match &cli.question {
        Some(question) => orchestrator
            .process(question, &console, &ConsoleReporter)
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
        None => console::run(&orchestrator, &console, &ConsoleReporter)
            .await
            .map(|processed| info!("Session ended after {} questions", processed))
            .map_err(anyhow::Error::from),
    };

    orchestrator
        .close()
        .await
        .context("Failed to close database connection")?;

    outcome
}

/// Builds the effective configuration: CLI flags over environment over file.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config_path();
    info!("Loading config from: {}", path.display());

    let mut config = Config::load_from_file(&path)?;
    config.apply_env_overrides();
    cli.apply_to(&mut config);
    config.validate()?;

    Ok(config)
}

async fn print_banner(connection: &ConnectionConfig, llm: &OllamaClient) {
    println!("askdb v{}", env!("CARGO_PKG_VERSION"));
    println!("Database: {}", connection.display_string());
    println!("Model:    {}", llm.config().model);

    let url = &llm.config().base_url;
    match llm.status().await {
        OllamaStatus::Running => println!("Ollama:   running at {url}\n"),
        status => println!("Ollama:   {status} at {url}\n"),
    }
}
