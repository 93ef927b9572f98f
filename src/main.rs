mod frontend {
    pub mod commands;
    pub mod render;
}

use anyhow::{Context, Result};
use frontend::commands::{self, Command, Outcome};
use persona_chat::core::config::Config;
use persona_chat::core::startup::build_app;
use persona_chat::core::tracing_init::init_tracing;
use std::env;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    // Optional starting location, e.g. a reset link
    let location = args.get(2).cloned().unwrap_or_else(|| "/".to_string());

    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        If this is your first time running the client, copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    init_tracing(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path, location))
}

async fn async_main(config: Config, config_path: PathBuf, location: String) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        backend = %config.backend.base_url,
        threshold = config.quota.threshold,
        storage = ?config.storage.path,
        log_level = %config.logging.level,
        "Persona chat starting"
    );

    let app = build_app(config)?;

    let resolution = app.bootstrap(&location).await;
    commands::show(&app, &resolution).await;
    println!("Type :help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C signal");
                break;
            }
        };

        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Ok(command) => {
                if let Outcome::Quit = commands::run(&app, command).await {
                    break;
                }
            }
            Err(e) => {
                warn!(input = %line, "Rejected command");
                println!("! {}", e);
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
