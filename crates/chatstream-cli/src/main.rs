mod cli;
mod config;
mod error;
mod repl;

use anyhow::Result;
use chatstream_core::{ChatCompletion, MessageInput};
use clap::Parser;
use cli::Cli;
use config::CliConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so streamed replies on stdout stay clean
    let default_level = if cli.verbose { "chatstream_core=debug,info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error::handle_error(e);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().or_else(CliConfig::default_path);
    let file_config = CliConfig::load_from_path(config_path);
    let chat_config = file_config.resolve(&cli)?;

    let mut seed = Vec::new();
    if let Some(system) = file_config.system_prompt(&cli) {
        seed.push(MessageInput::system(system));
    }
    if let Some(path) = &cli.history {
        seed.extend(config::load_history(path)?);
    }

    tracing::debug!(
        endpoint = %chat_config.endpoint,
        model = %chat_config.params.model,
        seeded = seed.len(),
        "Starting chat session"
    );

    let chat = ChatCompletion::with_http(chat_config);
    if !seed.is_empty() {
        chat.set_messages(seed);
    }

    repl::run(chat, cli.prompt).await
}
