use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "chatstream")]
#[command(version, about = "ChatStream - stream chat completions in the terminal")]
pub struct Cli {
    /// Prompt to send once; omit to start an interactive session
    pub prompt: Option<String>,

    /// API key for the completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Chat-completion URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Sampling temperature (forwarded verbatim)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum tokens in the reply (forwarded verbatim)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// System prompt placed before the conversation
    #[arg(long)]
    pub system: Option<String>,

    /// JSON file with `[{"role", "content"}]` entries to seed the conversation
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Config file (defaults to ~/.config/chatstream/config.toml)
    #[arg(long, env = "CHATSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Close an aborted reply instead of leaving it pending
    #[arg(long)]
    pub finalize_on_abort: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
