use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let msg = err.to_string().to_lowercase();

    if msg.contains("api key not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set your API key with:");
        eprintln!("  {} export OPENAI_API_KEY=<value>", "$".dimmed());
        eprintln!("  or add `openai = \"<value>\"` under [api_keys] in the config file.");
    }

    if msg.contains("history") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  History files are JSON arrays of {{\"role\", \"content\"}} objects.");
    }

    std::process::exit(1);
}
