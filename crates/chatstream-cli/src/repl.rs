use std::io::Write;

use anyhow::Result;
use chatstream_core::{ChatCompletion, ChatSnapshot, Conversation, MessageInput, SubmitOutcome};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

const PROMPT: &str = "> ";

/// Run a single prompt, or read prompts from stdin until `/exit` or EOF.
pub async fn run(chat: ChatCompletion, prompt: Option<String>) -> Result<()> {
    if let Some(prompt) = prompt {
        return match stream_reply(&chat, prompt).await? {
            SubmitOutcome::Failed(e) => Err(e.into()),
            outcome => {
                report(&chat, &outcome);
                Ok(())
            }
        };
    }

    println!(
        "{} {}",
        "chatstream".cyan().bold(),
        "(/reset, /history, /exit; Ctrl-C stops a reply)".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT.green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                chat.reset_messages();
                println!("{}", "Conversation cleared.".dimmed());
            }
            "/history" => print_history(&chat.messages())?,
            _ => {
                let outcome = stream_reply(&chat, input.to_string()).await?;
                report(&chat, &outcome);
            }
        }
    }

    Ok(())
}

/// Submit `prompt` and echo the reply as it grows. Ctrl-C aborts the request.
async fn stream_reply(chat: &ChatCompletion, prompt: String) -> Result<SubmitOutcome> {
    // Placeholder lands right after the user message
    let reply_index = chat.messages().len() + 1;
    let mut printed = 0;
    let mut rx = chat.subscribe();

    let submit = chat.submit_prompt(vec![MessageInput::user(prompt)]);
    tokio::pin!(submit);

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            Ok(()) = rx.changed() => {
                let snapshot = rx.borrow_and_update().clone();
                print_new_content(&snapshot, reply_index, &mut printed)?;
            }
            _ = tokio::signal::ctrl_c() => {
                chat.abort_response();
            }
        }
    };

    print_new_content(&chat.snapshot(), reply_index, &mut printed)?;
    if printed > 0 {
        println!();
    }
    Ok(outcome)
}

fn print_new_content(snapshot: &ChatSnapshot, index: usize, printed: &mut usize) -> Result<()> {
    let Some(reply) = snapshot.messages.get(index) else {
        return Ok(());
    };
    // Content only ever grows, so the printed part is always a prefix
    if let Some(fresh) = reply.content.get(*printed..)
        && !fresh.is_empty()
    {
        print!("{fresh}");
        std::io::stdout().flush()?;
        *printed = reply.content.len();
    }
    Ok(())
}

fn report(chat: &ChatCompletion, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Completed => {
            if let Some(last) = chat.messages().last() {
                println!("{}", last.meta.response_time.dimmed());
            }
        }
        SubmitOutcome::Aborted => {
            println!("{}", "Reply aborted.".yellow());
            drop_pending(chat);
        }
        SubmitOutcome::Rejected => {
            println!("{}", "A reply is still in progress.".yellow());
        }
        SubmitOutcome::Failed(e) => {
            eprintln!("{} {}", "Request failed:".red().bold(), e);
            drop_pending(chat);
        }
    }
}

/// A reply left loading blocks further prompts, so keep only settled messages.
fn drop_pending(chat: &ChatCompletion) {
    let messages = chat.messages();
    if messages.pending().is_none() {
        return;
    }
    chat.set_messages(settled_inputs(&messages));
}

fn settled_inputs(messages: &Conversation) -> Vec<MessageInput> {
    messages
        .iter()
        .filter(|m| !m.is_loading())
        .map(|m| MessageInput {
            role: m.role.clone(),
            content: m.content.clone(),
            timestamp: Some(m.timestamp),
            meta: Some(m.meta.clone()),
        })
        .collect()
}

fn print_history(messages: &Conversation) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(messages)?);
    Ok(())
}
