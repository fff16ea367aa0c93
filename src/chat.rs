//! `llml chat`: interactive REPL over one chat session.

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

use crate::client::LlmClient;
use crate::config::Config;
use crate::error::LlmError;

pub async fn run_chat(config: &Config, system: Option<&str>) -> Result<()> {
    let mut client = LlmClient::new(config.llm.clone())?;
    if !client.is_backend_available().await {
        bail!(
            "backend at {} is not reachable; is ollama running?",
            config.llm.base_url
        );
    }

    client.start_chat(system);
    println!(
        "Chatting with {} (type 'exit' or 'quit' to stop)",
        config.llm.model
    );
    if system.is_some() {
        println!("System prompt set.");
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\nyou> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        match client.send_chat_message(text).await {
            Ok(reply) => println!("\n{reply}"),
            // The session keeps the unanswered message, so the user can
            // bring the backend up and just re-send.
            Err(LlmError::BackendUnavailable(detail)) => {
                eprintln!("backend unavailable: {detail}");
                eprintln!("your message stays in the session; retry when the backend is back");
            }
            Err(LlmError::Backend(detail)) => {
                eprintln!("backend error: {detail}");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
