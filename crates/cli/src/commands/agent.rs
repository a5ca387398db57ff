//! `pincer agent` — chat with the agent on the local "cli" session.

use std::io::Write;
use std::sync::{Arc, Mutex};

use pincer_agent::SessionManager;
use pincer_config::AppConfig;
use pincer_core::message::Message;

const SESSION: &str = "cli";

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let manager = Arc::new(SessionManager::new(config));

    match message {
        Some(text) => {
            let reply = manager.run_turn(SESSION, &text).await?;
            println!("{reply}");
            Ok(())
        }
        None => interactive(manager).await,
    }
}

async fn interactive(manager: Arc<SessionManager>) -> anyhow::Result<()> {
    println!("Pincer interactive chat. Type 'exit' to quit.");
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let agent = manager.get(SESSION)?;
        let history = manager.history(SESSION);

        // Stream tokens to the terminal while collecting the full text so
        // the history gets the complete answer.
        let collected = Arc::new(Mutex::new(String::new()));
        let buffer = collected.clone();
        let sink = move |token: &str| {
            print!("{token}");
            let _ = std::io::stdout().flush();
            buffer.lock().unwrap_or_else(|e| e.into_inner()).push_str(token);
        };

        let reply = agent.run(line, &history, Some(&sink)).await;
        let answer = if reply.is_empty() {
            collected.lock().unwrap_or_else(|e| e.into_inner()).clone()
        } else {
            // Sentinels and non-streamed replies were not printed yet
            print!("{reply}");
            reply
        };
        println!();

        manager.append(SESSION, Message::user(line));
        manager.append(SESSION, Message::assistant(&answer));
    }

    Ok(())
}
