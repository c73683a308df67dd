//! `akd chat` — interactive REPL command.
//!
//! Boots the daemon, opens one session, and enters a readline-based loop
//! that sends each line as a prompt and streams the turn's content back to
//! stdout as it arrives.

use std::io::Write;
use std::sync::Arc;

use akd_domain::config::Config;
use akd_domain::event::BroadcastEvent;
use akd_domain::session::ExecutorKind;

use crate::bootstrap;

pub async fn chat(config: Arc<Config>, cwd: Option<String>) -> anyhow::Result<()> {
    let daemon = bootstrap::build_daemon(config).await?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    daemon.set_event_sink(Arc::new(move |event| {
        let _ = tx.send(event);
    }));

    let created = daemon.create_session(ExecutorKind::Primary, cwd).await?;
    let session_id = created.session_id;

    let history_path = dirs_home().join(".akd").join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("akd interactive chat");
    eprintln!("Session: {session_id}  |  Ctrl+D to exit");
    eprintln!();

    loop {
        let readline = rl.readline("you> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed == "/exit" || trimmed == "/quit" {
                    break;
                }

                daemon.prompt(session_id.clone(), trimmed.to_string()).await?;
                stream_turn(&mut rx, &session_id).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

/// Print `Text` chunks for `session_id` until its `TurnEnd` arrives (or
/// the session gets transparently replaced, in which case we keep
/// streaming under the new id — the caller's loop doesn't need to know).
async fn stream_turn(rx: &mut tokio::sync::mpsc::UnboundedReceiver<BroadcastEvent>, session_id: &str) {
    let mut current_id = session_id.to_string();
    while let Some(event) = rx.recv().await {
        match event {
            BroadcastEvent::SessionReplaced { old_session_id, new_session_id, .. } if old_session_id == current_id => {
                current_id = new_session_id;
            }
            BroadcastEvent::Text { session_id, text, .. } if session_id == current_id => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            BroadcastEvent::TurnEnd { session_id, .. } if session_id == current_id => {
                println!();
                println!();
                break;
            }
            _ => {}
        }
    }
}

fn dirs_home() -> std::path::PathBuf {
    std::env::var_os("HOME").map(std::path::PathBuf::from).unwrap_or_default()
}
