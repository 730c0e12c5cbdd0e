//! `potager ask` — one question, streamed to the terminal.

use potager_agent::runner::AgentRequest;
use potager_agent::stream_event::AgentStreamEvent;
use std::io::Write;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, query: &str, show_thoughts: bool) -> anyhow::Result<()> {
    let (_, runner, _) = super::bootstrap(config_path)?;

    let mut rx = runner.run_stream(AgentRequest::new(query));
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::ThoughtToken { content } => {
                if show_thoughts {
                    // dimmed, so reasoning reads apart from the reply
                    print!("\x1b[2m{content}\x1b[0m");
                    stdout.flush()?;
                }
            }
            AgentStreamEvent::MessageToken { content } => {
                print!("{content}");
                stdout.flush()?;
            }
            AgentStreamEvent::StepStart { tool, .. } => {
                eprintln!("\n[outil] {tool}…");
            }
            AgentStreamEvent::StepEnd { tool, duration, .. } => {
                eprintln!("[outil] {tool} terminé ({duration} ms)");
            }
            AgentStreamEvent::Error { message } => {
                eprintln!("\nErreur : {message}");
            }
            AgentStreamEvent::Done { turns, .. } => {
                tracing::debug!(turns, "conversation terminée");
            }
        }
    }
    println!();
    Ok(())
}
