//! LearnSynth - terminal study assistant
//!
//! Line-oriented front end for the session core: plain lines are questions,
//! lines starting with `/` are commands.

use learnsynth::attachment::Attachment;
use learnsynth::copy_state::{CopyKey, CopyTracker, SystemClipboard};
use learnsynth::gateway::{GatewayConfig, HttpGateway, LoggingGateway};
use learnsynth::render::render_message;
use learnsynth::runtime::{spawn_session, SessionEvent, SessionHandle};
use learnsynth::state_machine::SessionState;
use learnsynth::terminal::TerminalRenderer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /attach <path>          bind a study file (clears the conversation)
  /detach                 remove the file (clears the conversation)
  /copy <n> [code <k>]    copy message n, or its k-th code block
  /history                show the whole conversation
  /upload                 upload the attached file on its own
  /models                 list the backend's models
  /health                 check the backend
  /quit                   exit
Anything else is sent as a question.";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    Attach(String),
    Detach,
    Copy(CopyKey),
    History,
    Upload,
    Models,
    Health,
    Help,
    Quit,
    Invalid(String),
}

fn parse_command(line: &str) -> Command {
    let Some(rest) = line.trim().strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };
    let mut words = rest.split_whitespace();
    match words.next().unwrap_or_default() {
        "attach" => {
            let path = rest.strip_prefix("attach").unwrap_or_default().trim();
            if path.is_empty() {
                Command::Invalid("usage: /attach <path>".to_string())
            } else {
                Command::Attach(path.to_string())
            }
        }
        "detach" => Command::Detach,
        "copy" => parse_copy(words.collect()),
        "history" => Command::History,
        "upload" => Command::Upload,
        "models" => Command::Models,
        "health" => Command::Health,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{other}, try /help")),
    }
}

fn parse_copy(args: Vec<&str>) -> Command {
    let usage = || Command::Invalid("usage: /copy <n> [code <k>]".to_string());
    match args.as_slice() {
        [n] => n
            .parse()
            .map_or_else(|_| usage(), |n| Command::Copy(CopyKey::Message(n))),
        [n, "code", k] => match (n.parse(), k.parse()) {
            (Ok(message), Ok(block)) => Command::Copy(CopyKey::Code { message, block }),
            _ => usage(),
        },
        _ => usage(),
    }
}

/// Text behind a copy key in the current history
fn copy_text(session: &SessionHandle, key: CopyKey) -> Option<String> {
    let snapshot = session.snapshot();
    match key {
        CopyKey::Message(index) => snapshot.history.get(index).map(|m| m.content.clone()),
        CopyKey::Code { message, block } => {
            let view = render_message(message, snapshot.history.get(message)?);
            view.document()?.code_block(block).map(|c| c.plain_text())
        }
    }
}

/// Print session notifications as they arrive
async fn print_events(mut events: broadcast::Receiver<SessionEvent>, renderer: TerminalRenderer) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::MessageAppended { index, message }) => {
                // The user's own line is already on screen
                if !message.is_user() {
                    let view = render_message(index, &message);
                    println!("{}", renderer.render_message(&view, &message, None));
                }
            }
            Ok(SessionEvent::StateChanged {
                state: SessionState::Sending,
            }) => println!("{}", renderer.thinking()),
            Ok(SessionEvent::StateChanged { .. }) => {}
            Ok(SessionEvent::HistoryCleared) => println!("(conversation cleared)"),
            Ok(SessionEvent::AttachmentChanged { attachment }) => {
                print!("{}", renderer.render_attachment(attachment.as_ref()));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display fell behind session events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnsynth=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(base_url = %config.base_url, timeout = ?config.timeout, "Gateway configured");
    let gateway = HttpGateway::new(config)?;

    let renderer = TerminalRenderer::from_env();
    let session = spawn_session(LoggingGateway::new(gateway.clone()));
    let copy_tracker = CopyTracker::new(SystemClipboard);
    tokio::spawn(print_events(session.subscribe(), renderer));

    match gateway.health().await {
        Ok(health) => tracing::info!(status = %health.status, "Backend reachable"),
        Err(e) => eprintln!("Warning: backend at {} not reachable: {e}", gateway.base_url()),
    }

    print!("{}", renderer.render_transcript(&session.snapshot(), None));
    print!("{}", renderer.render_attachment(None));
    println!("Type /help for commands.");

    // Kept for /upload; the session only exposes display info
    let mut attached: Option<Attachment> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Ask(text) => {
                if session.snapshot().state.is_sending() {
                    println!("Still waiting for the previous answer.");
                    continue;
                }
                session.submit(text).await?;
            }
            Command::Attach(path) => match Attachment::from_path(&path) {
                Ok(attachment) => {
                    attached = Some(attachment.clone());
                    session.select_attachment(attachment).await?;
                }
                Err(e) => println!("{e}"),
            },
            Command::Detach => {
                attached = None;
                session.clear_attachment().await?;
            }
            Command::Copy(key) => match copy_text(&session, key) {
                Some(text) => {
                    copy_tracker.copy(&text, key);
                    println!("[copied]");
                }
                None => println!("Nothing to copy at {key}"),
            },
            Command::History => {
                print!(
                    "{}",
                    renderer.render_transcript(&session.snapshot(), copy_tracker.marker())
                );
            }
            Command::Upload => match &attached {
                Some(attachment) => match gateway.upload(attachment).await {
                    Ok(receipt) => println!("{} ({})", receipt.message, receipt.filename),
                    Err(e) => println!("{e}"),
                },
                None => println!("No file attached."),
            },
            Command::Models => match gateway.models().await {
                Ok(list) => println!("{}", list.models.join("\n")),
                Err(e) => println!("{e}"),
            },
            Command::Health => match gateway.health().await {
                Ok(health) => println!("{}", health.status),
                Err(e) => println!("{e}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Invalid(message) => println!("{message}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_a_question() {
        assert_eq!(
            parse_command("What is ATP?"),
            Command::Ask("What is ATP?".to_string())
        );
    }

    #[test]
    fn test_attach_keeps_spaces_in_path() {
        assert_eq!(
            parse_command("/attach my notes/week 1.pdf"),
            Command::Attach("my notes/week 1.pdf".to_string())
        );
        assert!(matches!(parse_command("/attach"), Command::Invalid(_)));
    }

    #[test]
    fn test_copy_keys() {
        assert_eq!(parse_command("/copy 3"), Command::Copy(CopyKey::Message(3)));
        assert_eq!(
            parse_command("/copy 3 code 1"),
            Command::Copy(CopyKey::Code {
                message: 3,
                block: 1
            })
        );
        assert!(matches!(parse_command("/copy x"), Command::Invalid(_)));
        assert!(matches!(parse_command("/copy 1 code"), Command::Invalid(_)));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(parse_command("/frobnicate"), Command::Invalid(_)));
        assert_eq!(parse_command("/quit"), Command::Quit);
    }
}
