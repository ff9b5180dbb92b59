//! Interactive chat over stdin/stdout
//!
//! Each input line becomes one or more intents for the client driver.
//! Lines starting with `/` are commands; anything else is a message.

use randchat_core::{
    ChatClient, ClientConfig, Intent, StdoutEventSink, SystemClock, UserId, WebSocketTransport,
};
use std::io::BufRead;
use tokio::sync::mpsc;

const HELP: &str = "\
Commands:
  /start <name>   look for a partner under <name>
  /skip           leave this partner and find another
  /leave          disconnect and go back to idle
  /quit           disconnect and exit
  /help           show this help
Anything else is sent to your partner.";

/// What a line of input asks for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Intents(Vec<Intent>),
    Help,
    Quit,
}

fn parse_line(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix('/') {
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        return match name {
            "start" => Command::Intents(vec![Intent::Start {
                username: arg.to_string(),
            }]),
            "skip" => Command::Intents(vec![Intent::Skip]),
            "leave" => Command::Intents(vec![Intent::Disconnect]),
            "quit" | "exit" => Command::Quit,
            _ => Command::Help,
        };
    }

    if trimmed.is_empty() {
        return Command::Intents(Vec::new());
    }

    // A whole line arrives at once, so it counts as one keystroke burst
    Command::Intents(vec![
        Intent::Keystroke,
        Intent::Send {
            text: line.to_string(),
        },
    ])
}

/// Forward lines from a blocking reader until EOF or the receiver is gone
fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<std::io::Result<String>>) {
    for line in reader.lines() {
        let failed = line.is_err();
        if tx.blocking_send(line).is_err() || failed {
            return;
        }
    }
}

/// Stdin is read on its own thread so an exit never waits on a pending read
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), tx));
    rx
}

/// Run the chat until `/quit`, end of input or Ctrl-C
pub async fn run_chat(
    config: ClientConfig,
    username: Option<String>,
    sink: StdoutEventSink,
) -> Result<(), String> {
    // Validate the backend up front rather than on the first /start
    config.api_url().map_err(|e| e.to_string())?;

    let user_id = UserId::generate();
    tracing::info!("Chatting as user {} via {}", user_id, config.backend_url);

    let transport = WebSocketTransport::new(config.clone());
    let client = ChatClient::new(user_id, &config, transport, SystemClock::new(), sink);

    let (intents, rx) = mpsc::channel(config.channel_capacity);
    let driver = tokio::spawn(client.run(rx));

    if let Some(username) = username {
        intents
            .send(Intent::Start { username })
            .await
            .map_err(|_| "Chat client stopped unexpectedly".to_string())?;
    } else {
        println!("{HELP}");
    }

    let mut lines = spawn_stdin_reader();

    loop {
        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(Ok(line)) => line,
                None => break,
                Some(Err(e)) => {
                    tracing::warn!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        match parse_line(&line) {
            Command::Intents(batch) => {
                for intent in batch {
                    if intents.send(intent).await.is_err() {
                        return Err("Chat client stopped unexpectedly".to_string());
                    }
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    // Closing the channel makes the driver disconnect and return
    drop(intents);
    driver
        .await
        .map_err(|e| format!("Chat client task failed: {e}"))
}
