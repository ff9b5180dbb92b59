//! Randchat CLI
//!
//! Terminal client for the anonymous one-to-one chat service, plus a
//! read-only viewer for the server's session statistics.

use clap::{Args, Parser, Subcommand};
use randchat_core::config::defaults;
use randchat_core::{ClientConfig, ReportingConfig, StdoutEventSink};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod admin;
mod chat;

/// Randchat - talk to a random stranger from your terminal
#[derive(Parser, Debug)]
#[command(name = "randchat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// HTTP(S) base URL of the chat server
    #[arg(
        long,
        global = true,
        env = "RANDCHAT_BACKEND_URL",
        default_value = defaults::DEFAULT_BACKEND_URL
    )]
    backend_url: String,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join the chat (type /help once running)
    Chat(ChatArgs),
    /// Watch live statistics and recorded sessions
    Admin(AdminArgs),
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Start matching right away under this name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Delay before looking for a new partner after one leaves (ms)
    #[arg(long, default_value_t = defaults::DEFAULT_REMATCH_DELAY_MS)]
    pub rematch_delay_ms: u64,

    /// Quiet period that ends the typing indicator (ms)
    #[arg(long, default_value_t = defaults::DEFAULT_TYPING_IDLE_MS)]
    pub typing_idle_ms: u64,
}

#[derive(Args, Debug)]
pub struct AdminArgs {
    /// Refresh interval (ms)
    #[arg(
        short,
        long,
        default_value_t = defaults::DEFAULT_POLL_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_ms: u64,

    /// Number of recent sessions to list
    #[arg(short, long, default_value_t = defaults::DEFAULT_SESSION_LIMIT)]
    pub limit: usize,

    /// Show the full transcript of one session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Render once and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout is the chat itself
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_output = matches!(cli.format, OutputFormat::Json);

    let result = match cli.command {
        Command::Chat(args) => {
            let config = ClientConfig::new()
                .with_backend_url(cli.backend_url)
                .with_rematch_delay_ms(args.rematch_delay_ms)
                .with_typing_idle_ms(args.typing_idle_ms);
            let sink = StdoutEventSink::new(json_output);
            chat::run_chat(config, args.username, sink).await
        }
        Command::Admin(args) => {
            let config = ClientConfig::new().with_backend_url(cli.backend_url);
            let reporting = ReportingConfig {
                poll_interval_ms: args.interval_ms,
                session_limit: args.limit,
            };
            admin::run_admin(&config, &reporting, &args, json_output).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from([
            "randchat",
            "--backend-url",
            "https://chat.example.com",
            "chat",
            "-u",
            "alice",
        ])
        .unwrap();
        assert_eq!(cli.backend_url, "https://chat.example.com");
        match cli.command {
            Command::Chat(args) => {
                assert_eq!(args.username.as_deref(), Some("alice"));
                assert_eq!(args.rematch_delay_ms, 500);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_admin() {
        let cli = Cli::try_parse_from(["randchat", "admin", "--once", "--format", "json"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Command::Admin(args) => {
                assert!(args.once);
                assert_eq!(args.limit, 100);
                assert_eq!(args.interval_ms, 5000);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["randchat", "admin", "--interval-ms", "0"]).is_err());
        let cli = Cli::try_parse_from(["randchat", "admin", "-i", "250"]).unwrap();
        match cli.command {
            Command::Admin(args) => assert_eq!(args.interval_ms, 250),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
