use clap::{Parser, Subcommand};

/// Streaming chat client and server for OpenAI-compatible backends
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the chat API over HTTP
    Serve,
    /// Ask one question and stream the answer to the terminal
    Ask {
        /// Question to send
        prompt: String,

        /// Hide reasoning output
        #[arg(long)]
        no_reasoning: bool,

        /// Print the finished message as collapsible panels
        #[arg(long)]
        panels: bool,

        /// Print every event as it arrives
        #[arg(long)]
        debug_events: bool,

        /// Override the configured system prompt
        #[arg(long)]
        system: Option<String>,
    },
    /// Interactive multi-turn chat on stdin
    Chat,
}

impl Command {
    /// Default log level when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Command::Serve => "info",
            Command::Ask { .. } | Command::Chat => "warn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let args = Args::parse_from([
            "jazz-rs",
            "-c",
            "custom.json",
            "ask",
            "what time is it?",
            "--no-reasoning",
            "--system",
            "be brief",
        ]);
        assert_eq!(args.config.as_deref(), Some("custom.json"));
        match args.command {
            Command::Ask {
                prompt,
                no_reasoning,
                panels,
                debug_events,
                system,
            } => {
                assert_eq!(prompt, "what time is it?");
                assert!(no_reasoning);
                assert!(!panels);
                assert!(!debug_events);
                assert_eq!(system.as_deref(), Some("be brief"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_default_log_level() {
        let args = Args::parse_from(["jazz-rs", "serve"]);
        assert_eq!(args.command.default_log_level(), "info");
        let args = Args::parse_from(["jazz-rs", "chat"]);
        assert_eq!(args.command.default_log_level(), "warn");
    }
}
