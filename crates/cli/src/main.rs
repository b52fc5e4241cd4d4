use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ivr_api::GatewayConfig;
use ivr_core::{load_rule_set, IntentRuleSet, Resolver};
use ivr_dispatch::{IvrDispatcher, IvrRequest};
use ivr_observability::{init_tracing, AppMetrics};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "ivr")]
#[command(about = "IVR gateway CLI")]
struct Cli {
    /// JSON intent rule set; the built-in banking table when omitted.
    #[arg(long, env = "IVR_RULES_PATH")]
    rules: Option<PathBuf>,

    #[arg(long, default_value = "cli")]
    session: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve {
        #[arg(long, env = "IVR_BIND", default_value = "0.0.0.0:3000")]
        bind: String,
    },
    /// Press a keypad digit.
    Press { digit: String },
    /// Speak an utterance.
    Say {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// Print the raw route decision for an utterance.
    Classify {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// List intents with their digits and services.
    Intents,
    /// Interactive keypad and voice session.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ivr_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let config = GatewayConfig {
                bind,
                rules_path: cli.rules,
                ..GatewayConfig::from_env()
            };
            ivr_api::serve(config).await?;
        }
        Command::Press { digit } => {
            let dispatcher = build_dispatcher(cli.rules.as_ref())?;
            let reply = dispatcher.handle(IvrRequest::digit(cli.session, digit))?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Say { words } => {
            let dispatcher = build_dispatcher(cli.rules.as_ref())?;
            let reply = dispatcher.handle(IvrRequest::query(cli.session, words.join(" ")))?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Classify { words } => {
            let dispatcher = build_dispatcher(cli.rules.as_ref())?;
            let decision = dispatcher.resolver().classify(&words.join(" "));
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Intents => {
            let dispatcher = build_dispatcher(cli.rules.as_ref())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&dispatcher.intent_mapping())?
            );
        }
        Command::Chat => run_chat(&build_dispatcher(cli.rules.as_ref())?)?,
    }

    Ok(())
}

fn run_chat(dispatcher: &IvrDispatcher) -> Result<()> {
    let session_id = Uuid::new_v4().to_string();

    println!("IVR chat mode (session {session_id}). press a digit or say something. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let request = if is_keypad_press(message) {
            IvrRequest::digit(session_id.clone(), message)
        } else {
            IvrRequest::query(session_id.clone(), message)
        };

        match dispatcher.handle(request) {
            Ok(reply) => {
                println!("\n{}\n", reply.response);
                if let Some(decision) = reply.decision().filter(|d| !d.intent.is_empty()) {
                    println!(
                        "[{} -> {} via {} @ {:.2}]\n",
                        decision.intent, decision.digit, decision.service, decision.confidence
                    );
                }
            }
            Err(err) => println!("\n{err}\n"),
        }
    }

    Ok(())
}

fn is_keypad_press(message: &str) -> bool {
    let mut chars = message.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if c.is_ascii_digit() || c == '*' || c == '#'
    )
}

fn build_dispatcher(rules_path: Option<&PathBuf>) -> Result<IvrDispatcher> {
    let rules = match rules_path {
        Some(path) => load_rule_set(path)
            .with_context(|| format!("failed loading rules from {}", path.display()))?,
        None => IntentRuleSet::standard(),
    };

    Ok(IvrDispatcher::new(
        Resolver::new(Arc::new(rules)),
        AppMetrics::shared(),
    ))
}
