//! raksha - terminal client for the first-aid and Raksha chat assistants

mod commands;
mod config;
mod decode;
mod printer;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use raksha_chat::{ChatConfig, ChatEvent, ChatSession, EdgeTransport, TurnOutcome};
use raksha_stream::{Assistant, DecoderOptions, DesyncPolicy, EdgeFunctionClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::printer::ReplyPrinter;

/// raksha - chat with the first-aid and Raksha assistants
#[derive(Parser, Debug)]
#[command(name = "raksha")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Assistant to talk to (first-aid, raksha)
    #[arg(short, long)]
    assistant: Option<Assistant>,

    /// Edge functions base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the edge functions
    #[arg(long)]
    token: Option<String>,

    /// Send a single message and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Decode a captured response body offline and print the reply text
    #[arg(long)]
    decode_file: Option<PathBuf>,

    /// Read size used with --decode-file (default: whole file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Hold back unparseable stream lines until the next read
    #[arg(long)]
    requeue_on_desync: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("raksha=debug,raksha_stream=debug,raksha_chat=debug")
            .with_writer(io::stderr)
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    let desync = if args.requeue_on_desync || cfg.requeue_on_desync.unwrap_or(false) {
        DesyncPolicy::Requeue
    } else {
        DesyncPolicy::Skip
    };
    let decoder_options = DecoderOptions { desync };

    if let Some(ref path) = args.decode_file {
        return run_decode(path, args.chunk_size, decoder_options);
    }

    // CLI takes precedence over config and environment
    let assistant = args.assistant.or(cfg.assistant).unwrap_or_default();
    let Some(base_url) = args.base_url.or(cfg.functions_url.clone()) else {
        eprintln!("Error: No edge functions URL configured");
        eprintln!();
        eprintln!("Set it with --base-url, export RAKSHA_FUNCTIONS_URL=..., or raksha --init-config");
        std::process::exit(1);
    };
    let Some(token) = args.token.or(cfg.token.clone()) else {
        eprintln!("Error: No API token configured");
        eprintln!();
        eprintln!("Set it with --token, export RAKSHA_API_TOKEN=..., or raksha --init-config");
        std::process::exit(1);
    };

    let mut client = EdgeFunctionClient::new(base_url, token).with_decoder_options(decoder_options);
    if let Some(secs) = cfg.connect_timeout_secs {
        client = client
            .with_connect_timeout(Duration::from_secs(secs))
            .context("Failed to build HTTP client")?;
    }

    let transport = Arc::new(EdgeTransport::new(client, assistant));
    let mut session = ChatSession::new(
        ChatConfig {
            greeting: cfg.greeting.clone(),
        },
        transport,
    );

    if let Some(command) = args.command {
        return run_command(&mut session, &command).await;
    }

    run_interactive(&mut session, assistant).await
}

fn run_decode(
    path: &std::path::Path,
    chunk_size: Option<usize>,
    options: DecoderOptions,
) -> anyhow::Result<()> {
    let report = decode::decode_file(path, chunk_size, options)?;
    println!("{}", report.text());
    eprintln!(
        "[{} fragments, {} unparseable lines, decoder {:?}]",
        report.fragments.len(),
        report.desyncs,
        report.state
    );
    Ok(())
}

fn show_event(printer: &mut ReplyPrinter, event: Result<ChatEvent, RecvError>) {
    match event {
        Ok(ChatEvent::Notification { message }) => eprintln!("\nError: {}", message),
        Ok(event) => {
            if let Some(text) = printer.take_new_text(&event) {
                print!("{}", text);
                io::stdout().flush().ok();
            }
        }
        Err(RecvError::Lagged(n)) => {
            tracing::debug!("Printer skipped {} events, catching up from the next snapshot", n);
        }
        Err(RecvError::Closed) => {}
    }
}

/// Run one turn, printing the reply as it streams, with Ctrl-C wired to abort
async fn run_turn(session: &mut ChatSession, input: &str) -> anyhow::Result<TurnOutcome> {
    let mut receiver = session.subscribe();
    let handle = session.handle();
    let mut printer = ReplyPrinter::default();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let result = {
        let send = session.send(input);
        tokio::pin!(send);
        loop {
            tokio::select! {
                result = &mut send => break result,
                event = receiver.recv() => show_event(&mut printer, event),
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    handle.abort();
                }
            }
        }
    };

    // Events published after the last poll
    loop {
        match receiver.try_recv() {
            Ok(event) => show_event(&mut printer, Ok(event)),
            Err(TryRecvError::Lagged(n)) => show_event(&mut printer, Err(RecvError::Lagged(n))),
            Err(_) => break,
        }
    }

    let outcome = result?;
    if let Some(text) = printer.remaining(session.messages(), &outcome) {
        print!("{}", text);
    }
    if let TurnOutcome::Cancelled { .. } = outcome {
        eprint!("\n[stopped]");
    }
    println!();
    Ok(outcome)
}

async fn run_command(session: &mut ChatSession, command: &str) -> anyhow::Result<()> {
    println!("raksha> {}", command);
    println!();

    match run_turn(session, command).await? {
        TurnOutcome::Failed { reason, .. } => anyhow::bail!(reason),
        TurnOutcome::Cancelled { .. } => std::process::exit(130),
        TurnOutcome::Completed => Ok(()),
    }
}

async fn run_interactive(session: &mut ChatSession, assistant: Assistant) -> anyhow::Result<()> {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("raksha ({}) - /help for commands", assistant.name());
        eprintln!();
    }

    if let Some(greeting) = session.config().greeting.clone() {
        println!("{}\n", greeting);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        // EOF
        let Some(input) = line else {
            break;
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input, session) {
            match result {
                commands::CommandResult::Clear => {
                    session.clear();
                    println!("Cleared conversation.");
                }
                commands::CommandResult::Exit => break,
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}. Type /help for available commands.", cmd);
                }
            }
            continue;
        }

        if let Err(e) = run_turn(session, input).await {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    Ok(())
}
