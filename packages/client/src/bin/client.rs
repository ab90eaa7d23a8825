//! Terminal client for the Ichiba realtime channel.
//!
//! Restores (or creates) a session from the credential file, connects, joins a
//! conversation and prints every inbound event. Type a line to send it to the
//! recipient; `/help` lists the other commands.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin ichiba-client -- --token <credential> --recipient 8 --conversation c-1
//! cargo run --bin ichiba-client -- --recipient 8
//! ```

use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use ichiba_client::{
    EventCategory, Identity, RealtimeConfig, RealtimeContext,
    config::DEFAULT_URL,
    domain::Credential,
    infrastructure::{storage::FileCredentialStorage, transport::WebSocketTransport},
    ui::{
        command::{HELP, InputCommand},
        formatter::EventFormatter,
        navigator::TerminalNavigator,
        prompt::{prompt_for, redisplay_prompt},
    },
    usecase::Subscription,
};
use ichiba_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "ichiba-client")]
#[command(about = "Terminal client for the Ichiba realtime channel", long_about = None)]
struct Args {
    /// WebSocket endpoint
    #[arg(short = 'u', long, default_value = DEFAULT_URL)]
    url: String,

    /// Where the session is persisted between runs
    #[arg(long, default_value = ".ichiba/session.json")]
    credential_file: PathBuf,

    /// Sign in with this credential instead of the persisted one
    #[arg(short = 't', long)]
    token: Option<String>,

    /// User ID for --token (defaults to the credential's subject)
    #[arg(long)]
    user_id: Option<String>,

    /// Role for --token
    #[arg(long, default_value = "client")]
    role: String,

    /// Conversation to join after connecting
    #[arg(short = 'c', long)]
    conversation: Option<String>,

    /// User who receives typed messages
    #[arg(short = 'r', long)]
    recipient: Option<String>,

    /// Order the conversation belongs to
    #[arg(short = 'o', long)]
    order: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &["ichiba_client"], "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = RealtimeConfig::default().with_url(args.url.clone());
    let transport = Arc::new(WebSocketTransport::new(config.url.clone()));
    let context = RealtimeContext::new(
        config,
        transport,
        Arc::new(FileCredentialStorage::new(args.credential_file.clone())),
        Arc::new(TerminalNavigator::new("/messages")),
    );
    context.start().await;

    if let Some(token) = &args.token {
        let user_id = args
            .user_id
            .clone()
            .or_else(|| {
                Credential::parse(token.as_str())
                    .ok()
                    .and_then(|c| c.claims().subject.clone())
            })
            .ok_or("--user-id is required when the credential has no subject")?;
        context
            .login(token, Identity::new(user_id, args.role.clone()))
            .await?;
    }

    let Some(identity) = context.credentials().identity().await else {
        return Err("no usable session; sign in with --token".into());
    };

    let _subscriptions: Vec<Subscription> = EventCategory::ALL
        .iter()
        .map(|&category| {
            let me = identity.id.clone();
            context.on(category, move |event| {
                print!("{}", EventFormatter::format_event(event, &me));
                redisplay_prompt(&me);
                Ok(())
            })
        })
        .collect();

    context.connect().await?;
    if let Some(conversation) = &args.conversation {
        context
            .join(conversation.clone(), args.recipient.clone(), args.order.clone())
            .await?;
    }

    println!(
        "\nYou are '{}'. Type messages and press Enter to send, /help for commands. Press Ctrl+C to exit.\n",
        identity.id
    );

    let mut input_rx = spawn_readline(prompt_for(&identity.id));
    while let Some(line) = input_rx.recv().await {
        if !handle_line(&context, &args, &line).await {
            break;
        }
    }

    context.shutdown().await;
    Ok(())
}

/// Run rustyline on its own thread (it blocks) and forward lines.
fn spawn_readline(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Execute one input line. Returns `false` when the session should end.
async fn handle_line(context: &RealtimeContext, args: &Args, line: &str) -> bool {
    let recipient = args.recipient.clone();
    let result = match InputCommand::parse(line) {
        InputCommand::Send(text) => match recipient {
            Some(recipient) => {
                context
                    .send_message(recipient, text, Some("text".to_string()), args.order.clone())
                    .await
            }
            None => {
                println!("No recipient: restart with --recipient <user id>");
                Ok(())
            }
        },
        InputCommand::Typing => match recipient {
            Some(recipient) => context.start_typing(recipient, args.conversation.clone()).await,
            None => Ok(()),
        },
        InputCommand::StopTyping => match recipient {
            Some(recipient) => context.stop_typing(recipient, args.conversation.clone()).await,
            None => Ok(()),
        },
        InputCommand::Join(conversation) => {
            context
                .join(conversation, recipient, args.order.clone())
                .await
        }
        InputCommand::Leave(conversation) => context.leave(conversation, args.order.clone()).await,
        InputCommand::Reconnect => context.force_reconnect().await,
        InputCommand::Logout => {
            context.logout().await;
            println!("Signed out.");
            return false;
        }
        InputCommand::Help => {
            println!("{}", HELP);
            Ok(())
        }
        InputCommand::Invalid(input) => {
            println!("Unknown command: {} (try /help)", input);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::warn!("{}", e);
    }
    true
}
