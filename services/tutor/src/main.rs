mod config;
mod console;
mod player;
mod prompt_loader;

use crate::config::Config;
use crate::console::{ConsoleCommand, ConsoleRecognizer, HELP, parse_command};
use crate::player::CommandPlayer;
use anyhow::{Context, Result};
use clap::Parser;
use lingo_client::{HttpReplyClient, HttpSynthesisClient};
use lingo_core::message::{MessageId, Role};
use lingo_core::runtime::{Collaborators, SessionHandle, SessionRuntime};
use lingo_core::session_state::{SessionController, SessionSnapshot};
use lingo_core::tutor::{DEFAULT_NATIVE_LANGUAGE, builtin_tutors, find_tutor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice a language by talking with an AI tutor")]
struct Cli {
    /// Id of the tutor to talk to (see --list)
    #[arg(long, default_value = "maria")]
    tutor: String,

    /// The language you already speak
    #[arg(long, default_value = DEFAULT_NATIVE_LANGUAGE)]
    native: String,

    /// Directory of `<tutor-id>.md` files overriding the built-in system prompts
    #[arg(long)]
    prompts_dir: Option<PathBuf>,

    /// List the available tutors and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they do not interleave with the conversation.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list {
        for tutor in builtin_tutors() {
            println!(
                "{:<8} {} ({}): {}",
                tutor.id, tutor.name, tutor.language, tutor.specialty
            );
        }
        return Ok(());
    }

    // --- 4. Pick the tutor ---
    let mut tutor = find_tutor(&args.tutor)
        .with_context(|| format!("Unknown tutor '{}'; run with --list", args.tutor))?
        .with_native_language(args.native.as_str());
    if let Some(dir) = &args.prompts_dir {
        let prompts = prompt_loader::load_prompts(dir).context("Failed to load tutor prompts")?;
        tracing::info!("Loaded {} prompts from {}", prompts.len(), dir.display());
        tutor = prompt_loader::apply_prompt(tutor, &prompts);
    }

    // --- 5. Initialize API Clients ---
    let client_config = config.client_config(&tutor.id);
    if client_config.base_url().is_none() {
        tracing::warn!(
            "{} is not set; replies and speech will fail as unconfigured",
            lingo_client::consts::API_BASE_URL
        );
    }
    let replies = Arc::new(HttpReplyClient::new(client_config.clone())?);
    let synthesizer = Arc::new(HttpSynthesisClient::new(client_config)?);
    let player = Arc::new(
        CommandPlayer::new(&config.player_command).context("Failed to set up audio playback")?,
    );
    let recognizer = ConsoleRecognizer::new();

    // --- 6. Start the session ---
    println!(
        "{} teaches {} ({}). {}",
        tutor.name, tutor.language, tutor.personality, HELP
    );
    let tutor_name = tutor.name.clone();
    let (runtime, handle) = SessionRuntime::new(
        SessionController::new(tutor),
        Collaborators {
            recognizer: Arc::new(recognizer.clone()),
            replies: replies.clone(),
            synthesizer,
            player,
        },
    );
    let session = tokio::spawn(runtime.run());
    let renderer = tokio::spawn(render(handle.clone()));

    // --- 7. Read the terminal ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        // A line typed while listening is what the learner "said".
        let Err(line) = recognizer.offer(line) else {
            continue;
        };

        match parse_command(&line) {
            ConsoleCommand::ActivateMic if !handle.snapshot().mic_enabled() => {
                println!("(the mic is off while {tutor_name} is busy)");
            }
            ConsoleCommand::ActivateMic => handle.activate_mic().await?,
            ConsoleCommand::Speech(enabled) => handle.set_speech_enabled(enabled).await?,
            ConsoleCommand::AutoSpeak(enabled) => handle.set_auto_speak(enabled).await?,
            ConsoleCommand::Volume(volume) => handle.set_volume(volume).await?,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Invalid(message) => println!("{message}. {HELP}"),
        }
    }

    // --- 8. Teardown ---
    // An error here only means the session already ended.
    let _ = handle.shutdown().await;
    drop(handle);
    session.await.context("Session task failed")?;
    renderer.abort();

    let stats = replies.stats();
    tracing::info!(
        "{} replies, {} tokens ({} prompt, {} completion)",
        stats.requests(),
        stats.total_tokens(),
        stats.prompt_tokens(),
        stats.completion_tokens()
    );

    Ok(())
}

/// Prints new messages, status changes and surfaced errors.
async fn render(handle: SessionHandle) {
    let mut snapshots = handle.subscribe();
    let mut notices = handle.notices();
    let mut last_shown: Option<MessageId> = None;
    let mut last_status = "";

    let initial = handle.snapshot();
    drop(handle);
    show(&initial, &mut last_shown, &mut last_status);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                show(&snapshot, &mut last_shown, &mut last_status);
            }
            notice = notices.recv() => match notice {
                Ok(error) if error.is_fatal() => println!("!! {error}"),
                Ok(error) => println!("! {error}"),
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {missed} notices"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn show(snapshot: &SessionSnapshot, last_shown: &mut Option<MessageId>, last_status: &mut &'static str) {
    for message in &snapshot.history {
        if last_shown.is_some_and(|id| message.id <= id) {
            continue;
        }
        match message.role {
            Role::User => println!("You: {}", message.content),
            Role::Assistant => println!("Tutor: {}", message.content),
        }
        *last_shown = Some(message.id);
    }

    let status = snapshot.status_line();
    if status != *last_status {
        println!("[{status}]");
        *last_status = status;
    }
}
