//! FDI Assistant terminal front end.
//!
//! ```text
//! main() -> load config -> build store -> migrate -> list -> ChatSession
//!                                                              |
//!                                   stdin line -> Command -> session / store
//! ```
//!
//! Logs go to `~/.fdi/logs/fdi-chat.log`; stdout is reserved for the chat.

mod commands;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fdi_config::FdiConfig;
use fdi_engine::{
    CONVERSATION_STARTERS, ChatSession, QUICK_ACTIONS, RenderedMessage, persistence_channel,
    spawn_persistence_worker,
};
use fdi_providers::{ApiConfig, CompletionClient, OpenRouterClient};
use fdi_store::{
    ConversationStore, FileKeyValueStore, LocalSettings, MigrationOutcome, RemoteBackend,
    RemoteConfig,
};
use fdi_types::navigation::route_for_path;
use fdi_types::{Role, truncate_with_ellipsis};

use commands::{Command, HELP};

const HISTORY_TITLE_CHARS: usize = 48;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the chat.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = fdi_config::config_dir() {
        candidates.push(dir.join("logs").join("fdi-chat.log"));
    }
    candidates.push(PathBuf::from(".fdi").join("logs").join("fdi-chat.log"));
    candidates
}

fn api_config(config: &FdiConfig) -> ApiConfig {
    let mut api = ApiConfig::new(config.api_key());
    let Some(openrouter) = config.openrouter() else {
        return api;
    };
    if let Some(model) = &openrouter.model {
        api = api.with_model(model.clone());
    }
    if let Some(endpoint) = &openrouter.endpoint {
        api = api.with_endpoint(endpoint.clone());
    }
    if let Some(temperature) = openrouter.temperature {
        api = api.with_temperature(temperature);
    }
    if let Some(max_tokens) = openrouter.max_tokens {
        api = api.with_max_tokens(max_tokens);
    }
    if let Some(site_url) = &openrouter.site_url {
        api = api.with_site_url(site_url.clone());
    }
    if let Some(secs) = openrouter.idle_timeout_secs.filter(|secs| *secs > 0) {
        api = api.with_idle_timeout(Duration::from_secs(secs));
    }
    api
}

fn build_store(config: &FdiConfig) -> ConversationStore {
    let data_dir = config.data_dir();
    tracing::debug!(path = %data_dir.display(), "Using data directory");
    let settings = Arc::new(LocalSettings::new(Arc::new(FileKeyValueStore::new(data_dir))));
    let remote = RemoteBackend::from_config(&RemoteConfig {
        base_url: config.backend_base_url(),
        allow_loopback: config.allow_loopback_backend(),
    });
    if remote.is_none() {
        tracing::info!("No remote backend configured; conversations stay on this device");
    }
    ConversationStore::new(settings, remote)
}

fn print_welcome() {
    println!("FDI Assistant - ask about Oracle FDI services, accelerators, careers and more.");
    println!("Try:");
    for starter in CONVERSATION_STARTERS {
        println!("  \"{starter}\"");
    }
    let shortcuts: Vec<String> = QUICK_ACTIONS
        .iter()
        .map(|action| format!("{} ({})", action.label, action.path))
        .collect();
    println!("Or jump to: {}", shortcuts.join(", "));
    println!("Type /help for commands.\n");
}

fn print_actions(message: &RenderedMessage) {
    for (i, action) in message.actions.iter().enumerate() {
        println!("  [{}] {} -> {}", i + 1, action.label, action.path);
    }
}

fn print_transcript<C: CompletionClient>(session: &ChatSession<C>) {
    for message in session.rendered_messages() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{speaker}> {}", message.content);
        print_actions(&message);
    }
}

fn print_history<C: CompletionClient>(session: &ChatSession<C>) {
    if session.conversations().is_empty() {
        println!("No saved conversations.");
        return;
    }
    for (i, conversation) in session.conversations().iter().enumerate() {
        let marker = if session.current_conversation_id() == Some(&conversation.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker}{:>3}. {}  ({} messages, {})",
            i + 1,
            truncate_with_ellipsis(&conversation.title, HISTORY_TITLE_CHARS),
            conversation.messages.len(),
            conversation.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
}

async fn stream_reply<C: CompletionClient>(session: &mut ChatSession<C>) {
    let mut stdout = std::io::stdout();
    print!("assistant> ");
    let _ = stdout.flush();

    tokio::select! {
        () = session.wait_for_reply_with(|fragment| {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        }) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    if session.cancel_stream() {
        println!("\n(cancelled)");
        return;
    }
    println!();
    if let Some(last) = session.rendered_messages().last() {
        print_actions(last);
    }
}

/// Returns `false` when the user asked to quit.
async fn handle<C: CompletionClient>(
    command: Command,
    session: &mut ChatSession<C>,
    store: &ConversationStore,
) -> bool {
    match command {
        Command::Send(text) => {
            if session.submit(&text) {
                stream_reply(session).await;
            }
        }
        Command::New => {
            session.start_new_conversation();
            println!("Started a new chat.");
        }
        Command::History => {
            if session.toggle_history_view() {
                print_history(session);
            } else {
                println!("History hidden.");
            }
        }
        Command::Load(n) => {
            let id = session.conversations().get(n - 1).map(|c| c.id.clone());
            match id {
                Some(id) if session.load_conversation(&id) => print_transcript(session),
                _ => println!("No conversation {n}."),
            }
        }
        Command::Delete(n) => {
            let id = session.conversations().get(n - 1).map(|c| c.id.clone());
            match id {
                Some(id) if session.delete_conversation(&id) => println!("Deleted."),
                _ => println!("No conversation {n}."),
            }
        }
        Command::Clear => {
            if session.clear_history() {
                println!("History cleared.");
            }
        }
        Command::Go(n) => {
            let rendered = session.rendered_messages();
            let action = rendered
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .and_then(|m| m.actions.get(n - 1));
            match action {
                Some(action) => {
                    let page = route_for_path(&action.path)
                        .map_or("page not in the site map", |route| route.description);
                    println!("Navigating to {} ({page})", action.path);
                    session.close();
                }
                None => println!("No navigation action {n} in the last reply."),
            }
        }
        Command::Theme(None) => println!("Theme: {}", store.settings().theme()),
        Command::Theme(Some(theme)) => match store.settings().set_theme(theme) {
            Ok(()) => println!("Theme set to {theme}."),
            Err(e) => println!("Could not save theme: {e}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Invalid(message) => println!("{message}"),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match FdiConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Ignoring config at {}: {e}", e.path().display());
            FdiConfig::default()
        }
    };

    let store = Arc::new(build_store(&config));
    match store.migrate_local_to_remote().await {
        MigrationOutcome::Migrated(count) => {
            tracing::info!(count, "Uploaded local conversations to the backend");
        }
        MigrationOutcome::Failed => tracing::warn!("Migration failed; will retry next start"),
        _ => {}
    }
    let history = store.list().await;

    let (outbox, intents) = persistence_channel();
    let worker = spawn_persistence_worker(store.clone(), intents);

    let client = OpenRouterClient::new(api_config(&config));
    let mut session = ChatSession::new(client, outbox);
    session.set_history(history);

    print_welcome();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().context("flush stdout")?;
        // ctrl_c() replaces the default SIGINT exit, so the prompt handles it too.
        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = commands::parse(&line) else {
            continue;
        };
        if !handle(command, &mut session, &store).await {
            break;
        }
    }

    // Closing the outbox lets the worker finish pending saves.
    drop(session);
    if let Err(e) = worker.await {
        tracing::warn!("Persistence worker ended abnormally: {e}");
    }
    Ok(())
}
