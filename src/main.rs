//! Command-line front end for the pagecast library.
//!
//! Loads configuration from `conf/config.toml` (or `--config`), opens the
//! library under the configured data directory and runs one subcommand.
//! Commands that start ingestion stay alive until every pending document
//! has finished, failed or been removed.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pagecast::config::{AppConfig, load_config};
use pagecast::geometry::Size;
use pagecast::ingestion::{IngestionCoordinator, IngestionEvent, IngestionSettings};
use pagecast::library::{LibraryError, LibraryViewModel};
use pagecast::playback::{Message, PlaybackSession, Player, PlayerPhase, PlayerSettings};
use pagecast::service::HttpProcessingService;
use pagecast::speech::LoggingSpeechEngine;
use pagecast::store::LibraryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
type Library = LibraryViewModel<HttpProcessingService>;

/// Screen size the `read` command lays pages out for.
const READ_CONTAINER: Size = Size {
    width: 1080.0,
    height: 1920.0,
};

#[derive(Debug, Parser)]
#[command(name = "pagecast", version, about = "Listen to processed documents")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "conf/config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a document and ingest all of its pages.
    Add { path: PathBuf },
    /// Show the library.
    List,
    /// Delete a document, stopping its ingestion first.
    Remove { id: String },
    /// Retry a failed document from the first missing page.
    Retry { id: String },
    /// Reconcile the library and resume any interrupted ingestion.
    Sync,
    /// Generate an output document from the extracted text.
    Export { id: String, dest: PathBuf },
    /// Read a document aloud from the last position.
    Read { id: String },
    /// Transcribe a voice note and attach it to a page (0-based).
    Note {
        id: String,
        page: u32,
        audio: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle).await {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        config = %cli.config.display(),
        data_dir = %config.data_dir().display(),
        service = %config.base_url,
        "Starting pagecast"
    );

    let store = Arc::new(
        LibraryStore::open(config.data_dir())
            .with_context(|| format!("opening library at {}", config.data_dir().display()))?,
    );
    let service = Arc::new(
        HttpProcessingService::from_config(&config).context("building service client")?,
    );
    let coordinator = IngestionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&service),
        IngestionSettings::from_config(&config),
    );
    let mut events = coordinator.subscribe();
    let mut library = LibraryViewModel::new(Arc::clone(&store), service, coordinator, &config);
    library.refresh().await?;

    match cli.command {
        Command::Add { path } => {
            let id = library.add_document(&path).await?;
            println!("added {id}");
            drain_ingestion(&mut library, &mut events).await?;
            print_library(&library);
        }
        Command::List => print_library(&library),
        Command::Remove { id } => {
            if library.remove_document(&id).await? {
                println!("removed {id}");
            } else {
                println!("no document {id}");
            }
        }
        Command::Retry { id } => {
            library.retry(&id).await?;
            drain_ingestion(&mut library, &mut events).await?;
            print_library(&library);
        }
        Command::Sync => {
            library.resume_pending();
            drain_ingestion(&mut library, &mut events).await?;
            print_library(&library);
        }
        Command::Export { id, dest } => {
            let bytes = library.export_text(&id, &dest).await?;
            println!("wrote {bytes} bytes to {}", dest.display());
        }
        Command::Read { id } => read(&library, &store, &config, &id).await?,
        Command::Note { id, page, audio } => {
            let text = library.transcribe_note(&audio).await?;
            if text.is_empty() {
                bail!("transcription of {} was empty", audio.display());
            }
            store.save_annotation(&id, page, &text)?;
            println!("page {}: {text}", page + 1);
        }
    }
    Ok(())
}

/// Feeds coordinator events to the view model until no ingestion is left.
async fn drain_ingestion(library: &mut Library, events: &mut Receiver<IngestionEvent>) -> Result<()> {
    loop {
        while !library.coordinator().in_flight_ids().is_empty() {
            match events.recv().await {
                Ok(event) => {
                    if let IngestionEvent::Progress {
                        book_id,
                        processed,
                        total,
                        ..
                    } = &event
                    {
                        println!("{book_id}: {processed}/{total}");
                    }
                    library.handle_event(&event).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed ingestion events");
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
        library.refresh().await?;
        if library.resume_pending().is_none() {
            break;
        }
    }
    for notice in library.take_notices() {
        println!("note: {notice}");
    }
    Ok(())
}

fn print_library(library: &Library) {
    let entries = library.entries();
    if entries.is_empty() {
        println!("library is empty");
        return;
    }
    for entry in entries {
        println!(
            "{}  {:<10} {:>5.1}%  page {}/{}  {}",
            entry.id,
            entry.status.to_string(),
            entry.progress * 100.0,
            entry.last_page + 1,
            entry.total_pages,
            entry.name
        );
    }
}

async fn read(library: &Library, store: &Arc<LibraryStore>, config: &AppConfig, id: &str) -> Result<()> {
    let book = match library.open_document(id).await {
        Ok(book) => book,
        Err(LibraryError::StillPreparing(_)) => {
            println!("{id} is still being prepared; try again shortly");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let (speech_tx, speech_rx) = mpsc::unbounded_channel();
    let settings = PlayerSettings::from_config(config);
    let quiet = settings.min_page_interval + settings.retry_delay * 2;
    let mut session = PlaybackSession::new(
        Player::new(&book, settings),
        Arc::clone(store),
        LoggingSpeechEngine::new(speech_tx),
        speech_rx,
    );

    session
        .dispatch(Message::ContainerResized {
            size: READ_CONTAINER,
            at: std::time::Instant::now(),
        })
        .await;
    session
        .dispatch(Message::Open {
            at: std::time::Instant::now(),
        })
        .await;
    session.run_until_quiet(quiet).await;
    if session.player().phase() == PlayerPhase::ReadyPaused {
        session
            .dispatch(Message::Play {
                at: std::time::Instant::now(),
            })
            .await;
        session.run_until_quiet(quiet).await;
    }

    let view = session.view();
    session
        .dispatch(Message::Leave {
            at: std::time::Instant::now(),
        })
        .await;
    match view.notice {
        Some(notice) => println!("stopped on page {}: {notice:?}", view.page + 1),
        None => println!("stopped on page {} of {}", view.page + 1, view.total_pages),
    }
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
