//! MidiCue GW - MIDI cue protocol gateway
//!
//! Exports recorded show timelines as cue files and runs the cue resolver.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use midicue_gw::cli;
use midicue_gw::config::{AppConfig, ConfigWatcher, LibraryConfig};
use midicue_gw::drivers::{ConsoleDriver, OutputDriver};
use midicue_gw::encoder::{encode, CuePayload, CueTimeline};
use midicue_gw::import::read_cue_file;
use midicue_gw::library::{
    IdentityLoader, ItemSource, MediaLibrary, PresentationStore, SongLibrary,
};
use midicue_gw::paths::AppPaths;
use midicue_gw::protocol::{ActionVerb, BLANK_NOTE, MAX_CONTENT_INDEX};
use midicue_gw::recorder::Recording;
use midicue_gw::resolver::{ItemSources, Resolver, ResolverActor, ResolverContext};
use midicue_gw::setlist::{Setlist, SetlistStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// MidiCue GW - export cue files and resolve cue triggers against a setlist
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the platform data directory)
    #[arg(short, long, env = "MIDICUE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Also write a daily rolling log file into the logs directory
    #[arg(long, env = "LOG_TO_FILE")]
    log_to_file: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a recording (JSON) into a cue file
    Export {
        /// Recording JSON file
        recording: PathBuf,
        /// Output .mid path (defaults to the recording path with .mid)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Tempo override
        #[arg(long)]
        bpm: Option<f64>,
    },
    /// Print the contents of a cue file
    Inspect {
        file: PathBuf,
    },
    /// Show the hash input, fingerprint and identity notes of an item
    Fingerprint {
        /// Item JSON file or inline JSON
        item: String,
    },
    /// Run the resolver with an interactive REPL (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = match &args.config {
        Some(config) => AppPaths::for_config(config.clone()),
        None => AppPaths::detect(),
    };

    let log_dir = args.log_to_file.then(|| paths.logs_dir.clone());
    let _log_guard = init_logging(&args.log_level, args.log_json, log_dir.as_deref())?;

    match args.command.unwrap_or(Command::Run) {
        Command::Export {
            recording,
            output,
            bpm,
        } => {
            let config = load_config_or_default(&paths.config).await?;
            export(&recording, output, bpm, &config).await
        }
        Command::Inspect { file } => inspect(&file).await,
        Command::Fingerprint { item } => fingerprint(&item).await,
        Command::Run => run(paths).await,
    }
}

async fn load_config_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await
    } else {
        Ok(AppConfig::default())
    }
}

async fn export(
    recording_path: &Path,
    output: Option<PathBuf>,
    bpm: Option<f64>,
    config: &AppConfig,
) -> Result<()> {
    let text = tokio::fs::read_to_string(recording_path)
        .await
        .with_context(|| format!("Failed to read recording: {}", recording_path.display()))?;
    let mut recording: Recording = serde_json::from_str(&text)
        .with_context(|| format!("Invalid recording JSON: {}", recording_path.display()))?;
    if bpm.is_some() {
        recording.bpm = bpm;
    }

    let payload = CuePayload::new(recording.item.clone())
        .with_background(recording.background.clone())
        .with_media_duration(recording.media_duration_seconds);
    let timeline = CueTimeline::for_recording(&recording, &payload, config.export.default_bpm);
    let encoded = encode(&timeline).context("Failed to encode cue file")?;

    for dropped in &encoded.dropped {
        println!("  {} {}", "⚠️ ".yellow(), dropped.to_string().yellow());
    }

    let output = output.unwrap_or_else(|| recording_path.with_extension("mid"));
    encoded.save(&output).await?;

    println!(
        "{} {} ({} cue(s), {} dropped, {} bytes)",
        "✅ Wrote".green(),
        output.display().to_string().bright_white(),
        encoded.note_count,
        encoded.dropped.len(),
        encoded.bytes.len()
    );
    Ok(())
}

async fn inspect(path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read cue file: {}", path.display()))?;
    let file = read_cue_file(&bytes)
        .with_context(|| format!("Failed to parse cue file: {}", path.display()))?;

    println!("\n{}", format!("=== {} ===", path.display()).bold().cyan());
    println!("  Tempo:     {:.2} bpm ({} ticks/beat)", file.bpm, file.ticks_per_beat);
    println!("  Type:      {}", file.item_type.to_string().cyan());
    match file.identity {
        Some(notes) => println!("  Identity:  {}", notes.to_string().bright_white()),
        None => println!("  Identity:  {}", "none".dimmed()),
    }

    match &file.payload {
        Some(Ok(payload)) => {
            let matches = file.identity == Some(payload.item.identity_notes());
            let check = if matches { "✓ notes match".green() } else { "✗ notes differ".red() };
            println!("  Payload:   {} {}", payload.item.title().bright_white(), check);
        }
        Some(Err(e)) => println!("  Payload:   {}", format!("malformed ({})", e).red()),
        None => println!("  Payload:   {}", "none".dimmed()),
    }

    println!("\n{}", format!("Cues ({}):", file.cues.len()).bold());
    for cue in &file.cues {
        println!(
            "  {:>9.3}s  {:>3}  {}",
            cue.timestamp_seconds,
            cue.index,
            describe_cue(cue.index).yellow()
        );
    }
    println!("\n  End:       {:.3}s\n", file.end_seconds);
    Ok(())
}

fn describe_cue(index: u32) -> String {
    if index <= MAX_CONTENT_INDEX {
        return format!("slide {}", index + 1);
    }
    if index == u32::from(BLANK_NOTE) {
        return "blank".to_string();
    }
    let verb = u8::try_from(index).ok().and_then(ActionVerb::from_note);
    match verb {
        Some(verb) => verb.to_string(),
        None => "unassigned".to_string(),
    }
}

async fn fingerprint(arg: &str) -> Result<()> {
    let item = cli::load_identity(arg).await?;
    println!("\n{}", item.title().bold().cyan());
    println!("  Type:         {} ({})", item.type_code(), item.type_code().value());
    println!("  Hash input:   {}", item.hash_input().dimmed());
    println!("  Fingerprint:  {}", item.fingerprint().to_string().bright_white());
    println!("  Notes:        {}\n", item.identity_notes().to_string().green());
    Ok(())
}

async fn run(paths: AppPaths) -> Result<()> {
    paths.ensure_directories()?;
    if !paths.config.exists() {
        AppConfig::default().save(&paths.config).await?;
        info!("Created default config at {}", paths.config.display());
    }

    info!("Starting MidiCue GW...");
    info!("Configuration file: {}", paths.config.display());
    let (mut config_watcher, initial_config) = ConfigWatcher::new(paths.config.clone()).await?;

    let db_path = initial_config
        .state
        .db_path
        .clone()
        .unwrap_or_else(|| paths.sled_db_path());
    let store = SetlistStore::open(&db_path)?;
    let setlist = Setlist::from_items(store.load());

    let console = Arc::new(ConsoleDriver::new("console"));
    console.init().await?;

    let resolver = Resolver::new(initial_config.resolver_config(), setlist);
    let handle = ResolverActor::spawn(
        resolver,
        ResolverContext {
            sources: build_sources(&initial_config.library).await,
            loader: Arc::new(IdentityLoader),
            drivers: vec![console as Arc<dyn OutputDriver>],
            store: Some(store),
        },
    );

    let repl = cli::run_repl(handle.clone());
    let shutdown = shutdown_signal();
    tokio::pin!(repl);
    tokio::pin!(shutdown);

    let mut library = initial_config.library.clone();
    loop {
        tokio::select! {
            result = &mut repl => {
                if let Err(e) = result {
                    warn!("REPL stopped: {:#}", e);
                }
                break;
            }

            Some(new_config) = config_watcher.next_config() => {
                handle.update_config(new_config.resolver_config());
                if new_config.library != library {
                    warn!("⚠️  Library paths changed; restart to rescan sources");
                    library = new_config.library;
                }
                info!("✅ Resolver timings updated");
            }

            _ = &mut shutdown => break,
        }
    }

    info!("Shutting down...");
    handle.shutdown().await;
    info!("MidiCue GW shutdown complete");
    Ok(())
}

/// Build the lookup sources; a source that fails to load is skipped
async fn build_sources(library: &LibraryConfig) -> ItemSources {
    let mut sources = ItemSources::default();

    if let Some(path) = &library.songs_file {
        match SongLibrary::load(path).await {
            Ok(songs) => sources.text.push(Arc::new(songs) as Arc<dyn ItemSource>),
            Err(e) => warn!("Song library unavailable: {}", e),
        }
    }
    if let Some(dir) = &library.media_dir {
        info!("🎞️  Media library: {}", dir.display());
        sources.external.push(Arc::new(MediaLibrary::new(dir.clone())) as Arc<dyn ItemSource>);
    }
    if let Some(dir) = &library.presentations_dir {
        info!("🖼️  Presentation store: {}", dir.display());
        sources
            .external
            .push(Arc::new(PresentationStore::new(dir.clone())) as Arc<dyn ItemSource>);
    }

    sources
}

fn init_logging(level: &str, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_target(false));
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "midicue-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
