//! Command-line REPL driving a running resolver
//!
//! Stands in for the live MIDI transport during rehearsal: commands are
//! typed by hand, raw bytes go through the same [`CommandDecoder`] a port
//! listener would use, and `play` replays an exported cue file in real time.

use crate::decoder::{CommandDecoder, CueCommand, Direction};
use crate::identity::ItemIdentity;
use crate::import::read_cue_file;
use crate::midi::{format_hex, parse_hex, MidiMessage};
use crate::protocol::{ActionVerb, ItemTypeCode, CUE_CHANNEL, CUE_VELOCITY};
use crate::resolver::{PendingView, ResolverHandle, ResolverSnapshot};
use crate::setlist::ItemId;
use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const PROMPT: &str = "midicue> ";

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Cue(CueCommand),
    /// Raw MIDI bytes fed through the decoder
    Midi(Vec<u8>),
    /// Item JSON (inline or a file path) announced by its identity notes
    Identify(String),
    Play(PathBuf),
    Select(ItemId),
    Add(String),
    Status,
    Help,
    Quit,
}

/// Parse a REPL line; `Ok(None)` for blank lines
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "next" | "n" => ReplCommand::Cue(CueCommand::Navigate(Direction::Next)),
        "prev" | "p" => ReplCommand::Cue(CueCommand::Navigate(Direction::Prev)),
        "goto" | "g" => {
            let index = rest
                .parse::<u32>()
                .with_context(|| format!("goto expects a slide index, got '{}'", rest))?;
            ReplCommand::Cue(CueCommand::Navigate(Direction::Index(index)))
        }
        "blank" | "b" => ReplCommand::Cue(CueCommand::Blank),
        "activate" => ReplCommand::Cue(CueCommand::Action(ActionVerb::Activate)),
        "pause" => ReplCommand::Cue(CueCommand::Action(ActionVerb::Pause)),
        "stop" => ReplCommand::Cue(CueCommand::Action(ActionVerb::Stop)),
        "loop" => match rest {
            "on" => ReplCommand::Cue(CueCommand::Action(ActionVerb::LoopOn)),
            "off" => ReplCommand::Cue(CueCommand::Action(ActionVerb::LoopOff)),
            _ => bail!("usage: loop on|off"),
        },
        "midi" => match parse_hex(rest) {
            Some(bytes) if !bytes.is_empty() => ReplCommand::Midi(bytes),
            _ => bail!("midi expects hex bytes, e.g. 'midi 90 05 7F'"),
        },
        "identify" | "id" => {
            if rest.is_empty() {
                bail!("usage: identify <item.json | inline JSON>");
            }
            ReplCommand::Identify(rest.to_string())
        }
        "play" => {
            if rest.is_empty() {
                bail!("usage: play <cue-file.mid>");
            }
            ReplCommand::Play(PathBuf::from(rest))
        }
        "select" => {
            let id = rest
                .trim_start_matches('#')
                .parse::<u64>()
                .with_context(|| format!("select expects an item id, got '{}'", rest))?;
            ReplCommand::Select(ItemId(id))
        }
        "add" => {
            if rest.is_empty() {
                bail!("usage: add <item.json | inline JSON>");
            }
            ReplCommand::Add(rest.to_string())
        }
        "status" | "s" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => bail!("unknown command '{}' (try 'help')", other),
    };
    Ok(Some(command))
}

/// Read an item from inline JSON or a JSON file
pub async fn load_identity(arg: &str) -> Result<ItemIdentity> {
    let text = if arg.starts_with('{') {
        arg.to_string()
    } else {
        tokio::fs::read_to_string(arg)
            .await
            .with_context(|| format!("Failed to read item file: {}", arg))?
    };
    serde_json::from_str(&text).context("Invalid item JSON")
}

/// The type tag a sender puts on the wire; songs travel untagged
fn wire_type(code: ItemTypeCode) -> Option<ItemTypeCode> {
    (code != ItemTypeCode::Song).then_some(code)
}

pub struct Repl {
    handle: ResolverHandle,
    decoder: CommandDecoder,
    playback: Option<JoinHandle<()>>,
}

impl Repl {
    pub fn new(handle: ResolverHandle) -> Self {
        Self {
            handle,
            decoder: CommandDecoder::new(),
            playback: None,
        }
    }

    /// Run one command; returns false once the session should end
    pub async fn execute(&mut self, command: ReplCommand) -> Result<bool> {
        match command {
            ReplCommand::Cue(cue) => self.handle.send(cue),
            ReplCommand::Midi(bytes) => match self.decoder.feed(&bytes) {
                Some(cue) => {
                    debug!("{} -> {:?}", format_hex(&bytes), cue);
                    self.handle.send(cue);
                }
                None => println!("  {}", format!("{} (no command)", format_hex(&bytes)).dimmed()),
            },
            ReplCommand::Identify(arg) => {
                let item = load_identity(&arg).await?;
                let notes = item.identity_notes();
                println!("  {} {} {}", "identify".cyan(), item.title().bright_white(), notes);
                self.handle
                    .send(CueCommand::identify(notes, wire_type(item.type_code())));
            }
            ReplCommand::Play(path) => self.play(&path).await?,
            ReplCommand::Select(id) => {
                if !self.handle.select(id).await {
                    println!("  {}", format!("no setlist item {}", id).yellow());
                }
            }
            ReplCommand::Add(arg) => {
                let item = load_identity(&arg).await?;
                match self.handle.add_item(item).await {
                    Some(id) => println!("  {} {}", "added".green(), id),
                    None => bail!("resolver is not running"),
                }
            }
            ReplCommand::Status => {
                match self.handle.snapshot().await {
                    Some(snapshot) => print_status(&snapshot),
                    None => bail!("resolver is not running"),
                }
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Announce a cue file's item, then replay its cues on their timestamps
    async fn play(&mut self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read cue file: {}", path.display()))?;
        let file = read_cue_file(&bytes)
            .with_context(|| format!("Failed to parse cue file: {}", path.display()))?;
        let Some(notes) = file.identity else {
            bail!("{} carries no identity notes", path.display());
        };

        let payload = file.valid_payload().and_then(|p| match p.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Cannot re-serialize cue file payload: {}", e);
                None
            }
        });
        self.handle.send(CueCommand::IdentifyByHash {
            notes,
            type_code: wire_type(file.item_type),
            payload,
        });

        if let Some(previous) = self.playback.take() {
            previous.abort();
        }
        info!(
            "▶️  Playing {} ({} cue(s), {:.1}s)",
            path.display(),
            file.cues.len(),
            file.end_seconds
        );

        let handle = self.handle.clone();
        let cues = file.cues;
        self.playback = Some(tokio::spawn(async move {
            let start = Instant::now();
            let mut decoder = CommandDecoder::new();
            for cue in cues {
                let Ok(note) = u8::try_from(cue.index) else {
                    continue;
                };
                let at = Duration::from_secs_f64(cue.timestamp_seconds.max(0.0));
                tokio::time::sleep_until(start + at).await;
                let msg = MidiMessage::NoteOn {
                    channel: CUE_CHANNEL,
                    note,
                    velocity: CUE_VELOCITY,
                };
                if let Some(command) = decoder.feed_message(msg) {
                    handle.send(command);
                }
            }
            info!("⏹️  Cue file playback finished");
        }));
        Ok(())
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
    }
}

/// Run the interactive REPL until `quit` or end of input
pub async fn run_repl(handle: ResolverHandle) -> Result<()> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

    // rustyline blocks; a plain thread keeps it from holding up runtime shutdown
    std::thread::Builder::new()
        .name("repl-input".into())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    eprintln!("Failed to start line editor: {}", e);
                    return;
                }
            };
            loop {
                match rl.readline(PROMPT) {
                    Ok(line) => {
                        let _ = rl.add_history_entry(line.as_str());
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                    Err(e) => {
                        eprintln!("Input error: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn REPL input thread")?;

    println!("{}", "=== MidiCue REPL ===".bold().cyan());
    println!("Type 'help' for commands\n");

    let mut repl = Repl::new(handle);
    while let Some(line) = line_rx.recv().await {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("  {}", e.to_string().red());
                continue;
            }
        };
        match repl.execute(command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("  {}", format!("{:#}", e).red()),
        }
    }

    repl.stop_playback();
    Ok(())
}

fn print_status(snapshot: &ResolverSnapshot) {
    println!("\n{}", "Setlist:".bold());
    if snapshot.setlist.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for item in &snapshot.setlist {
        let selected = snapshot.selection.is_some_and(|s| s.item == item.id);
        let marker = if selected { "▶".green() } else { " ".normal() };
        println!(
            "  {} {:>4} {:<13} {}",
            marker,
            item.id.to_string().dimmed(),
            item.type_code().to_string().cyan(),
            item.identity.title().bright_white()
        );
    }

    println!("\n{}", "Session:".bold());
    match snapshot.selection {
        Some(s) if s.blanked => println!("  Selection: {} {}", s.item, "(blank)".yellow()),
        Some(s) => println!("  Selection: {} slide {}/{}", s.item, s.slide + 1, s.slide_count),
        None => println!("  Selection: {}", "none".dimmed()),
    }
    if let Some(pending) = snapshot.pending {
        let view = match pending.view {
            PendingView::Slide(slide) => format!("slide {}", slide + 1),
            PendingView::Blank => "blank".to_string(),
        };
        println!("  Loading:   {} ({})", pending.item.to_string().yellow(), view);
    }
    println!("  Output:    {:?}", snapshot.output);
    println!(
        "  Epoch:     identity {} / clear {}",
        snapshot.epoch.identity_gen, snapshot.epoch.clear_gen
    );
    println!(
        "  Warnings:  {} shown, {} suppressed\n",
        snapshot.warnings_emitted, snapshot.warnings_suppressed
    );
}

fn print_help() {
    println!("\n{}", "Commands:".bold());
    let rows = [
        ("next | prev | goto <n>", "navigate slides"),
        ("blank", "clear the output"),
        ("activate | pause | stop", "player verbs"),
        ("loop on|off", "toggle looping"),
        ("identify <json|file>", "announce an item by its identity notes"),
        ("midi <hex bytes>", "feed raw MIDI through the decoder"),
        ("play <file.mid>", "replay an exported cue file"),
        ("select <id>", "select a setlist item"),
        ("add <json|file>", "append an item to the setlist"),
        ("status", "show setlist and session state"),
        ("quit", "leave the REPL"),
    ];
    for (usage, what) in rows {
        println!("  {:<26} {}", usage.yellow(), what);
    }
    println!();
}
