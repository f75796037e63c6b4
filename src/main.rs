use crate::AppError::ConfigError;
use clap::Parser;
use config::Config;
use midi2score::{
    pitch_name, preview, read_smf_file, DecodeStatus, DifficultySection, NoteAggregate,
    NoteEvent, ScoreDocument, ScoreError as LibScoreError, ScoreMetadata,
};
use std::io;
use std::path::PathBuf;

mod config;

/// Offending notes listed per diagnostic kind
const PREVIEW_LIMIT: usize = 10;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("midi2score=info"))
        .init();

    // args
    let args = CliArgs::parse();
    let midi_path = PathBuf::from(&args.midi_file);
    if !midi_path.exists() {
        return Err(AppError::CannotOpenFile(format!(
            "MIDI file not found {midi_path:?}"
        )));
    }

    // read config, command line values win
    let mut config = Config::read_config(args.config.as_deref())?;
    if let Some(lanes) = &args.lanes {
        config.lanes = lanes.split(',').map(|l| l.trim().to_string()).collect();
    }
    if let Some(amplitude) = args.snap_amplitude {
        config.snap_amplitude = amplitude;
    }
    if let Some(threshold) = args.snap_threshold {
        config.snap_threshold = threshold;
    }
    let format = config.note_format()?;
    log::debug!("{format:?}");

    // decode
    log::info!("Reading MIDI file {}", midi_path.display());
    let midi = read_smf_file(&midi_path, &config.decode_options())?;
    if midi.status == DecodeStatus::NoEmbeddedTimeSignature {
        return Err(AppError::InvalidInput(
            "no time signature embedded in the MIDI file".to_string(),
        ));
    }
    if midi.tempo_events.is_empty() {
        return Err(AppError::InvalidInput(
            "no tempo embedded in the MIDI file".to_string(),
        ));
    }
    for tempo in &midi.tempo_events {
        log::info!(
            "Tempo bar:{:03} position:{} bpm:{:.3}",
            tempo.bar,
            tempo.position,
            tempo.bpm
        );
    }
    for signature in &midi.time_signature_events {
        log::info!("Time signature bar:{:03} beat:{}", signature.bar, signature.beat);
    }

    // encode
    let metadata = ScoreMetadata {
        id: args.id,
        title: args.title,
        artist: args.artist,
    };
    let document = ScoreDocument::build(&midi, &format, &config.difficulties, metadata);
    if document.sections.is_empty() {
        log::warn!("No track named after a difficulty, the score only has a header");
    }
    for section in &document.sections {
        report_section(section, &format.lanes);
    }

    // write
    match &args.output {
        Some(path) => {
            document.write_score_file(path)?;
            log::info!("Score written to {}", path.display());
        }
        None => document.write_to(&mut io::stdout().lock())?,
    }
    Ok(())
}

fn report_notes(title: &str, notes: &[NoteEvent]) {
    let (shown, more) = preview(notes, PREVIEW_LIMIT);
    log::warn!("{title}");
    for note in shown {
        log::warn!(
            "  bar:{:03} position:{} pitch:{}",
            note.bar,
            note.position,
            pitch_name(note.pitch)
        );
    }
    if more > 0 {
        log::warn!("  ...and {more} more");
    }
}

fn report_section(section: &DifficultySection, lanes: &[u8]) {
    let diagnostics = &section.score.diagnostics;
    if diagnostics.has_errors() {
        log::error!("{} chart has errors", section.label);
    }
    if !diagnostics.concurrent_notes.is_empty() {
        report_notes(
            "Notes sharing a position, check that hold ends do not meet the next note",
            &diagnostics.concurrent_notes,
        );
    }
    if !diagnostics.deviated_notes.is_empty() {
        report_notes(
            "Notes outside of the configured lanes",
            &diagnostics.deviated_notes,
        );
    }
    if !diagnostics.parallel_notes.is_empty() {
        report_notes(
            "Too many notes at the same time",
            &diagnostics.parallel_notes,
        );
    }
    for line in &diagnostics.long_lines {
        log::warn!(
            "Lane {} bar {:03} needs {} steps",
            line.lane,
            line.bar,
            line.length
        );
    }

    // per lane breakdown
    let header: String = lanes.iter().map(|p| format!("{:>4}|", pitch_name(*p))).collect();
    let row = |count: fn(&NoteAggregate) -> usize| -> String {
        section
            .score
            .aggregates
            .iter()
            .map(|a| format!("{:>4}|", count(a)))
            .collect()
    };
    log::info!("{} chart from track {}", section.label, section.track_index);
    log::info!("      |{header}");
    log::info!("hit   |{}", row(|a| a.hit));
    log::info!("accent|{}", row(|a| a.accent_hit));
    log::info!("hold  |{}", row(|a| a.hold));
    log::info!("all   |{}", row(NoteAggregate::total));
    log::info!("total:{}", section.score.total_notes());
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Standard MIDI File.
    midi_file: String,
    /// Optional path to a JSON configuration, defaults to ~/.midi2score/config.json if present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma separated lane pitches, e.g. C3,D3,E3,F3.
    #[arg(long)]
    lanes: Option<String>,
    /// Write the score to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Song id written in the header.
    #[arg(long)]
    id: Option<String>,
    /// Title written in the header, defaults to the MIDI title.
    #[arg(long)]
    title: Option<String>,
    /// Artist written in the header.
    #[arg(long)]
    artist: Option<String>,
    /// Largest tick offset tried when snapping note-ons, 0 disables snapping.
    #[arg(long)]
    snap_amplitude: Option<u32>,
    /// Positions with a denominator up to this value are not snapped.
    #[arg(long)]
    snap_threshold: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("cannot open file: {0}")]
    CannotOpenFile(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported MIDI file: {0}")]
    Unsupported(String),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<LibScoreError> for AppError {
    fn from(error: LibScoreError) -> Self {
        match error {
            LibScoreError::CannotOpenFile(s) => Self::CannotOpenFile(s),
            LibScoreError::InvalidArg(s) | LibScoreError::InvalidFile(s) => Self::InvalidInput(s),
            LibScoreError::UnsupportedFormat(s) => Self::Unsupported(s),
            LibScoreError::ConfigError(s) => ConfigError(s),
            LibScoreError::IoError(s) => Self::OtherError(s),
            LibScoreError::DivisionByZero => Self::OtherError("division by zero".to_string()),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::OtherError(error.to_string())
    }
}
