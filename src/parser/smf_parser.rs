use crate::parser::primitive_parser::{parse_chunk_header, parse_u16, skip};
use crate::parser::track_parser::TrackParser;
use crate::time::quantizer::{bar_ticks, TimeQuantizer};
use crate::time::rational::RationalTime;
use crate::ScoreError;
use nom::{IResult, Parser};
use std::path::Path;

// SMF 1.0 docs at <https://www.midi.org/specifications/file-format-specifications/standard-midi-files>

pub const HEADER_TAG: &[u8; 4] = b"MThd";
pub const TRACK_TAG: &[u8; 4] = b"MTrk";

/// Size of the header chunk payload defined by SMF 1.0.
pub const HEADER_LENGTH: u32 = 6;

/// Set when the division field counts SMPTE frames instead of ticks per quarter note.
const SMPTE_DIVISION_FLAG: u16 = 0x8000;

pub const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SmfFormat {
    /// Format 0, everything in one track
    SingleTrack,
    /// Format 1, simultaneous tracks, the first one usually carries the conductor events
    MultiTrack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiHeader {
    pub format: SmfFormat,
    pub track_count: u16,
    pub ticks_per_quarter: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoteEventType {
    NoteOn,
    NoteOff,
}

/// Note on/off as read from a track, `bar` and `position` stay zeroed until quantized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEvent {
    pub event_type: NoteEventType,
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    pub tick: u64,
    pub bar: u32,
    pub position: RationalTime,
}

impl NoteEvent {
    pub const fn new(
        event_type: NoteEventType,
        channel: u8,
        pitch: u8,
        velocity: u8,
        tick: u64,
    ) -> Self {
        Self {
            event_type,
            channel,
            pitch,
            velocity,
            tick,
            bar: 0,
            position: RationalTime::ZERO,
        }
    }

    pub const fn is_note_on(&self) -> bool {
        matches!(self.event_type, NoteEventType::NoteOn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSignatureEvent {
    pub tick: u64,
    pub bar: u32,
    /// beats per bar over the beat note value, e.g. 6/8
    pub beat: RationalTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempoEvent {
    pub tick: u64,
    pub bar: u32,
    pub position: RationalTime,
    pub microseconds_per_quarter: u32,
    pub bpm: f64,
}

impl TempoEvent {
    pub fn new(tick: u64, microseconds_per_quarter: u32) -> Self {
        Self {
            tick,
            bar: 0,
            position: RationalTime::ZERO,
            microseconds_per_quarter,
            bpm: MICROSECONDS_PER_MINUTE / f64::from(microseconds_per_quarter),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    /// 1-based position of the track chunk in the file
    pub index: usize,
    pub name: Option<String>,
    pub notes: Vec<NoteEvent>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    Ok,
    /// No time signature anywhere, every event sits in bar 0
    NoEmbeddedTimeSignature,
}

/// Parameters of the note-on snapping performed while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Largest tick offset tried, 0 disables snapping
    pub snap_amplitude: u32,
    /// Positions with a denominator up to this value are left untouched
    pub snap_threshold: i64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            snap_amplitude: 2,
            snap_threshold: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidiFile {
    pub header: MidiHeader,
    pub title: Option<String>,
    pub tracks: Vec<Track>,
    pub tempo_events: Vec<TempoEvent>,
    pub time_signature_events: Vec<TimeSignatureEvent>,
    pub status: DecodeStatus,
}

impl MidiFile {
    /// 1-based like [`Track::index`].
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.iter().find(|t| t.index == index)
    }

    /// First track whose name is exactly `name`.
    pub fn track_by_name(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name.as_deref() == Some(name))
    }
}

fn parse_header_fields(i: &[u8]) -> IResult<&[u8], (u16, u16, u16)> {
    (
        parse_u16, // Format
        parse_u16, // Track count
        parse_u16, // Division
    )
        .parse(i)
}

pub fn parse_header(i: &[u8]) -> Result<(&[u8], MidiHeader), ScoreError> {
    let truncated = |_err| {
        log::error!("Truncated header chunk");
        ScoreError::InvalidFile("truncated header chunk".to_string())
    };

    let (i, (tag, length)) = parse_chunk_header(i).map_err(truncated)?;
    if &tag != HEADER_TAG {
        log::error!("Expected header chunk, found {tag:02X?}");
        return Err(ScoreError::InvalidFile(format!(
            "expected MThd chunk, found {:?}",
            String::from_utf8_lossy(&tag)
        )));
    }
    if length < HEADER_LENGTH {
        return Err(ScoreError::InvalidFile(format!(
            "header chunk too short ({length} bytes)"
        )));
    }

    let (i, (format, track_count, division)) = parse_header_fields(i).map_err(truncated)?;
    log::debug!("Header -> format:{format} tracks:{track_count} division:{division:#06X}");

    let format = match format {
        0 => SmfFormat::SingleTrack,
        1 => SmfFormat::MultiTrack,
        other => {
            log::error!("SMF format {other} is unsupported");
            return Err(ScoreError::UnsupportedFormat(format!("SMF format {other}")));
        }
    };
    if division & SMPTE_DIVISION_FLAG != 0 {
        log::error!("SMPTE time division is unsupported");
        return Err(ScoreError::UnsupportedFormat(
            "SMPTE time division".to_string(),
        ));
    }
    if division == 0 {
        return Err(ScoreError::InvalidFile(
            "zero ticks per quarter note".to_string(),
        ));
    }

    // extra header bytes from future revisions
    let (i, ()) = skip(i, (length - HEADER_LENGTH) as usize).map_err(truncated)?;

    let header = MidiHeader {
        format,
        track_count,
        ticks_per_quarter: division,
    };
    Ok((i, header))
}

/// Decode SMF bytes, snap note-ons and give every event its bar and position.
pub fn parse_smf_data(file_data: &[u8], options: &DecodeOptions) -> Result<MidiFile, ScoreError> {
    let (rest, header) = parse_header(file_data)?;

    let mut parser = TrackParser::new(header.format);
    parser.parse_tracks(rest, usize::from(header.track_count))?;
    let (title, mut tracks, mut tempo_events, mut time_signature_events) = parser.into_parts();

    // tracks are independent streams, conductor events may come from any of them
    tempo_events.sort_by_key(|e| e.tick);
    time_signature_events.sort_by_key(|e| e.tick);

    let status = if time_signature_events.is_empty() {
        log::warn!("No time signature embedded in the MIDI file, bars cannot be computed");
        DecodeStatus::NoEmbeddedTimeSignature
    } else {
        DecodeStatus::Ok
    };

    let ticks_per_quarter = i64::from(header.ticks_per_quarter);
    if let Some(signature) = time_signature_events
        .iter()
        .find(|ts| bar_ticks(ticks_per_quarter, ts.beat) < RationalTime::ONE)
    {
        log::error!(
            "Time signature {} at tick {} makes bars shorter than a tick",
            signature.beat,
            signature.tick
        );
        return Err(ScoreError::InvalidFile(format!(
            "time signature {} at tick {} is shorter than one tick per bar",
            signature.beat, signature.tick
        )));
    }

    let quantizer = TimeQuantizer::new(header.ticks_per_quarter, &time_signature_events)?;
    for track in &mut tracks {
        for note in &mut track.notes {
            let position = if note.is_note_on() && options.snap_amplitude > 0 {
                quantizer.snap(&mut note.tick, options.snap_amplitude, options.snap_threshold)
            } else {
                quantizer.position_of(note.tick)
            };
            note.bar = position.bar;
            note.position = position.position;
        }
        // snapping may move a note-on across a neighbour, releases go first on a shared tick
        track.notes.sort_by_key(|n| (n.tick, n.is_note_on()));
    }
    for tempo in &mut tempo_events {
        let position = quantizer.position_of(tempo.tick);
        tempo.bar = position.bar;
        tempo.position = position.position;
    }
    for signature in &mut time_signature_events {
        signature.bar = quantizer.position_of(signature.tick).bar;
    }

    Ok(MidiFile {
        header,
        title,
        tracks,
        tempo_events,
        time_signature_events,
        status,
    })
}

/// Read and decode a MIDI file from disk.
pub fn read_smf_file<P: AsRef<Path>>(
    path: P,
    options: &DecodeOptions,
) -> Result<MidiFile, ScoreError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ScoreError::InvalidArg("empty MIDI file path".to_string()));
    }
    let file_data = std::fs::read(path).map_err(|err| {
        log::error!("Failed to read MIDI file {}: {err}", path.display());
        ScoreError::CannotOpenFile(format!("{}: {err}", path.display()))
    })?;
    log::debug!("Read {} bytes from {}", file_data.len(), path.display());
    parse_smf_data(&file_data, options)
}
