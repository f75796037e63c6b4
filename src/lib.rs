//! midi2score - Standard MIDI File to rhythm game chart converter
//!
//! This library provides:
//! - Decoding of SMF format 0/1 files into note, tempo and time signature events
//! - Exact rational musical time and bar/position quantization with note snapping
//! - Lane assignment, hit/hold classification and chart text generation with diagnostics
//!
//! # Example
//!
//! ```no_run
//! use midi2score::{
//!     default_difficulties, read_smf_file, DecodeOptions, NoteFormat, ScoreDocument,
//!     ScoreMetadata,
//! };
//!
//! let midi = read_smf_file("song.mid", &DecodeOptions::default()).unwrap();
//! let document = ScoreDocument::build(
//!     &midi,
//!     &NoteFormat::default(),
//!     &default_difficulties(),
//!     ScoreMetadata::default(),
//! );
//! print!("{document}");
//! ```

pub mod error;
pub mod parser;
pub mod score;
pub mod time;

// Re-export main types for convenience
pub use error::ScoreError;
pub use parser::smf_parser::{
    parse_smf_data, read_smf_file, DecodeOptions, DecodeStatus, MidiFile, MidiHeader, NoteEvent,
    NoteEventType, SmfFormat, TempoEvent, TimeSignatureEvent, Track,
};
pub use score::note_format::{
    default_hold_min_length, NoteFormat, NoteType, DEFAULT_ALLOWED_ROW_LENGTH, DEFAULT_LANES,
    DEFAULT_PARALLEL_NOTE_LIMIT,
};
pub use score::score_encoder::{
    preview, DiagnosticKind, Diagnostics, EncodedScore, LongLine, NoteAggregate, ScoreEncoder,
    ScoreLine,
};
pub use score::score_writer::{
    default_difficulties, Difficulty, DifficultySection, ScoreDocument, ScoreMetadata,
};
pub use time::pitch::{parse_pitch_name, pitch_name};
pub use time::quantizer::{ScorePosition, TimeQuantizer};
pub use time::rational::{gcd, lcm, RationalError, RationalTime};
