use crate::parser::smf_parser::{MidiFile, TempoEvent, TimeSignatureEvent};
use crate::score::note_format::NoteFormat;
use crate::score::score_encoder::{EncodedScore, ScoreEncoder};
use crate::ScoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Chart section produced from the track named `track_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty {
    pub track_name: String,
    pub label: String,
}

impl Difficulty {
    pub fn new(track_name: &str, label: &str) -> Self {
        Self {
            track_name: track_name.to_string(),
            label: label.to_string(),
        }
    }
}

/// Tracks "1", "2" and "3" hold the easy, normal and hard charts.
pub fn default_difficulties() -> Vec<Difficulty> {
    vec![
        Difficulty::new("1", "easy"),
        Difficulty::new("2", "normal"),
        Difficulty::new("3", "hard"),
    ]
}

/// Optional header lines, only written when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl ScoreMetadata {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.title.is_none() && self.artist.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultySection {
    pub label: String,
    pub track_index: usize,
    pub score: EncodedScore,
}

/// Header plus one encoded section per difficulty found in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDocument {
    pub metadata: ScoreMetadata,
    pub tempo_events: Vec<TempoEvent>,
    pub time_signature_events: Vec<TimeSignatureEvent>,
    pub sections: Vec<DifficultySection>,
}

impl ScoreDocument {
    /// Encode the tracks matching `difficulties`, the MIDI title fills in a missing title.
    pub fn build(
        midi: &MidiFile,
        format: &NoteFormat,
        difficulties: &[Difficulty],
        mut metadata: ScoreMetadata,
    ) -> Self {
        if metadata.title.is_none() {
            metadata.title.clone_from(&midi.title);
        }

        let encoder = ScoreEncoder::new(format);
        let mut sections = Vec::new();
        for difficulty in difficulties {
            let Some(track) = midi.track_by_name(&difficulty.track_name) else {
                log::debug!(
                    "No track named {:?}, skipping {}",
                    difficulty.track_name,
                    difficulty.label
                );
                continue;
            };
            log::info!(
                "Encoding {} chart from track {}",
                difficulty.label,
                track.index
            );
            sections.push(DifficultySection {
                label: difficulty.label.clone(),
                track_index: track.index,
                score: encoder.encode(&track.notes),
            });
        }

        Self {
            metadata,
            tempo_events: midi.tempo_events.clone(),
            time_signature_events: midi.time_signature_events.clone(),
            sections,
        }
    }

    pub fn section(&self, label: &str) -> Option<&DifficultySection> {
        self.sections.iter().find(|s| s.label == label)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ScoreError> {
        write!(writer, "{self}")?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_score_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScoreError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|err| {
            log::error!("Failed to create score file {}: {err}", path.display());
            ScoreError::CannotOpenFile(format!("{}: {err}", path.display()))
        })?;
        self.write_to(&mut BufWriter::new(file))
    }
}

impl fmt::Display for ScoreDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("begin:header\n\n")?;
        if !self.metadata.is_empty() {
            if let Some(id) = &self.metadata.id {
                writeln!(f, "id:{id}")?;
            }
            if let Some(title) = &self.metadata.title {
                writeln!(f, "title:{title}")?;
            }
            if let Some(artist) = &self.metadata.artist {
                writeln!(f, "artist:{artist}")?;
            }
            f.write_str("\n")?;
        }
        for tempo in &self.tempo_events {
            writeln!(
                f,
                "tempo:{:03}:{}:{:06.3}",
                tempo.bar, tempo.position, tempo.bpm
            )?;
        }
        for signature in &self.time_signature_events {
            writeln!(f, "beat:{:03}:{}", signature.bar, signature.beat)?;
        }
        f.write_str("\nend\n\n")?;

        for section in &self.sections {
            write!(f, "begin:{}\n\n", section.label)?;
            for line in &section.score.lines {
                writeln!(f, "{line}")?;
            }
            f.write_str("\nend\n\n")?;
        }
        Ok(())
    }
}
