use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use home::home_dir;
use midi2score::{
    default_difficulties, default_hold_min_length, parse_pitch_name, pitch_name, DecodeOptions,
    Difficulty, NoteFormat, RationalTime, ScoreError, DEFAULT_ALLOWED_ROW_LENGTH, DEFAULT_LANES,
    DEFAULT_PARALLEL_NOTE_LIMIT,
};
use serde::{Deserialize, Serialize};

/// Chart format and decoding parameters, every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lane pitches as names ("C3", "D#3") or note numbers
    pub lanes: Vec<String>,
    pub hold_min_length: RationalTime,
    pub allowed_row_length: usize,
    pub parallel_note_limit: Option<usize>,
    /// Short notes at or above this velocity are accented
    pub accent_velocity: Option<u8>,
    pub snap_amplitude: u32,
    pub snap_threshold: i64,
    pub difficulties: Vec<Difficulty>,
}

impl Default for Config {
    fn default() -> Self {
        let decode = DecodeOptions::default();
        Self {
            lanes: DEFAULT_LANES.iter().map(|p| pitch_name(*p)).collect(),
            hold_min_length: default_hold_min_length(),
            allowed_row_length: DEFAULT_ALLOWED_ROW_LENGTH,
            parallel_note_limit: Some(DEFAULT_PARALLEL_NOTE_LIMIT),
            accent_velocity: None,
            snap_amplitude: decode.snap_amplitude,
            snap_threshold: decode.snap_threshold,
            difficulties: default_difficulties(),
        }
    }
}

impl Config {
    // folder placed in $HOME directory
    const FOLDER: &'static str = ".midi2score";

    fn get_default_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(Self::FOLDER).join("config.json"))
    }

    /// Reads `path`, or `~/.midi2score/config.json` when present, or falls back to defaults.
    pub fn read_config(path: Option<&Path>) -> Result<Self, ScoreError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::get_default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No local configuration, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        log::info!("Reading configuration {}", config_path.display());
        let file = File::open(&config_path).map_err(|err| {
            ScoreError::ConfigError(format!(
                "Could not open configuration {}: {err}",
                config_path.display()
            ))
        })?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader).map_err(|err| {
            ScoreError::ConfigError(format!("Could not read configuration {err:}"))
        })?;
        config.lane_pitches()?;
        Ok(config)
    }

    pub fn lane_pitches(&self) -> Result<Vec<u8>, ScoreError> {
        if self.lanes.is_empty() {
            return Err(ScoreError::ConfigError("no lane configured".to_string()));
        }
        self.lanes
            .iter()
            .map(|lane| {
                parse_pitch_name(lane)
                    .ok_or_else(|| ScoreError::ConfigError(format!("invalid lane pitch {lane:?}")))
            })
            .collect()
    }

    pub fn note_format(&self) -> Result<NoteFormat, ScoreError> {
        let format = NoteFormat::new(self.lane_pitches()?)
            .with_hold_min_length(self.hold_min_length)
            .with_allowed_row_length(self.allowed_row_length)
            .with_parallel_note_limit(self.parallel_note_limit);
        let format = match self.accent_velocity {
            Some(velocity) => format.with_accent(move |note| note.velocity >= velocity),
            None => format,
        };
        Ok(format)
    }

    pub const fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            snap_amplitude: self.snap_amplitude,
            snap_threshold: self.snap_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi2score::{NoteEvent, NoteEventType};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lanes, vec!["C3", "D3", "E3", "F3"]);
        assert_eq!(config.lane_pitches().unwrap(), vec![48, 50, 52, 53]);
        assert_eq!(config.decode_options(), DecodeOptions::default());
        let labels: Vec<&str> = config.difficulties.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["easy", "normal", "hard"]);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "lanes": ["c4", "D#4", "67"], "hold_min_length": "1/2", "accent_velocity": 110 }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.lane_pitches().unwrap(), vec![60, 63, 67]);
        assert_eq!(config.allowed_row_length, 192);
        assert_eq!(config.snap_amplitude, 2);

        let format = config.note_format().unwrap();
        assert_eq!(format.hold_min_length, RationalTime::new(1, 2).unwrap());
        let loud = NoteEvent::new(NoteEventType::NoteOn, 0, 60, 120, 0);
        let soft = NoteEvent::new(NoteEventType::NoteOn, 0, 60, 90, 0);
        assert!(format.is_accent(&loud));
        assert!(!format.is_accent(&soft));
    }

    #[test]
    fn test_round_trip_json() {
        let config = Config {
            parallel_note_limit: None,
            ..Config::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"hold_min_length\": \"3/4\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_values() {
        let config = Config {
            lanes: vec!["H2".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.note_format(), Err(ScoreError::ConfigError(_))));

        let config = Config {
            lanes: Vec::new(),
            ..Config::default()
        };
        assert!(config.lane_pitches().is_err());

        let json = r#"{ "hold_min_length": "3/0" }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_read_explicit_file() {
        let path = std::env::temp_dir().join(format!("midi2score-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "lanes": ["C3", "D3"], "snap_amplitude": 0 }"#).unwrap();
        let config = Config::read_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.lane_pitches().unwrap(), vec![48, 50]);
        assert_eq!(config.decode_options().snap_amplitude, 0);

        let missing = std::env::temp_dir().join("midi2score-no-such-config.json");
        assert!(matches!(
            Config::read_config(Some(&missing)),
            Err(ScoreError::ConfigError(_))
        ));
    }
}
