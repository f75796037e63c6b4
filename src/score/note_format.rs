use crate::parser::smf_parser::NoteEvent;
use crate::time::pitch::pitch_name;
use crate::time::rational::RationalTime;
use std::fmt;

/// C3 D3 E3 F3
pub const DEFAULT_LANES: [u8; 4] = [48, 50, 52, 53];
pub const DEFAULT_ALLOWED_ROW_LENGTH: usize = 192;
pub const DEFAULT_PARALLEL_NOTE_LIMIT: usize = 2;

/// Three quarters of a bar
pub const fn default_hold_min_length() -> RationalTime {
    match RationalTime::new(3, 4) {
        Ok(length) => length,
        Err(_) => RationalTime::ONE,
    }
}

/// Chart symbol classes, the discriminant is the digit written in a row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NoteType {
    Hit = 1,
    HoldBegin = 2,
    HoldEnd = 3,
    AccentHit = 4,
}

impl NoteType {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// `'0' + ordinal + (channel << 3)`, so channels above 0 move past the digits.
    ///
    /// Channels 0 to 9 stay in ASCII. Channels 10 to 15 give U+0081..U+00AC, written as two
    /// UTF-8 bytes each, so a row's step count is its `chars().count()`, not its byte length.
    pub fn symbol(self, channel: u8) -> char {
        char::from(b'0' + self.ordinal() + ((channel & 0x0F) << 3))
    }
}

pub type AccentPredicate = Box<dyn Fn(&NoteEvent) -> bool>;

/// How notes are placed and classified in a chart.
pub struct NoteFormat {
    /// Notes at least this long (in bars) become holds
    pub hold_min_length: RationalTime,
    /// Pitch of each lane, the index is the lane number
    pub lanes: Vec<u8>,
    /// Rows longer than this are reported
    pub allowed_row_length: usize,
    /// Maximum number of note-ons sharing a tick
    pub parallel_note_limit: Option<usize>,
    accent: Option<AccentPredicate>,
}

impl Default for NoteFormat {
    fn default() -> Self {
        Self::new(DEFAULT_LANES.to_vec())
    }
}

impl fmt::Debug for NoteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lanes: Vec<String> = self.lanes.iter().map(|p| pitch_name(*p)).collect();
        f.debug_struct("NoteFormat")
            .field("hold_min_length", &self.hold_min_length)
            .field("lanes", &lanes)
            .field("allowed_row_length", &self.allowed_row_length)
            .field("parallel_note_limit", &self.parallel_note_limit)
            .field("accent", &self.accent.is_some())
            .finish()
    }
}

impl NoteFormat {
    pub fn new(lanes: Vec<u8>) -> Self {
        Self {
            hold_min_length: default_hold_min_length(),
            lanes,
            allowed_row_length: DEFAULT_ALLOWED_ROW_LENGTH,
            parallel_note_limit: Some(DEFAULT_PARALLEL_NOTE_LIMIT),
            accent: None,
        }
    }

    pub const fn with_hold_min_length(mut self, hold_min_length: RationalTime) -> Self {
        self.hold_min_length = hold_min_length;
        self
    }

    pub const fn with_allowed_row_length(mut self, allowed_row_length: usize) -> Self {
        self.allowed_row_length = allowed_row_length;
        self
    }

    pub const fn with_parallel_note_limit(mut self, limit: Option<usize>) -> Self {
        self.parallel_note_limit = limit;
        self
    }

    /// Short notes matching `predicate` are written as accented hits.
    pub fn with_accent<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NoteEvent) -> bool + 'static,
    {
        self.accent = Some(Box::new(predicate));
        self
    }

    pub fn lane_of(&self, pitch: u8) -> Option<usize> {
        self.lanes.iter().position(|p| *p == pitch)
    }

    pub fn is_accent(&self, note: &NoteEvent) -> bool {
        self.accent.as_ref().is_some_and(|accent| accent(note))
    }
}
