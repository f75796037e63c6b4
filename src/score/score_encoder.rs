use crate::parser::smf_parser::NoteEvent;
use crate::score::note_format::{NoteFormat, NoteType};
use crate::time::quantizer::ScorePosition;
use crate::time::rational::lcm;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Chart problems found while encoding, encoding carries on regardless.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// Two notes on the same lane at the same position
    ConcurrentNotes,
    /// Note pitch matches no lane
    DeviatedNotes,
    /// More simultaneous note-ons than allowed
    TooManyParallels,
    /// Row needs a finer subdivision than allowed
    LongLines,
}

impl DiagnosticKind {
    /// Soft diagnostics do not make a chart unusable.
    pub const fn is_soft(self) -> bool {
        matches!(self, Self::DeviatedNotes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongLine {
    pub lane: usize,
    pub bar: u32,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub kinds: BTreeSet<DiagnosticKind>,
    pub concurrent_notes: Vec<NoteEvent>,
    pub deviated_notes: Vec<NoteEvent>,
    pub parallel_notes: Vec<NoteEvent>,
    pub long_lines: Vec<LongLine>,
}

impl Diagnostics {
    fn flag(&mut self, kind: DiagnosticKind) {
        self.kinds.insert(kind);
    }

    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// At least one diagnostic that is not soft.
    pub fn has_errors(&self) -> bool {
        self.kinds.iter().any(|kind| !kind.is_soft())
    }
}

/// First `limit` items and how many were left out.
pub fn preview<T>(items: &[T], limit: usize) -> (&[T], usize) {
    let shown = items.len().min(limit);
    (&items[..shown], items.len() - shown)
}

/// Classified notes of a single lane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct NoteAggregate {
    pub hit: usize,
    pub accent_hit: usize,
    pub hold: usize,
}

impl NoteAggregate {
    pub const fn total(&self) -> usize {
        self.hit + self.accent_hit + self.hold
    }

    fn count(&mut self, note_type: NoteType) {
        match note_type {
            NoteType::Hit => self.hit += 1,
            NoteType::AccentHit => self.accent_hit += 1,
            NoteType::HoldEnd => self.hold += 1,
            NoteType::HoldBegin => {}
        }
    }
}

/// A classified note, holds produce one per end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScoreNote<'a> {
    pub note_type: NoteType,
    pub event: &'a NoteEvent,
}

/// One lane of one bar, e.g. `0:001:1020`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
    pub lane: usize,
    pub bar: u32,
    pub row: String,
}

impl fmt::Display for ScoreLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:03}:{}", self.lane, self.bar, self.row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedScore {
    /// Ordered by bar then lane
    pub lines: Vec<ScoreLine>,
    /// Indexed by lane
    pub aggregates: Vec<NoteAggregate>,
    pub diagnostics: Diagnostics,
}

impl EncodedScore {
    pub fn total_notes(&self) -> usize {
        self.aggregates.iter().map(NoteAggregate::total).sum()
    }
}

pub struct ScoreEncoder<'f> {
    format: &'f NoteFormat,
}

impl<'f> ScoreEncoder<'f> {
    pub const fn new(format: &'f NoteFormat) -> Self {
        Self { format }
    }

    /// Encode the notes of one track, expected in tick order with bar and position set.
    pub fn encode(&self, notes: &[NoteEvent]) -> EncodedScore {
        let lane_count = self.format.lanes.len();
        let mut diagnostics = Diagnostics::default();
        let mut aggregates = vec![NoteAggregate::default(); lane_count];

        let lanes = self.partition(notes, &mut diagnostics);
        self.check_parallels(&lanes, &mut diagnostics);

        // (bar, lane) keeps lines ordered by bar then lane
        let mut cells: BTreeMap<(u32, usize), Vec<ScoreNote<'_>>> = BTreeMap::new();
        for (lane, events) in lanes.iter().enumerate() {
            for note in self.classify_lane(events) {
                aggregates[lane].count(note.note_type);
                cells.entry((note.event.bar, lane)).or_default().push(note);
            }
        }

        let lines = cells
            .into_iter()
            .filter_map(|((bar, lane), cell)| self.render_row(bar, lane, &cell, &mut diagnostics))
            .collect();

        for kind in &diagnostics.kinds {
            log::debug!("Encoding diagnostic {kind:?}");
        }
        EncodedScore {
            lines,
            aggregates,
            diagnostics,
        }
    }

    fn partition<'n>(
        &self,
        notes: &'n [NoteEvent],
        diagnostics: &mut Diagnostics,
    ) -> Vec<Vec<&'n NoteEvent>> {
        let mut lanes = vec![Vec::new(); self.format.lanes.len()];
        for note in notes {
            if let Some(lane) = self.format.lane_of(note.pitch) {
                lanes[lane].push(note);
            } else {
                if note.is_note_on() {
                    diagnostics.flag(DiagnosticKind::DeviatedNotes);
                }
                diagnostics.deviated_notes.push(note.clone());
            }
        }
        lanes
    }

    fn check_parallels(&self, lanes: &[Vec<&NoteEvent>], diagnostics: &mut Diagnostics) {
        let Some(limit) = self.format.parallel_note_limit else {
            return;
        };
        let mut by_tick: BTreeMap<u64, Vec<&NoteEvent>> = BTreeMap::new();
        for note in lanes.iter().flatten().copied().filter(|n| n.is_note_on()) {
            by_tick.entry(note.tick).or_default().push(note);
        }
        for (tick, group) in by_tick {
            if group.len() > limit {
                log::debug!("{} note-ons at tick {tick}, limit is {limit}", group.len());
                diagnostics.flag(DiagnosticKind::TooManyParallels);
                diagnostics.parallel_notes.extend(group.into_iter().cloned());
            }
        }
    }

    /// Each note-on lasts until the next unclaimed note-off of its lane, long enough notes
    /// become a hold whose end is that note-off. Note-ons in between are classified on their own.
    fn classify_lane<'n>(&self, events: &[&'n NoteEvent]) -> Vec<ScoreNote<'n>> {
        let mut classified = Vec::new();
        let mut claimed = vec![false; events.len()];
        for (index, event) in events.iter().copied().enumerate() {
            if !event.is_note_on() {
                continue;
            }
            let release = (index + 1..events.len())
                .find(|&later| !claimed[later] && !events[later].is_note_on());
            let Some(release) = release else {
                log::warn!(
                    "Note at bar {} {} never ends, written as a hit",
                    event.bar,
                    event.position
                );
                classified.push(self.short_note(event));
                continue;
            };
            claimed[release] = true;
            let end_event = events[release];

            let start = ScorePosition::new(event.bar, event.position);
            let end = ScorePosition::new(end_event.bar, end_event.position);
            if start.bars_until(&end) >= self.format.hold_min_length {
                classified.push(ScoreNote {
                    note_type: NoteType::HoldBegin,
                    event,
                });
                classified.push(ScoreNote {
                    note_type: NoteType::HoldEnd,
                    event: end_event,
                });
            } else {
                classified.push(self.short_note(event));
            }
        }
        classified
    }

    fn short_note<'n>(&self, event: &'n NoteEvent) -> ScoreNote<'n> {
        let note_type = if self.format.is_accent(event) {
            NoteType::AccentHit
        } else {
            NoteType::Hit
        };
        ScoreNote { note_type, event }
    }

    /// Lay the notes of a cell on the coarsest grid holding all of their positions.
    fn render_row(
        &self,
        bar: u32,
        lane: usize,
        cell: &[ScoreNote<'_>],
        diagnostics: &mut Diagnostics,
    ) -> Option<ScoreLine> {
        let denominator = cell
            .iter()
            .map(|note| note.event.position.reduce().denominator())
            .fold(1, lcm);
        let Ok(length) = usize::try_from(denominator) else {
            log::warn!("Lane {lane} bar {bar} cannot be laid out on {denominator} steps");
            return None;
        };

        let mut row = vec!['0'; length];
        for note in cell {
            let offset = note
                .event
                .position
                .reduce()
                .with_denominator(denominator)
                .and_then(|p| usize::try_from(p.numerator()).ok())
                .filter(|offset| *offset < length);
            let Some(offset) = offset else {
                log::warn!(
                    "Position {} outside of bar {bar}, note dropped",
                    note.event.position
                );
                continue;
            };
            if row[offset] == '0' {
                row[offset] = note.note_type.symbol(note.event.channel);
            } else {
                log::debug!(
                    "Lane {lane} bar {bar} position {} already taken",
                    note.event.position
                );
                diagnostics.flag(DiagnosticKind::ConcurrentNotes);
                diagnostics.concurrent_notes.push(note.event.clone());
            }
        }

        if length > self.format.allowed_row_length {
            diagnostics.flag(DiagnosticKind::LongLines);
            diagnostics.long_lines.push(LongLine { lane, bar, length });
        }
        Some(ScoreLine {
            lane,
            bar,
            row: row.into_iter().collect(),
        })
    }
}
