use crate::parser::primitive_parser::{
    be_value, make_string, parse_chunk_header, parse_u8, parse_vlq, skip, take_bytes,
};
use crate::parser::smf_parser::{
    NoteEvent, NoteEventType, SmfFormat, TempoEvent, TimeSignatureEvent, Track, TRACK_TAG,
};
use crate::time::rational::RationalTime;
use crate::ScoreError;
use nom::error::{Error, ErrorKind};
use nom::{IResult, Parser};

// channel messages, upper nibble of the status byte
const NOTE_OFF: u8 = 0x8;
const NOTE_ON: u8 = 0x9;
const KEY_PRESSURE: u8 = 0xA;
const CONTROL_CHANGE: u8 = 0xB;
const PROGRAM_CHANGE: u8 = 0xC;
const CHANNEL_PRESSURE: u8 = 0xD;
const PITCH_BEND: u8 = 0xE;
const SYSTEM: u8 = 0xF;

// system messages
const SYSEX: u8 = 0xF0;
const SYSEX_ESCAPE: u8 = 0xF7;
const META_EVENT: u8 = 0xFF;

// meta event types
const META_INSTRUMENT_NAME: u8 = 0x03;
const META_TRACK_END: u8 = 0x2F;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;

const TEMPO_LENGTH: usize = 3;
/// Denominators above 2^30 cannot be represented by a bar length
const MAX_DENOMINATOR_EXPONENT: u8 = 30;

/// Outcome of one decoded event
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TrackStep {
    Continue,
    End,
}

fn invalid(i: &[u8]) -> nom::Err<Error<&[u8]>> {
    nom::Err::Failure(Error::new(i, ErrorKind::Verify))
}

/// Controller number and value, plus one stray byte when the value does not fit in 7 bits.
/// The byte after a well-formed pair starts the next delta time and is left alone.
fn parse_control_change(i: &[u8]) -> IResult<&[u8], ()> {
    let (i, (controller, value)) = (parse_u8, parse_u8).parse(i)?;
    if value > 0x7F {
        log::debug!("Control change {controller} with value {value:#04X}, skipping one more byte");
        let (i, _) = parse_u8(i)?;
        return Ok((i, ()));
    }
    Ok((i, ()))
}

/// Decodes track chunks one after the other, collecting notes per track and the conductor events
/// (tempo, time signature) of the whole file.
pub struct TrackParser {
    format: SmfFormat,
    title: Option<String>,
    tracks: Vec<Track>,
    tempo_events: Vec<TempoEvent>,
    time_signature_events: Vec<TimeSignatureEvent>,
}

impl TrackParser {
    pub const fn new(format: SmfFormat) -> Self {
        Self {
            format,
            title: None,
            tracks: Vec::new(),
            tempo_events: Vec::new(),
            time_signature_events: Vec::new(),
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Option<String>,
        Vec<Track>,
        Vec<TempoEvent>,
        Vec<TimeSignatureEvent>,
    ) {
        (
            self.title,
            self.tracks,
            self.tempo_events,
            self.time_signature_events,
        )
    }

    pub fn parse_tracks(&mut self, i: &[u8], track_count: usize) -> Result<(), ScoreError> {
        log::debug!("Parsing {track_count} tracks");
        let mut i = i;
        for index in 1..=track_count {
            let (inner, (tag, length)) = parse_chunk_header(i).map_err(|_err| {
                log::error!("Missing chunk for track {index}");
                ScoreError::InvalidFile(format!("missing chunk for track {index}"))
            })?;
            if &tag != TRACK_TAG {
                log::error!("Expected track chunk {index}, found {tag:02X?}");
                return Err(ScoreError::InvalidFile(format!(
                    "expected MTrk chunk for track {index}, found {:?}",
                    String::from_utf8_lossy(&tag)
                )));
            }
            let (inner, chunk) = take_bytes(length as usize)(inner).map_err(|_err| {
                log::error!("Track {index} declares {length} bytes past the end of the file");
                ScoreError::InvalidFile(format!("track {index} is truncated"))
            })?;
            i = inner;

            let (_rest, track) = self.parse_track(index)(chunk).map_err(|e| {
                log::error!("Failed to parse track {index}: {e:?}");
                ScoreError::InvalidFile(format!("malformed event stream in track {index}"))
            })?;
            self.tracks.push(track);
        }
        if !i.is_empty() {
            log::debug!("{} bytes after the last track ignored", i.len());
        }
        Ok(())
    }

    pub fn parse_track(
        &mut self,
        index: usize,
    ) -> impl FnMut(&[u8]) -> IResult<&[u8], Track> + '_ {
        move |i| {
            log::debug!("--------");
            log::debug!("Parsing track {index}");
            let mut i = i;
            let mut track = Track {
                index,
                ..Track::default()
            };
            let mut tick: u64 = 0;
            loop {
                if i.is_empty() {
                    log::error!("Track {index} has no end of track event");
                    return Err(nom::Err::Failure(Error::new(i, ErrorKind::Eof)));
                }
                let (inner, delta) = parse_vlq(i)?;
                tick += u64::from(delta);
                let (inner, status) = parse_u8(inner)?;
                let (inner, step) = self.parse_event(inner, status, tick, &mut track)?;
                i = inner;
                if step == TrackStep::End {
                    if !i.is_empty() {
                        log::debug!("{} bytes after end of track {index} ignored", i.len());
                    }
                    log::debug!("Track {index}: {} note events", track.notes.len());
                    return Ok((i, track));
                }
            }
        }
    }

    fn parse_event<'a>(
        &mut self,
        i: &'a [u8],
        status: u8,
        tick: u64,
        track: &mut Track,
    ) -> IResult<&'a [u8], TrackStep> {
        match status >> 4 {
            NOTE_OFF | NOTE_ON => {
                let (i, (pitch, velocity)) = (parse_u8, parse_u8).parse(i)?;
                let channel = status & 0x0F;
                // note on with velocity 0 releases the note
                let event_type = if status >> 4 == NOTE_ON && velocity > 0 {
                    NoteEventType::NoteOn
                } else {
                    NoteEventType::NoteOff
                };
                track
                    .notes
                    .push(NoteEvent::new(event_type, channel, pitch, velocity, tick));
                Ok((i, TrackStep::Continue))
            }
            KEY_PRESSURE | PITCH_BEND => {
                let (i, ()) = skip(i, 2)?;
                Ok((i, TrackStep::Continue))
            }
            CONTROL_CHANGE => {
                let (i, ()) = parse_control_change(i)?;
                Ok((i, TrackStep::Continue))
            }
            PROGRAM_CHANGE | CHANNEL_PRESSURE => {
                let (i, ()) = skip(i, 1)?;
                Ok((i, TrackStep::Continue))
            }
            SYSTEM => match status {
                META_EVENT => self.parse_meta_event(i, tick, track),
                SYSEX | SYSEX_ESCAPE => {
                    let (i, length) = parse_vlq(i)?;
                    let (i, ()) = skip(i, length as usize)?;
                    Ok((i, TrackStep::Continue))
                }
                other => {
                    log::error!("Unsupported system message {other:#04X} at tick {tick}");
                    Err(invalid(i))
                }
            },
            _ => {
                log::error!(
                    "Data byte {status:#04X} in place of a status byte at tick {tick}, running status is not supported"
                );
                Err(invalid(i))
            }
        }
    }

    fn parse_meta_event<'a>(
        &mut self,
        i: &'a [u8],
        tick: u64,
        track: &mut Track,
    ) -> IResult<&'a [u8], TrackStep> {
        let (i, (meta_type, length)) = (parse_u8, parse_vlq).parse(i)?;
        let (i, data) = take_bytes(length as usize)(i)?;
        match meta_type {
            META_INSTRUMENT_NAME => {
                let name = make_string(data);
                self.assign_name(track, name);
            }
            META_TRACK_END => return Ok((i, TrackStep::End)),
            META_TEMPO => {
                let microseconds = be_value(data);
                if data.len() != TEMPO_LENGTH || microseconds == 0 {
                    log::error!("Invalid tempo payload {data:02X?} at tick {tick}");
                    return Err(invalid(i));
                }
                let tempo = TempoEvent::new(tick, microseconds as u32);
                log::debug!("Tempo at tick {tick}: {:.3} bpm", tempo.bpm);
                self.tempo_events.push(tempo);
            }
            META_TIME_SIGNATURE => {
                // numerator, denominator exponent, clocks per click and 32nds per quarter ignored
                let [numerator, exponent, ..] = data else {
                    log::error!("Time signature too short at tick {tick}");
                    return Err(invalid(i));
                };
                if *numerator == 0 || *exponent > MAX_DENOMINATOR_EXPONENT {
                    log::error!("Invalid time signature {numerator}/2^{exponent} at tick {tick}");
                    return Err(invalid(i));
                }
                let beat = RationalTime::new(i64::from(*numerator), 1_i64 << *exponent)
                    .map_err(|_err| invalid(i))?;
                log::debug!("Time signature at tick {tick}: {beat}");
                self.time_signature_events.push(TimeSignatureEvent {
                    tick,
                    bar: 0,
                    beat,
                });
            }
            other => log::debug!("Skipping meta event {other:#04X} ({length} bytes)"),
        }
        Ok((i, TrackStep::Continue))
    }

    /// Format 0 names the song, in format 1 the first track names the song and the others
    /// name themselves.
    fn assign_name(&mut self, track: &mut Track, name: String) {
        match self.format {
            SmfFormat::MultiTrack if track.index != 1 => {
                log::debug!("Track {} name: {name}", track.index);
                track.name = Some(name);
            }
            _ => {
                log::debug!("Music title: {name}");
                self.title = Some(name);
            }
        }
    }
}
