#[cfg(test)]
use crate::parser::smf_parser::{parse_smf_data, DecodeOptions, MidiFile};
#[cfg(test)]
use crate::ScoreError;

/// Variable-length quantity as written in SMF delta times.
#[cfg(test)]
pub fn write_vlq(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 4];
    let mut i = 3;
    let mut value = value & 0x0FFF_FFFF;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) as u8) | 0x80;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}

/// Writes the event stream of one `MTrk` chunk.
#[cfg(test)]
#[derive(Default)]
pub struct TrackBuilder {
    data: Vec<u8>,
}

#[cfg(test)]
impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, delta: u32, bytes: &[u8]) -> Self {
        write_vlq(&mut self.data, delta);
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn note_on(self, delta: u32, channel: u8, pitch: u8, velocity: u8) -> Self {
        self.raw(delta, &[0x90 | channel, pitch, velocity])
    }

    pub fn note_off(self, delta: u32, channel: u8, pitch: u8) -> Self {
        self.raw(delta, &[0x80 | channel, pitch, 0x40])
    }

    pub fn meta(self, delta: u32, meta_type: u8, payload: &[u8]) -> Self {
        let mut bytes = vec![0xFF, meta_type];
        write_vlq(&mut bytes, payload.len() as u32);
        bytes.extend_from_slice(payload);
        self.raw(delta, &bytes)
    }

    pub fn name(self, delta: u32, name: &str) -> Self {
        self.meta(delta, 0x03, name.as_bytes())
    }

    pub fn tempo(self, delta: u32, microseconds_per_quarter: u32) -> Self {
        let bytes = microseconds_per_quarter.to_be_bytes();
        self.meta(delta, 0x51, &bytes[1..])
    }

    pub fn time_signature(self, delta: u32, numerator: u8, exponent: u8) -> Self {
        self.meta(delta, 0x58, &[numerator, exponent, 24, 8])
    }

    /// Chunk without an end of track event
    pub fn build_unterminated(self) -> Vec<u8> {
        let mut chunk = b"MTrk".to_vec();
        chunk.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        chunk.extend_from_slice(&self.data);
        chunk
    }

    pub fn build(self) -> Vec<u8> {
        self.meta(0, 0x2F, &[]).build_unterminated()
    }
}

#[cfg(test)]
pub fn smf_bytes(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut data = b"MThd".to_vec();
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&format.to_be_bytes());
    data.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    data.extend_from_slice(&division.to_be_bytes());
    for track in tracks {
        data.extend_from_slice(track);
    }
    data
}

#[cfg(test)]
pub fn parse_smf(data: &[u8]) -> Result<MidiFile, ScoreError> {
    parse_smf_data(data, &DecodeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::smf_parser::{
        read_smf_file, DecodeStatus, NoteEventType, SmfFormat, TRACK_TAG,
    };
    use crate::time::rational::RationalTime;

    fn init_logger() {
        env_logger::builder()
            .is_test(true)
            .try_init()
            .unwrap_or_default();
    }

    fn r(n: i64, d: i64) -> RationalTime {
        RationalTime::new(n, d).unwrap()
    }

    fn conductor() -> Vec<u8> {
        TrackBuilder::new()
            .name(0, "My Song")
            .time_signature(0, 4, 2)
            .tempo(0, 500_000)
            .build()
    }

    #[test]
    fn test_single_note_format_1() {
        init_logger();
        let notes = TrackBuilder::new()
            .name(0, "1")
            .note_on(0, 0, 60, 100)
            .note_off(48, 0, 60)
            .build();
        let midi = parse_smf(&smf_bytes(1, 96, &[conductor(), notes])).unwrap();

        assert_eq!(midi.header.format, SmfFormat::MultiTrack);
        assert_eq!(midi.header.track_count, 2);
        assert_eq!(midi.header.ticks_per_quarter, 96);
        assert_eq!(midi.status, DecodeStatus::Ok);
        assert_eq!(midi.title.as_deref(), Some("My Song"));

        assert_eq!(midi.tracks.len(), 2);
        assert_eq!(midi.tracks[0].index, 1);
        assert_eq!(midi.tracks[0].name, None);
        assert!(midi.tracks[0].notes.is_empty());

        let track = midi.track_by_name("1").unwrap();
        assert_eq!(track.index, 2);
        assert_eq!(track.notes.len(), 2);

        let on = &track.notes[0];
        assert_eq!(on.event_type, NoteEventType::NoteOn);
        assert_eq!((on.channel, on.pitch, on.velocity, on.tick), (0, 60, 100, 0));
        assert_eq!(on.bar, 1);
        assert_eq!(on.position, r(0, 1));
        assert_eq!(on.position.denominator(), 1);

        let off = &track.notes[1];
        assert_eq!(off.event_type, NoteEventType::NoteOff);
        assert_eq!(off.tick, 48);
        assert_eq!(off.bar, 1);
        assert_eq!(off.position, r(1, 8));
    }

    #[test]
    fn test_conductor_events() {
        init_logger();
        let conductor = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .tempo(0, 500_000)
            .tempo(384 + 192, 400_000)
            .time_signature(192, 3, 2)
            .build();
        let midi = parse_smf(&smf_bytes(1, 96, &[conductor])).unwrap();

        assert_eq!(midi.tempo_events.len(), 2);
        let first = &midi.tempo_events[0];
        assert!((first.bpm - 120.0).abs() < 1e-9);
        assert_eq!((first.bar, first.position), (1, r(0, 1)));
        let second = &midi.tempo_events[1];
        assert_eq!(second.microseconds_per_quarter, 400_000);
        assert!((second.bpm - 150.0).abs() < 1e-9);
        assert_eq!((second.bar, second.position), (2, r(1, 2)));

        assert_eq!(midi.time_signature_events.len(), 2);
        assert_eq!(midi.time_signature_events[0].beat, r(4, 4));
        assert_eq!(midi.time_signature_events[0].bar, 1);
        assert_eq!(midi.time_signature_events[1].tick, 768);
        assert_eq!(midi.time_signature_events[1].beat, r(3, 4));
        assert_eq!(midi.time_signature_events[1].bar, 3);
    }

    #[test]
    fn test_format_0_name_is_title() {
        init_logger();
        let track = TrackBuilder::new()
            .name(0, "Solo")
            .time_signature(0, 4, 2)
            .note_on(0, 0, 60, 100)
            .note_off(96, 0, 60)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        assert_eq!(midi.header.format, SmfFormat::SingleTrack);
        assert_eq!(midi.title.as_deref(), Some("Solo"));
        assert_eq!(midi.tracks[0].name, None);
        assert!(midi.track_by_name("Solo").is_none());
    }

    #[test]
    fn test_shift_jis_track_name() {
        init_logger();
        let track = TrackBuilder::new()
            .meta(0, 0x03, &[0x95, 0x88, 0x96, 0xCA])
            .build();
        let midi = parse_smf(&smf_bytes(1, 96, &[conductor(), track])).unwrap();
        assert_eq!(midi.track(2).unwrap().name.as_deref(), Some("譜面"));
    }

    #[test]
    fn test_unsupported_formats() {
        init_logger();
        let result = parse_smf(&smf_bytes(2, 96, &[conductor()]));
        assert!(matches!(result, Err(ScoreError::UnsupportedFormat(_))));

        // 25 fps, 40 ticks per frame
        let result = parse_smf(&smf_bytes(1, 0xE728, &[conductor()]));
        assert!(matches!(result, Err(ScoreError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_invalid_header() {
        init_logger();
        let mut data = smf_bytes(1, 96, &[conductor()]);
        data[0] = b'R';
        assert!(matches!(parse_smf(&data), Err(ScoreError::InvalidFile(_))));

        assert!(matches!(parse_smf(&[]), Err(ScoreError::InvalidFile(_))));
        assert!(matches!(
            parse_smf(b"MThd\x00\x00\x00\x06\x00"),
            Err(ScoreError::InvalidFile(_))
        ));
        assert!(matches!(
            parse_smf(&smf_bytes(1, 0, &[conductor()])),
            Err(ScoreError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_longer_header_is_skipped() {
        init_logger();
        let mut data = b"MThd".to_vec();
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x60, 0xAB, 0xCD]);
        data.extend_from_slice(&conductor());
        let midi = parse_smf(&data).unwrap();
        assert_eq!(midi.title.as_deref(), Some("My Song"));
    }

    #[test]
    fn test_invalid_track_chunks() {
        init_logger();
        // wrong tag
        let mut track = conductor();
        track[..4].copy_from_slice(b"XTrk");
        assert!(matches!(
            parse_smf(&smf_bytes(1, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));

        // header announces two tracks, only one present
        let mut data = smf_bytes(1, 96, &[conductor()]);
        data[11] = 2;
        assert!(matches!(parse_smf(&data), Err(ScoreError::InvalidFile(_))));

        // declared length past the end of the file
        let mut data = smf_bytes(1, 96, &[conductor()]);
        let len = data.len();
        data.truncate(len - 2);
        assert!(matches!(parse_smf(&data), Err(ScoreError::InvalidFile(_))));
    }

    #[test]
    fn test_missing_track_end() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .note_on(0, 0, 60, 100)
            .build_unterminated();
        assert_eq!(&track[..4], TRACK_TAG);
        assert!(matches!(
            parse_smf(&smf_bytes(0, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_truncated_event() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .raw(0, &[0x90, 60])
            .build_unterminated();
        assert!(matches!(
            parse_smf(&smf_bytes(0, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_running_status_is_rejected() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .note_on(0, 0, 60, 100)
            .raw(10, &[62, 100])
            .build();
        assert!(matches!(
            parse_smf(&smf_bytes(0, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_channel_messages_are_skipped() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .raw(0, &[0xC1, 0x05]) // program change
            .raw(0, &[0xB1, 0x07, 0x64]) // volume
            .raw(0, &[0xE1, 0x00, 0x40]) // pitch bend
            .raw(0, &[0xA1, 60, 0x20]) // key pressure
            .raw(0, &[0xD1, 0x20]) // channel pressure
            .raw(0, &[0xF0, 0x03, 0x43, 0x12, 0xF7]) // sysex
            .meta(0, 0x01, b"some text")
            .meta(0, 0x7F, &[0x00, 0x00, 0x41])
            .note_on(24, 1, 64, 90)
            .note_off(24, 1, 64)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        let notes = &midi.tracks[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].channel, notes[0].pitch, notes[0].tick), (1, 64, 24));
        assert_eq!(notes[1].tick, 48);
    }

    #[test]
    fn test_control_change_out_of_range_value_skips_a_byte() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .raw(0, &[0xB0, 0x07, 0x80, 0x00])
            .note_on(0, 0, 60, 100)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        assert_eq!(midi.tracks[0].notes.len(), 1);
        assert_eq!(midi.tracks[0].notes[0].pitch, 60);
    }

    #[test]
    fn test_control_change_before_a_long_delta() {
        init_logger();
        // the delta of 200 ticks starts with 0x81, which is not part of the control change
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .raw(0, &[0xB0, 0x07, 0x64])
            .note_on(200, 0, 60, 100)
            .note_off(184, 0, 60)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        let notes = &midi.tracks[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].pitch, notes[0].tick), (60, 200));
        assert_eq!(notes[1].tick, 384);
        assert_eq!(notes[1].bar, 2);
    }

    #[test]
    fn test_note_on_with_zero_velocity_is_note_off() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .note_on(0, 0, 60, 100)
            .note_on(96, 0, 60, 0)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        let notes = &midi.tracks[0].notes;
        assert_eq!(notes[0].event_type, NoteEventType::NoteOn);
        assert_eq!(notes[1].event_type, NoteEventType::NoteOff);
        assert_eq!(notes[1].position, r(1, 4));
    }

    #[test]
    fn test_no_time_signature() {
        init_logger();
        let track = TrackBuilder::new()
            .tempo(0, 500_000)
            .note_on(0, 0, 60, 100)
            .note_off(500, 0, 60)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        assert_eq!(midi.status, DecodeStatus::NoEmbeddedTimeSignature);
        assert!(midi.tracks[0].notes.iter().all(|n| n.bar == 0));
        assert!(midi.tracks[0].notes.iter().all(|n| n.position.is_zero()));
        assert_eq!(midi.tempo_events[0].bar, 0);
    }

    #[test]
    fn test_invalid_meta_payloads() {
        init_logger();
        let zero_tempo = TrackBuilder::new().tempo(0, 0).build();
        assert!(parse_smf(&smf_bytes(0, 96, &[zero_tempo])).is_err());

        let short_tempo = TrackBuilder::new().meta(0, 0x51, &[0x07, 0xA1]).build();
        assert!(parse_smf(&smf_bytes(0, 96, &[short_tempo])).is_err());

        let empty_bar = TrackBuilder::new().time_signature(0, 0, 2).build();
        assert!(parse_smf(&smf_bytes(0, 96, &[empty_bar])).is_err());

        let huge_denominator = TrackBuilder::new().time_signature(0, 4, 40).build();
        assert!(parse_smf(&smf_bytes(0, 96, &[huge_denominator])).is_err());
    }

    #[test]
    fn test_bars_shorter_than_a_tick_are_rejected() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 1, 30)
            .note_on(2000, 0, 60, 100)
            .note_off(10, 0, 60)
            .build();
        assert!(matches!(
            parse_smf(&smf_bytes(0, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));

        // 1/512 at 96 ppq is three quarters of a tick
        let track = TrackBuilder::new().time_signature(0, 1, 9).build();
        assert!(matches!(
            parse_smf(&smf_bytes(0, 96, &[track])),
            Err(ScoreError::InvalidFile(_))
        ));

        // 1/256 at 96 ppq is a tick and a half, still usable
        let track = TrackBuilder::new()
            .time_signature(0, 1, 8)
            .note_on(3, 0, 60, 100)
            .note_off(3, 0, 60)
            .build();
        let options = DecodeOptions {
            snap_amplitude: 0,
            ..DecodeOptions::default()
        };
        let midi = parse_smf_data(&smf_bytes(0, 96, &[track]), &options).unwrap();
        let notes = &midi.tracks[0].notes;
        assert_eq!((notes[0].bar, notes[0].position), (3, RationalTime::ZERO));
        assert_eq!((notes[1].bar, notes[1].position), (5, RationalTime::ZERO));
    }

    #[test]
    fn test_note_on_is_snapped() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .note_on(47, 0, 60, 100)
            .note_off(48, 0, 60)
            .build();
        let data = smf_bytes(0, 96, &[track]);

        let midi = parse_smf(&data).unwrap();
        let notes = &midi.tracks[0].notes;
        assert_eq!(notes[0].tick, 48);
        assert_eq!(notes[0].position, r(1, 8));
        // note-offs keep their raw tick
        assert_eq!(notes[1].tick, 95);
        assert_eq!(notes[1].position, r(95, 384));

        let options = DecodeOptions {
            snap_amplitude: 0,
            ..DecodeOptions::default()
        };
        let midi = parse_smf_data(&data, &options).unwrap();
        assert_eq!(midi.tracks[0].notes[0].tick, 47);
        assert_eq!(midi.tracks[0].notes[0].position, r(47, 384));
    }

    #[test]
    fn test_snapped_notes_stay_sorted() {
        init_logger();
        let track = TrackBuilder::new()
            .time_signature(0, 4, 2)
            .note_off(97, 0, 62)
            .note_on(0, 0, 60, 100)
            .build();
        let midi = parse_smf(&smf_bytes(0, 96, &[track])).unwrap();
        let notes = &midi.tracks[0].notes;
        // the note-on at 97 snaps back to the beat at 96, ahead of the note-off
        assert_eq!((notes[0].pitch, notes[0].tick), (60, 96));
        assert_eq!(notes[0].position, r(1, 4));
        assert_eq!((notes[1].pitch, notes[1].tick), (62, 97));
    }

    #[test]
    fn test_read_smf_file_errors() {
        init_logger();
        let options = DecodeOptions::default();
        assert!(matches!(
            read_smf_file("", &options),
            Err(ScoreError::InvalidArg(_))
        ));
        assert!(matches!(
            read_smf_file("does/not/exist.mid", &options),
            Err(ScoreError::CannotOpenFile(_))
        ));
    }
}
