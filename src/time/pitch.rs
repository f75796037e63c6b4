/// Note names used when printing pitches, sharps only.
pub const SHARP_NOTES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name of a MIDI note number, `60 -> "C4"`.
pub fn pitch_name(pitch: u8) -> String {
    let octave = i32::from(pitch / 12) - 1;
    format!("{}{octave}", SHARP_NOTES[usize::from(pitch % 12)])
}

/// Parse a pitch written as `"D#3"`, `"c4"` or a plain note number `"60"`.
pub fn parse_pitch_name(name: &str) -> Option<u8> {
    let name = name.trim();
    if let Ok(number) = name.parse::<u8>() {
        return (number <= 127).then_some(number);
    }

    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest = chars.as_str();
    let (spelling, octave) = match rest.strip_prefix('#') {
        Some(octave) => (format!("{letter}#"), octave),
        None => (letter.to_string(), rest),
    };

    // spellings outside the table, like B# or E#, are refused
    let class = SHARP_NOTES.iter().position(|n| *n == spelling)? as i32;
    let octave: i32 = octave.parse().ok()?;
    let pitch = (octave + 1) * 12 + class;
    u8::try_from(pitch).ok().filter(|p| *p <= 127)
}
