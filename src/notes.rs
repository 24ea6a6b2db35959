//! Note names and pitch conversion.
//!
//! Scores name notes in scientific pitch notation ("C4", "F#3", "Bb2"),
//! with C4 = MIDI 60 and A4 = 440 Hz.

/// Convert MIDI note number (fractional) to Hz. A4 = MIDI 69 = 440 Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Convert Hz to MIDI note number (fractional).
pub fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Parse a note name into a MIDI note number.
///
/// Grammar: letter `A`–`G` (either case), any number of `#` or `b`
/// accidentals, then a signed octave. Returns `None` for anything else or
/// for notes outside MIDI 0..=127.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?;
    let pitch_class: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let octave_start = rest
        .find(|c: char| c == '-' || c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (accidentals, octave) = rest.split_at(octave_start);

    let mut shift = 0i32;
    for c in accidentals.chars() {
        match c {
            '#' | '♯' => shift += 1,
            'b' | '♭' => shift -= 1,
            _ => return None,
        }
    }

    let octave: i32 = octave.parse().ok()?;
    let midi = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(pitch_class + shift)?;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Frequency of a named note, if it parses.
pub fn note_name_to_hz(name: &str) -> Option<f64> {
    parse_note_name(name).map(|m| midi_to_hz(m as f64))
}
