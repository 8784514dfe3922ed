//! Note names: converts "C4", "Eb3", "F#2" to MIDI numbers and frequencies.

/// Frequency used whenever a note name cannot be parsed.
pub const CONCERT_A_HZ: f64 = 440.0;

/// MIDI number of A4.
const CONCERT_A_MIDI: i32 = 69;

/// Parse a note name into a MIDI note number.
///
/// Format: `<letter><optional accidental><octave digit>`
/// - Letter: C, D, E, F, G, A, B
/// - Accidental: # (sharp) or b (flat)
/// - Octave: a single digit 0-9 (C4 = middle C = MIDI 60)
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();

    let base = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest: Vec<char> = chars.collect();
    let (accidental, octave) = match rest.as_slice() {
        ['#', d] => (1, *d),
        ['b', d] => (-1, *d),
        [d] => (0, *d),
        _ => return None,
    };
    let octave = octave.to_digit(10)? as i32;

    // C-1 = 0, so C0 = 12 and C4 = 60
    let midi = (octave + 1) * 12 + base + accidental;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Equal-tempered frequency of a MIDI note, tuned to A4 = 440 Hz.
pub fn midi_to_frequency(midi: u8) -> f64 {
    CONCERT_A_HZ * 2f64.powf((midi as i32 - CONCERT_A_MIDI) as f64 / 12.0)
}

/// Frequency of a note name, or 440 Hz when the name is malformed.
pub fn note_to_frequency(name: &str) -> f64 {
    parse_note_name(name)
        .map(midi_to_frequency)
        .unwrap_or(CONCERT_A_HZ)
}
