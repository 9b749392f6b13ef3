//! # Musical Tuning Module
//!
//! This module maps frequencies to equal-tempered notes. It holds the note
//! frequency table, finds the nearest note to a detected frequency and
//! measures the deviation in cents.
//!
//! ## Features
//! - 88-key note table (A0 to C8) with A4 = 440 Hz
//! - Nearest-note matching with deterministic tie breaking
//! - Cent deviation calculations for tuning accuracy
//! - Note name lookups accepting sharp or flat spellings

use once_cell::sync::Lazy;
use serde::Serialize;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// The note closest to a measured frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteMatch {
    pub note: String,
    /// Reference frequency of `note` in Hz.
    pub target_frequency: f32,
    /// Positive = sharp, negative = flat.
    pub cents_deviation: f32,
}

/// Ordered, read-only mapping from note names to frequencies.
#[derive(Debug, Clone, Default)]
pub struct NoteTable {
    notes: Vec<Note>,
}

impl NoteTable {
    /// Builds a table from explicit notes. Order decides ties.
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// The 88 piano keys in equal temperament around `a4`.
    pub fn equal_tempered(a4: f32) -> Self {
        let notes = (0..88)
            .map(|i| {
                // A4 is the 49th key, index 48. f = f0 * 2^(n/12).
                let frequency = a4 * 2.0_f32.powf((i as f32 - 48.0) / 12.0);
                // The octave number changes at C, nine keys after A.
                let octave = (i + 9) / 12;
                let name = format!("{}{}", NOTE_NAMES[i % 12], octave);
                Note { name, frequency }
            })
            .collect();
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Finds the note closest in Hz to `frequency`.
    ///
    /// Linear scan; on equal distance the earlier entry wins.
    ///
    /// # Returns
    /// * `Some(match)` - Closest note and the deviation in cents
    /// * `None` - Non-positive or non-finite frequency, or empty table
    pub fn closest_note(&self, frequency: f32) -> Option<NoteMatch> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return None;
        }

        let mut closest: Option<&Note> = None;
        let mut min_diff = f32::INFINITY;
        for note in &self.notes {
            let diff = (note.frequency - frequency).abs();
            if diff < min_diff {
                min_diff = diff;
                closest = Some(note);
            }
        }

        closest.map(|note| NoteMatch {
            note: note.name.clone(),
            target_frequency: note.frequency,
            cents_deviation: calculate_cents_deviation(frequency, note.frequency),
        })
    }

    /// Looks up a note's frequency by name, e.g. "E2", "C#3" or "Bb2".
    pub fn frequency_of(&self, name: &str) -> Option<f32> {
        let name = normalize_note_name(name)?;
        self.notes
            .iter()
            .find(|note| note.name == name)
            .map(|note| note.frequency)
    }
}

/// The process-wide note table, computed once at first use.
pub static NOTES: Lazy<NoteTable> = Lazy::new(|| NoteTable::equal_tempered(A4_FREQUENCY));

/// Finds the closest note in the standard table.
pub fn closest_note(frequency: f32) -> Option<NoteMatch> {
    NOTES.closest_note(frequency)
}

/// Frequency of a named note in the standard table.
pub fn note_frequency(name: &str) -> Option<f32> {
    NOTES.frequency_of(name)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Rewrites a note name to the table's sharp spelling ("Bb4" -> "A#4").
fn normalize_note_name(name: &str) -> Option<String> {
    let mut chars = name.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest: String = chars.collect();

    let (accidental, octave) = match rest.chars().next() {
        Some('#') | Some('♯') => (1, &rest[rest.chars().next()?.len_utf8()..]),
        Some('b') | Some('♭') => (-1, &rest[rest.chars().next()?.len_utf8()..]),
        _ => (0, rest.as_str()),
    };
    let mut octave: i32 = octave.parse().ok()?;

    let base = NOTE_NAMES.iter().position(|n| n.len() == 1 && n.starts_with(letter))? as i32;
    let mut index = base + accidental;
    // Crossing between B and C moves the octave number.
    let c_index = 3;
    if accidental == -1 && base == c_index {
        octave -= 1;
    } else if accidental == 1 && base == c_index - 1 {
        octave += 1;
    }
    index = index.rem_euclid(12);

    Some(format!("{}{}", NOTE_NAMES[index as usize], octave))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_shape() {
        assert_eq!(NOTES.len(), 88);
        assert_eq!(NOTES.notes()[0].name, "A0");
        assert_eq!(NOTES.notes()[87].name, "C8");
        assert!((NOTES.notes()[0].frequency - 27.5).abs() < 1e-3);
    }

    #[test]
    fn test_a4_is_exact() {
        let m = closest_note(440.0).unwrap();
        assert_eq!(m.note, "A4");
        assert_eq!(m.target_frequency, 440.0);
        assert_eq!(m.cents_deviation, 0.0);
    }

    #[test]
    fn test_slightly_flat_a_sharp() {
        let m = closest_note(466.0).unwrap();
        assert_eq!(m.note, "A#4");
        assert!((m.target_frequency - 466.16).abs() < 0.01);
        assert!(m.cents_deviation < -0.5 && m.cents_deviation > -0.7, "{}", m.cents_deviation);
    }

    #[test]
    fn test_closest_note_is_pure() {
        assert_eq!(closest_note(123.4), closest_note(123.4));
    }

    #[test]
    fn test_invalid_frequencies() {
        assert_eq!(closest_note(0.0), None);
        assert_eq!(closest_note(-10.0), None);
        assert_eq!(closest_note(f32::NAN), None);
        assert_eq!(NoteTable::default().closest_note(440.0), None);
    }

    #[test]
    fn test_tie_goes_to_first_entry() {
        let table = NoteTable::new(vec![
            Note { name: "low".into(), frequency: 100.0 },
            Note { name: "high".into(), frequency: 200.0 },
        ]);
        assert_eq!(table.closest_note(150.0).unwrap().note, "low");
    }

    #[test]
    fn test_note_lookup() {
        assert!((note_frequency("E2").unwrap() - 82.41).abs() < 0.01);
        assert_eq!(note_frequency("Bb4"), note_frequency("A#4"));
        assert_eq!(note_frequency("Db3"), note_frequency("C#3"));
        assert_eq!(note_frequency("Cb4"), note_frequency("B3"));
        assert_eq!(note_frequency("B#3"), note_frequency("C4"));
        assert_eq!(note_frequency("H2"), None);
        assert_eq!(note_frequency("C9"), None);
    }

    #[test]
    fn test_cents() {
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(439.0, 440.0) < 0.0);
    }
}
