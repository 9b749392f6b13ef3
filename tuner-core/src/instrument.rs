//! # Instrument Catalog
//!
//! Built-in instruments and their tunings. A tuning is an ordered list of
//! note names in string/peg order; the session turns it into its target
//! sequence.

use tracing::warn;

use crate::error::TunerError;
use crate::sustain::Target;

/// One way of tuning an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub id: &'static str,
    pub name: &'static str,
    /// Note names from the lowest-numbered peg upwards.
    pub notes: &'static [&'static str],
}

impl Tuning {
    /// Converts the note names into targets of the standard note table.
    pub fn targets(&self) -> Vec<Target> {
        self.notes
            .iter()
            .filter_map(|name| match Target::from_note(name) {
                Ok(target) => Some(target),
                Err(e) => {
                    warn!("[CATALOG] Skipping note in tuning '{}': {}", self.id, e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub id: &'static str,
    pub name: &'static str,
    pub default_tuning: &'static str,
    pub tunings: &'static [Tuning],
}

impl Instrument {
    pub fn tuning(&self, id: &str) -> Result<&Tuning, TunerError> {
        self.tunings
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TunerError::UnknownTuning {
                instrument: self.id.to_string(),
                tuning: id.to_string(),
            })
    }

    pub fn default_tuning(&self) -> Result<&Tuning, TunerError> {
        self.tuning(self.default_tuning)
    }
}

pub static INSTRUMENTS: &[Instrument] = &[
    Instrument {
        id: "guitar",
        name: "Guitar",
        default_tuning: "standard",
        tunings: &[
            Tuning { id: "standard", name: "Standard (EADGBE)", notes: &["E2", "A2", "D3", "G3", "B3", "E4"] },
            Tuning { id: "drop_d", name: "Drop D (DADGBE)", notes: &["D2", "A2", "D3", "G3", "B3", "E4"] },
            Tuning {
                id: "half_step_down",
                name: "Half Step Down (Eb Ab Db Gb Bb Eb)",
                notes: &["D#2", "G#2", "C#3", "F#3", "A#3", "D#4"],
            },
            Tuning { id: "open_g", name: "Open G (DGDGBD)", notes: &["D2", "G2", "D3", "G3", "B3", "D4"] },
            Tuning { id: "dadgad", name: "DADGAD", notes: &["D2", "A2", "D3", "G3", "A3", "D4"] },
        ],
    },
    Instrument {
        id: "bass",
        name: "Bass",
        default_tuning: "standard",
        tunings: &[
            Tuning { id: "standard", name: "Standard (EADG)", notes: &["E1", "A1", "D2", "G2"] },
            Tuning { id: "drop_d", name: "Drop D (DADG)", notes: &["D1", "A1", "D2", "G2"] },
            Tuning { id: "five_string", name: "5-String (BEADG)", notes: &["B0", "E1", "A1", "D2", "G2"] },
        ],
    },
    Instrument {
        id: "ukulele",
        name: "Ukulele",
        default_tuning: "standard",
        tunings: &[
            Tuning { id: "standard", name: "Standard (GCEA)", notes: &["G4", "C4", "E4", "A4"] },
            Tuning { id: "baritone", name: "Baritone (DGBE)", notes: &["D3", "G3", "B3", "E4"] },
        ],
    },
    Instrument {
        id: "violin",
        name: "Violin",
        default_tuning: "standard",
        tunings: &[Tuning { id: "standard", name: "Standard (GDAE)", notes: &["G3", "D4", "A4", "E5"] }],
    },
    Instrument {
        id: "cello",
        name: "Cello",
        default_tuning: "standard",
        tunings: &[Tuning { id: "standard", name: "Standard (CGDA)", notes: &["C2", "G2", "D3", "A3"] }],
    },
];

/// Looks up a built-in instrument by id.
pub fn find_instrument(id: &str) -> Result<&'static Instrument, TunerError> {
    INSTRUMENTS
        .iter()
        .find(|i| i.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| TunerError::UnknownInstrument(id.to_string()))
}
