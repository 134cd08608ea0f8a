//! Note Mapping
//!
//! Maps frequencies onto the nearest equal-temperament pitch (A4 = 440 Hz)
//! across octaves 0 through 8, reporting the deviation in cents.

use crate::config::AnalysisConfig;
use crate::note::{Note, PitchClass, PITCH_CLASSES, SEMITONES};
use crate::peaks::FrequencyCandidate;
use once_cell::sync::Lazy;

/// Number of octaves in the reference table.
pub const OCTAVES: usize = 9;

/// One entry of the reference table.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReferencePitch {
    /// Pitch class.
    pub name: PitchClass,
    /// Octave, 0..=8.
    pub octave: u8,
    /// Equal-temperament frequency in Hz.
    pub frequency: f32,
}

/// Reference pitches C0..=B8, ascending.
static REFERENCE_PITCHES: Lazy<Vec<ReferencePitch>> = Lazy::new(|| {
    let mut table = Vec::with_capacity(SEMITONES * OCTAVES);
    for octave in 0..OCTAVES {
        for (idx, &name) in PITCH_CLASSES.iter().enumerate() {
            // MIDI 69 is A4
            let midi = ((octave + 1) * SEMITONES + idx) as f32;
            table.push(ReferencePitch {
                name,
                octave: octave as u8,
                frequency: 440.0 * 2f32.powf((midi - 69.0) / 12.0),
            });
        }
    }
    table
});

/// Fraction of the reference frequency within which a pitch is considered
/// stable; lower notes are allowed more drift.
pub fn pitch_tolerance(frequency: f32) -> f32 {
    match frequency {
        f if f < 100.0 => 0.15,
        f if f < 200.0 => 0.10,
        f if f < 500.0 => 0.08,
        f if f < 1000.0 => 0.05,
        _ => 0.03,
    }
}

/// Converts frequencies and frequency candidates into [`Note`]s.
#[derive(Debug, Clone, Default)]
pub struct NoteMapper {
    config: AnalysisConfig,
}

impl NoteMapper {
    /// Create a mapper with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        NoteMapper { config }
    }

    /// The full reference table, C0 first.
    pub fn reference_table() -> &'static [ReferencePitch] {
        &REFERENCE_PITCHES
    }

    /// Equal-temperament frequency of `name` in `octave`, if the octave is in the table.
    pub fn reference_frequency(name: PitchClass, octave: u8) -> Option<f32> {
        REFERENCE_PITCHES
            .get(octave as usize * SEMITONES + name.index())
            .map(|p| p.frequency)
    }

    /// Nearest reference pitch by absolute distance in Hz.
    fn closest(frequency: f32) -> &'static ReferencePitch {
        let mut best = &REFERENCE_PITCHES[0];
        let mut best_diff = (best.frequency - frequency).abs();
        for pitch in REFERENCE_PITCHES.iter().skip(1) {
            let diff = (pitch.frequency - frequency).abs();
            if diff < best_diff {
                best = pitch;
                best_diff = diff;
            }
        }
        best
    }

    /// Identify the note at `frequency`.
    ///
    /// Returns `None` outside the configured note range or when the nearest
    /// reference pitch is more than `max_cents_deviation` away.
    pub fn frequency_to_note(&self, frequency: f32) -> Option<Note> {
        if !frequency.is_finite()
            || frequency < self.config.min_note_hz
            || frequency > self.config.max_note_hz
        {
            return None;
        }

        let reference = Self::closest(frequency);
        let cents = 1200.0 * (frequency / reference.frequency).log2();
        if cents.abs() > self.config.max_cents_deviation {
            return None;
        }
        let cents_deviation = cents.round() as i32;
        let confidence =
            (1.0 - cents_deviation.abs() as f32 / self.config.max_cents_deviation).clamp(0.0, 1.0);

        Some(Note {
            name: reference.name,
            octave: reference.octave,
            exact_frequency: reference.frequency,
            cents_deviation,
            confidence,
            tolerance_hz: reference.frequency * pitch_tolerance(reference.frequency),
            frequency,
            magnitude: 0.0,
            is_fundamental: false,
            is_harmonic: false,
        })
    }

    /// Map every sufficiently loud candidate to a note.
    ///
    /// When two candidates land on the same pitch and octave, the louder one
    /// wins. Order follows the first appearance of each pitch.
    pub fn detect_notes(&self, candidates: &[FrequencyCandidate]) -> Vec<Note> {
        let mut notes: Vec<Note> = Vec::new();

        for candidate in candidates {
            if candidate.magnitude <= self.config.min_note_magnitude {
                continue;
            }
            let Some(mut note) = self.frequency_to_note(candidate.frequency) else {
                continue;
            };
            note.magnitude = candidate.magnitude;
            note.is_fundamental = candidate.is_fundamental;
            note.is_harmonic = candidate.is_harmonic;

            match notes
                .iter_mut()
                .find(|n| n.name == note.name && n.octave == note.octave)
            {
                Some(existing) if existing.magnitude < note.magnitude => *existing = note,
                Some(_) => {}
                None => notes.push(note),
            }
        }

        log::debug!(
            "mapped {} of {} candidates to notes",
            notes.len(),
            candidates.len()
        );
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_nine_octaves() {
        let table = NoteMapper::reference_table();
        assert_eq!(table.len(), 108);
        assert_eq!(table[0].name, PitchClass::C);
        assert!((table[0].frequency - 16.3516).abs() < 1e-3);
        assert_eq!(NoteMapper::reference_frequency(PitchClass::A, 4), Some(440.0));
        assert_eq!(NoteMapper::reference_frequency(PitchClass::C, 9), None);
    }

    #[test]
    fn a440_is_a4() {
        let note = NoteMapper::new().frequency_to_note(440.0).unwrap();
        assert_eq!(note.name, PitchClass::A);
        assert_eq!(note.octave, 4);
        assert_eq!(note.cents_deviation, 0);
        assert_eq!(note.confidence, 1.0);
        assert_eq!(note.midi(), 69);
        assert_eq!(note.to_string(), "A4");
    }

    #[test]
    fn detuned_frequency_reports_cents() {
        // 20 cents sharp of A4
        let f = 440.0 * 2f32.powf(20.0 / 1200.0);
        let note = NoteMapper::new().frequency_to_note(f).unwrap();
        assert_eq!(note.name, PitchClass::A);
        assert_eq!(note.cents_deviation, 20);
        assert!((note.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn range_boundaries() {
        let mapper = NoteMapper::new();
        assert!(mapper.frequency_to_note(14.9).is_none());
        assert!(mapper.frequency_to_note(8000.1).is_none());
        assert!(mapper.frequency_to_note(f32::NAN).is_none());
        // 15 Hz is ~149 cents below C0
        assert!(mapper.frequency_to_note(15.0).is_none());
        // 8000 Hz is ~21 cents above B8
        let top = mapper.frequency_to_note(8000.0).unwrap();
        assert_eq!((top.name, top.octave), (PitchClass::B, 8));
    }

    #[test]
    fn adaptive_tolerance_bands() {
        assert_eq!(pitch_tolerance(82.41), 0.15);
        assert_eq!(pitch_tolerance(146.83), 0.10);
        assert_eq!(pitch_tolerance(440.0), 0.08);
        assert_eq!(pitch_tolerance(880.0), 0.05);
        assert_eq!(pitch_tolerance(1760.0), 0.03);
        let note = NoteMapper::new().frequency_to_note(440.0).unwrap();
        assert!((note.tolerance_hz - 35.2).abs() < 1e-4);
    }

    #[test]
    fn detect_notes_keeps_louder_duplicate_and_drops_quiet() {
        let candidates = vec![
            FrequencyCandidate::new(441.0, 80.0, 82),
            FrequencyCandidate::new(439.0, 120.0, 81),
            FrequencyCandidate::new(261.63, 20.0, 48),
            FrequencyCandidate::new(329.63, 60.0, 61),
        ];
        let notes = NoteMapper::new().detect_notes(&candidates);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].name, PitchClass::A);
        assert_eq!(notes[0].magnitude, 120.0);
        assert_eq!(notes[0].frequency, 439.0);
        assert_eq!(notes[1].name, PitchClass::E);
    }
}
