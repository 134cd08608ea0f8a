//! Key Detector
//!
//! Infers the musical key from a weighted set of pitch classes by scoring it
//! against a fixed table of key signatures. Scale degrees are weighted by
//! structural importance (tonic, then dominant) and out-of-scale notes are
//! penalized.

use crate::config::AnalysisConfig;
use crate::note::{Note, PitchClass, SEMITONES};
use std::fmt::Display;

/// Number of degrees in a diatonic scale.
pub const SCALE_DEGREES: usize = 7;

/// Major or (natural) minor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Major scale
    Major,
    /// Natural minor scale
    Minor,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A named key and its seven scale degrees, tonic first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeySignature {
    /// Conventional name, e.g. `"Bb Major"`.
    pub name: &'static str,
    /// Tonic pitch class.
    pub tonic: PitchClass,
    /// Major or minor.
    pub mode: Mode,
    /// Scale degrees, tonic first. Always displayed with sharps, so
    /// `"Bb Major"` lists `A#`.
    pub scale: [PitchClass; SCALE_DEGREES],
}

const MAJOR_STEPS: [usize; SCALE_DEGREES] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_STEPS: [usize; SCALE_DEGREES] = [0, 2, 3, 5, 7, 8, 10];

const fn signature(name: &'static str, tonic: PitchClass, mode: Mode) -> KeySignature {
    let steps = match mode {
        Mode::Major => MAJOR_STEPS,
        Mode::Minor => MINOR_STEPS,
    };
    let mut scale = [tonic; SCALE_DEGREES];
    let mut i = 0;
    while i < SCALE_DEGREES {
        scale[i] = tonic.transpose(steps[i]);
        i += 1;
    }
    KeySignature {
        name,
        tonic,
        mode,
        scale,
    }
}

/// Keys considered by the detector: twelve majors and five common minors.
pub static KEY_SIGNATURES: [KeySignature; 17] = [
    signature("C Major", PitchClass::C, Mode::Major),
    signature("G Major", PitchClass::G, Mode::Major),
    signature("D Major", PitchClass::D, Mode::Major),
    signature("A Major", PitchClass::A, Mode::Major),
    signature("E Major", PitchClass::E, Mode::Major),
    signature("B Major", PitchClass::B, Mode::Major),
    signature("F# Major", PitchClass::Fs, Mode::Major),
    signature("Db Major", PitchClass::Cs, Mode::Major),
    signature("Ab Major", PitchClass::Gs, Mode::Major),
    signature("Eb Major", PitchClass::Ds, Mode::Major),
    signature("Bb Major", PitchClass::As, Mode::Major),
    signature("F Major", PitchClass::F, Mode::Major),
    signature("A Minor", PitchClass::A, Mode::Minor),
    signature("E Minor", PitchClass::E, Mode::Minor),
    signature("B Minor", PitchClass::B, Mode::Minor),
    signature("D Minor", PitchClass::D, Mode::Minor),
    signature("G Minor", PitchClass::G, Mode::Minor),
];

/// The most likely key for a set of notes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyResult {
    /// Key name, e.g. `"G Major"`.
    pub name: String,
    /// Tonic pitch class.
    pub tonic: PitchClass,
    /// Major or minor.
    pub mode: Mode,
    /// Separation from the runner-up, 0.5..=0.95 by default.
    pub confidence: f32,
    /// The key's seven scale degrees, tonic first, spelled with sharps.
    pub notes: [PitchClass; SCALE_DEGREES],
}

/// Accumulated weight per pitch class.
#[derive(Debug, Clone, Default)]
struct Histogram {
    weights: [f32; SEMITONES],
    present: [bool; SEMITONES],
}

impl Histogram {
    fn add(&mut self, pitch: PitchClass, weight: f32) {
        if !weight.is_finite() {
            return;
        }
        self.weights[pitch.index()] += weight;
        self.present[pitch.index()] = true;
    }

    fn distinct(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }

    fn entries(&self) -> impl Iterator<Item = (PitchClass, f32)> + '_ {
        (0..SEMITONES)
            .filter(|&i| self.present[i])
            .map(|i| (PitchClass::from_index(i), self.weights[i]))
    }
}

/// Scores key signatures against weighted pitch classes.
#[derive(Debug, Clone, Default)]
pub struct KeyDetector {
    config: AnalysisConfig,
}

impl KeyDetector {
    /// Create a detector with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        KeyDetector { config }
    }

    fn score(&self, key: &KeySignature, histogram: &Histogram) -> f32 {
        let degree_weights = match key.mode {
            Mode::Major => &self.config.major_degree_weights,
            Mode::Minor => &self.config.minor_degree_weights,
        };
        histogram
            .entries()
            .map(|(pitch, weight)| {
                match key.scale.iter().position(|&p| p == pitch) {
                    Some(degree) => weight * degree_weights[degree],
                    None => -weight * self.config.out_of_scale_penalty,
                }
            })
            .sum()
    }

    /// Score every key signature, highest first.
    ///
    /// Returns an empty list when fewer than `min_key_notes` distinct pitch
    /// classes are supplied. Equal scores keep table order.
    pub fn rank<I>(&self, weighted: I) -> Vec<(&'static KeySignature, f32)>
    where
        I: IntoIterator<Item = (PitchClass, f32)>,
    {
        let mut histogram = Histogram::default();
        for (pitch, weight) in weighted {
            histogram.add(pitch, weight);
        }
        if histogram.distinct() < self.config.min_key_notes {
            return Vec::new();
        }

        let mut ranked: Vec<(&'static KeySignature, f32)> = KEY_SIGNATURES
            .iter()
            .map(|key| (key, self.score(key, &histogram)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Infer the key from `(pitch class, weight)` pairs.
    ///
    /// Returns `None` when there are too few distinct notes or no key scores
    /// above zero.
    pub fn analyze_musical_key<I>(&self, weighted: I) -> Option<KeyResult>
    where
        I: IntoIterator<Item = (PitchClass, f32)>,
    {
        let ranked = self.rank(weighted);
        let &(best, best_score) = ranked.first()?;
        if best_score <= 0.0 {
            return None;
        }

        let mut confidence: f32 = 0.5;
        if let Some(&(_, second)) = ranked.get(1) {
            confidence += 0.5 * ((best_score - second) / best_score);
        }
        let confidence = confidence.min(self.config.max_key_confidence);

        log::debug!(
            "key {} (score {best_score:.2}, confidence {confidence:.2})",
            best.name
        );
        Some(KeyResult {
            name: best.name.to_string(),
            tonic: best.tonic,
            mode: best.mode,
            confidence,
            notes: best.scale,
        })
    }

    /// Infer the key from detected notes, weighting each by its magnitude.
    pub fn analyze_notes(&self, notes: &[Note]) -> Option<KeyResult> {
        self.analyze_musical_key(notes.iter().map(|n| (n.name, n.magnitude)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PitchClass::*;

    #[test]
    fn signatures_are_diatonic() {
        let c = &KEY_SIGNATURES[0];
        assert_eq!(c.scale, [C, D, E, F, G, A, B]);
        let bb = KEY_SIGNATURES.iter().find(|k| k.name == "Bb Major").unwrap();
        assert_eq!(bb.scale, [As, C, D, Ds, F, G, A]);
        let am = KEY_SIGNATURES.iter().find(|k| k.name == "A Minor").unwrap();
        assert_eq!(am.scale, [A, B, C, D, E, F, G]);
        let gm = KEY_SIGNATURES.iter().find(|k| k.name == "G Minor").unwrap();
        assert_eq!(gm.scale, [G, A, As, C, D, Ds, F]);
    }

    #[test]
    fn flat_named_keys_spell_degrees_with_sharps() {
        let db = KEY_SIGNATURES.iter().find(|k| k.name == "Db Major").unwrap();
        let names: Vec<&str> = db.scale.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["C#", "D#", "F", "F#", "G#", "A#", "C"]);

        let key = KeyDetector::new()
            .analyze_musical_key([(Cs, 5.0), (Ds, 1.0), (F, 2.0), (Gs, 3.0), (As, 1.0)])
            .unwrap();
        assert_eq!(key.name, "Db Major");
        assert_eq!(key.notes, db.scale);
    }

    #[test]
    fn c_major_histogram() {
        let detector = KeyDetector::new();
        let key = detector
            .analyze_musical_key([(C, 5.0), (E, 3.0), (G, 4.0), (D, 2.0), (F, 1.0)])
            .unwrap();
        assert_eq!(key.name, "C Major");
        assert_eq!(key.mode, Mode::Major);
        assert_eq!(key.notes, [C, D, E, F, G, A, B]);
        // runner-up is G Major at 33.5 against 43
        assert!((key.confidence - (0.5 + 0.5 * 9.5 / 43.0)).abs() < 1e-5);
    }

    #[test]
    fn repeated_occurrences_accumulate() {
        let detector = KeyDetector::new();
        let key = detector
            .analyze_musical_key([(G, 2.0), (B, 1.0), (D, 1.0), (G, 3.0), (Fs, 1.0)])
            .unwrap();
        assert_eq!(key.name, "G Major");
    }

    #[test]
    fn minor_key_wins_with_minor_tonic() {
        let detector = KeyDetector::new();
        let key = detector
            .analyze_musical_key([(A, 6.0), (C, 3.0), (E, 4.0), (B, 1.0)])
            .unwrap();
        assert_eq!(key.name, "A Minor");
        assert_eq!(key.tonic, A);
    }

    #[test]
    fn too_few_distinct_notes() {
        let detector = KeyDetector::new();
        assert!(detector
            .analyze_musical_key([(C, 5.0), (G, 4.0), (C, 2.0)])
            .is_none());
        assert!(detector
            .analyze_musical_key(Vec::<(PitchClass, f32)>::new())
            .is_none());
    }

    #[test]
    fn no_positive_score_is_none() {
        let detector = KeyDetector::new();
        assert!(detector
            .analyze_musical_key([(C, 0.0), (E, 0.0), (G, 0.0)])
            .is_none());
    }

    #[test]
    fn confidence_is_capped() {
        let detector = KeyDetector::with_config(AnalysisConfig {
            max_key_confidence: 0.55,
            ..AnalysisConfig::default()
        });
        let key = detector
            .analyze_musical_key([(C, 5.0), (E, 3.0), (G, 4.0), (D, 2.0), (F, 1.0)])
            .unwrap();
        assert_eq!(key.confidence, 0.55);
    }

    #[test]
    fn ranking_lists_every_key() {
        let ranked = KeyDetector::new().rank([(C, 1.0), (E, 1.0), (G, 1.0)]);
        assert_eq!(ranked.len(), KEY_SIGNATURES.len());
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
