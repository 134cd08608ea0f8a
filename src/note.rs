//! Pitch classes and detected notes

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Number of pitch classes in an octave.
pub const SEMITONES: usize = 12;

/// Twelve chromatic pitch classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PitchClass {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

/// All pitch classes, ascending from C.
pub const PITCH_CLASSES: [PitchClass; SEMITONES] = [
    PitchClass::C,
    PitchClass::Cs,
    PitchClass::D,
    PitchClass::Ds,
    PitchClass::E,
    PitchClass::F,
    PitchClass::Fs,
    PitchClass::G,
    PitchClass::Gs,
    PitchClass::A,
    PitchClass::As,
    PitchClass::B,
];

const SHARP_NAMES: [&str; SEMITONES] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl PitchClass {
    /// Pitch class for a semitone index; wraps modulo 12.
    pub const fn from_index(idx: usize) -> PitchClass {
        PITCH_CLASSES[idx % SEMITONES]
    }

    /// Pitch class of a MIDI note number.
    pub const fn from_midi(midi: i32) -> PitchClass {
        PITCH_CLASSES[midi.rem_euclid(SEMITONES as i32) as usize]
    }

    /// Semitone index, C = 0.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name spelled with sharps, e.g. `"F#"`.
    pub const fn name(self) -> &'static str {
        SHARP_NAMES[self as usize]
    }

    /// Pitch class `semitones` above this one.
    pub const fn transpose(self, semitones: usize) -> PitchClass {
        PitchClass::from_index(self as usize + semitones)
    }

    /// Interval in semitones from `root` up to this pitch class (0..12).
    pub const fn interval_above(self, root: PitchClass) -> usize {
        (self as usize + SEMITONES - root as usize) % SEMITONES
    }
}

impl Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a note name cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized note name: `{0}`")]
pub struct ParsePitchClassError(pub String);

impl FromStr for PitchClass {
    type Err = ParsePitchClassError;

    /// Accepts a letter with any number of `#`/`♯` or `b`/`♭` accidentals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(ParsePitchClassError(s.to_string())),
        };
        let mut offset = 0;
        for c in chars {
            match c {
                '#' | '♯' => offset += 1,
                'b' | '♭' => offset -= 1,
                _ => return Err(ParsePitchClassError(s.to_string())),
            }
        }
        Ok(PitchClass::from_midi(base + offset))
    }
}

/// A musical note identified from a frequency candidate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Pitch class of the nearest reference pitch.
    pub name: PitchClass,
    /// Octave of the nearest reference pitch (0..=8).
    pub octave: u8,
    /// Equal-temperament frequency of the reference pitch in Hz.
    pub exact_frequency: f32,
    /// Signed distance from the reference pitch, rounded to whole cents.
    pub cents_deviation: i32,
    /// `1 - |cents| / max_cents`, within 0.0..=1.0.
    pub confidence: f32,
    /// Frequency band, in Hz, within which this pitch is considered stable.
    pub tolerance_hz: f32,
    /// Measured frequency in Hz.
    pub frequency: f32,
    /// Normalized magnitude (0..=255) of the source candidate.
    pub magnitude: f32,
    /// Source candidate was classified as a fundamental.
    pub is_fundamental: bool,
    /// Source candidate was classified as a harmonic.
    pub is_harmonic: bool,
}

impl Note {
    /// MIDI note number of the reference pitch (C4 = 60).
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * SEMITONES as i32 + self.name.index() as i32
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sharps_and_flats() {
        assert_eq!("C#".parse(), Ok(PitchClass::Cs));
        assert_eq!("Db".parse(), Ok(PitchClass::Cs));
        assert_eq!("Cb".parse(), Ok(PitchClass::B));
        assert_eq!("e".parse(), Ok(PitchClass::E));
        assert_eq!("B♭".parse(), Ok(PitchClass::As));
        assert!("H".parse::<PitchClass>().is_err());
        assert!("C4".parse::<PitchClass>().is_err());
        assert!("".parse::<PitchClass>().is_err());
    }

    #[test]
    fn midi_wraps_negative_numbers() {
        assert_eq!(PitchClass::from_midi(60), PitchClass::C);
        assert_eq!(PitchClass::from_midi(-1), PitchClass::B);
        assert_eq!(PitchClass::from_midi(69), PitchClass::A);
    }

    #[test]
    fn intervals_wrap_around_octave() {
        assert_eq!(PitchClass::E.interval_above(PitchClass::C), 4);
        assert_eq!(PitchClass::C.interval_above(PitchClass::E), 8);
        assert_eq!(PitchClass::A.transpose(3), PitchClass::C);
    }
}
