//! Chord Detector
//!
//! Identifies chords from a set of sounding pitches by trying every pitch as a
//! candidate root and matching the resulting interval set against a table of
//! chord templates. Inversions are reported from the bass note.

use crate::config::AnalysisConfig;
use crate::note::{Note, PitchClass, SEMITONES};
use std::fmt::Display;
use thiserror::Error;

/// Number of chord qualities
const NUM_CHORD_KINDS: usize = 26;

/// Supported chord qualities in the same order as `CHORD_INTERVALS`
const CHORD_KINDS: [ChordKind; NUM_CHORD_KINDS] = [
    ChordKind::Major,
    ChordKind::Minor,
    ChordKind::Diminished,
    ChordKind::Augmented,
    ChordKind::SuspendedSecond,
    ChordKind::SuspendedFourth,
    ChordKind::MajorSixth,
    ChordKind::MinorSixth,
    ChordKind::DominantSeventh,
    ChordKind::MajorSeventh,
    ChordKind::MinorSeventh,
    ChordKind::MinorMajorSeventh,
    ChordKind::DiminishedSeventh,
    ChordKind::HalfDiminishedSeventh,
    ChordKind::AugmentedSeventh,
    ChordKind::SeventhSuspendedFourth,
    ChordKind::AddNinth,
    ChordKind::MinorAddNinth,
    ChordKind::SixNine,
    ChordKind::DominantNinth,
    ChordKind::MajorNinth,
    ChordKind::MinorNinth,
    ChordKind::DominantEleventh,
    ChordKind::MinorEleventh,
    ChordKind::DominantThirteenth,
    ChordKind::MajorThirteenth,
];

/// Intervals (in semitones above the root, root excluded) matching `CHORD_KINDS` order
const CHORD_INTERVALS: [&[usize]; NUM_CHORD_KINDS] = [
    &[4, 7],
    &[3, 7],
    &[3, 6],
    &[4, 8],
    &[2, 7],
    &[5, 7],
    &[4, 7, 9],
    &[3, 7, 9],
    &[4, 7, 10],
    &[4, 7, 11],
    &[3, 7, 10],
    &[3, 7, 11],
    &[3, 6, 9],
    &[3, 6, 10],
    &[4, 8, 10],
    &[5, 7, 10],
    &[2, 4, 7],
    &[2, 3, 7],
    &[2, 4, 7, 9],
    &[2, 4, 7, 10],
    &[2, 4, 7, 11],
    &[2, 3, 7, 10],
    &[2, 4, 5, 7, 10],
    &[2, 3, 5, 7, 10],
    &[2, 4, 7, 9, 10],
    &[2, 4, 7, 9, 11],
];

/// Supported chord qualities
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChordKind {
    /// Major triad (e.g., C-E-G)
    Major,
    /// Minor triad (e.g., C-Eb-G)
    Minor,
    /// Diminished triad (e.g., C-Eb-Gb)
    Diminished,
    /// Augmented triad (e.g., C-E-G#)
    Augmented,
    /// Suspended second (e.g., C-D-G)
    SuspendedSecond,
    /// Suspended fourth (e.g., C-F-G)
    SuspendedFourth,
    /// Major sixth (e.g., C-E-G-A)
    MajorSixth,
    /// Minor sixth (e.g., C-Eb-G-A)
    MinorSixth,
    /// Dominant seventh (e.g., C-E-G-Bb)
    DominantSeventh,
    /// Major seventh (e.g., C-E-G-B)
    MajorSeventh,
    /// Minor seventh (e.g., C-Eb-G-Bb)
    MinorSeventh,
    /// Minor-major seventh (e.g., C-Eb-G-B)
    MinorMajorSeventh,
    /// Diminished seventh (e.g., C-Eb-Gb-A)
    DiminishedSeventh,
    /// Half-diminished seventh (e.g., C-Eb-Gb-Bb)
    HalfDiminishedSeventh,
    /// Augmented seventh (e.g., C-E-G#-Bb)
    AugmentedSeventh,
    /// Dominant seventh with suspended fourth (e.g., C-F-G-Bb)
    SeventhSuspendedFourth,
    /// Major triad with added ninth (e.g., C-D-E-G)
    AddNinth,
    /// Minor triad with added ninth (e.g., C-D-Eb-G)
    MinorAddNinth,
    /// Major sixth with added ninth (e.g., C-D-E-G-A)
    SixNine,
    /// Dominant ninth (e.g., C-D-E-G-Bb)
    DominantNinth,
    /// Major ninth (e.g., C-D-E-G-B)
    MajorNinth,
    /// Minor ninth (e.g., C-D-Eb-G-Bb)
    MinorNinth,
    /// Dominant eleventh (e.g., C-D-E-F-G-Bb)
    DominantEleventh,
    /// Minor eleventh (e.g., C-D-Eb-F-G-Bb)
    MinorEleventh,
    /// Dominant thirteenth (e.g., C-D-E-G-A-Bb)
    DominantThirteenth,
    /// Major thirteenth (e.g., C-D-E-G-A-B)
    MajorThirteenth,
}

impl ChordKind {
    /// Suffix appended to the root in chord names.
    pub const fn symbol(self) -> &'static str {
        match self {
            ChordKind::Major => "maj",
            ChordKind::Minor => "m",
            ChordKind::Diminished => "dim",
            ChordKind::Augmented => "aug",
            ChordKind::SuspendedSecond => "sus2",
            ChordKind::SuspendedFourth => "sus4",
            ChordKind::MajorSixth => "6",
            ChordKind::MinorSixth => "m6",
            ChordKind::DominantSeventh => "7",
            ChordKind::MajorSeventh => "maj7",
            ChordKind::MinorSeventh => "m7",
            ChordKind::MinorMajorSeventh => "mMaj7",
            ChordKind::DiminishedSeventh => "dim7",
            ChordKind::HalfDiminishedSeventh => "m7b5",
            ChordKind::AugmentedSeventh => "aug7",
            ChordKind::SeventhSuspendedFourth => "7sus4",
            ChordKind::AddNinth => "add9",
            ChordKind::MinorAddNinth => "madd9",
            ChordKind::SixNine => "69",
            ChordKind::DominantNinth => "9",
            ChordKind::MajorNinth => "maj9",
            ChordKind::MinorNinth => "m9",
            ChordKind::DominantEleventh => "11",
            ChordKind::MinorEleventh => "m11",
            ChordKind::DominantThirteenth => "13",
            ChordKind::MajorThirteenth => "maj13",
        }
    }

    /// Template intervals above the root, ascending, root excluded.
    pub fn intervals(self) -> &'static [usize] {
        CHORD_INTERVALS[self as usize]
    }
}

impl Display for ChordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Errors when detecting chords
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordError {
    /// An invalid argument was provided to a detection function.
    #[error("invalid argument `{arg}`: {msg}")]
    InvalidArgument {
        /// The name of the invalid argument.
        arg: &'static str,
        /// A description of the invalid argument.
        msg: String,
    },
}

/// One input pitch, either as a MIDI number or as a name and octave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordNote {
    /// MIDI note number (C4 = 60).
    Midi(i32),
    /// Note name such as `"Eb"` with its octave.
    Named {
        /// Pitch name; sharps and flats are accepted.
        name: String,
        /// Octave number (C4 = middle C).
        octave: i32,
    },
}

impl ChordNote {
    /// Convenience constructor for [`ChordNote::Named`].
    pub fn named(name: impl Into<String>, octave: i32) -> Self {
        ChordNote::Named {
            name: name.into(),
            octave,
        }
    }

    /// MIDI-equivalent pitch, or `None` when the name is not a note.
    pub fn to_midi(&self) -> Option<i32> {
        match self {
            ChordNote::Midi(midi) => Some(*midi),
            ChordNote::Named { name, octave } => {
                // rebuild from the letter so "Cb4" stays B3 and "B#3" stays C4
                let letter = name.trim().get(..1)?;
                let letter_pc: PitchClass = letter.parse().ok()?;
                let pitch: PitchClass = name.parse().ok()?;
                let base = octave
                    .checked_add(1)?
                    .checked_mul(SEMITONES as i32)?
                    .checked_add(letter_pc.index() as i32)?;
                let shift = pitch.index() as i32 - letter_pc.index() as i32;
                let shift = match shift {
                    s if s > 6 => s - SEMITONES as i32,
                    s if s < -6 => s + SEMITONES as i32,
                    s => s,
                };
                base.checked_add(shift)
            }
        }
    }
}

impl From<i32> for ChordNote {
    fn from(midi: i32) -> Self {
        ChordNote::Midi(midi)
    }
}

impl From<u8> for ChordNote {
    fn from(midi: u8) -> Self {
        ChordNote::Midi(midi as i32)
    }
}

impl From<&Note> for ChordNote {
    fn from(note: &Note) -> Self {
        ChordNote::Midi(note.midi())
    }
}

/// A chord identified from a note set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChordResult {
    /// Display name: root, quality symbol and `/bass` for inversions,
    /// or `"Notes"` when nothing was identified.
    pub name: String,
    /// Root of the chord, `None` when unidentified.
    pub root: Option<PitchClass>,
    /// Quality of the chord, `None` when unidentified.
    pub quality: Option<ChordKind>,
    /// Pitch class of the lowest input note.
    pub bass: Option<PitchClass>,
    /// Distinct pitch classes present in the input, lowest first.
    pub notes: Vec<PitchClass>,
    /// 0 for root position, otherwise the bass note's chord-tone index.
    pub inversion: usize,
    /// Template fit, within 0.0..=1.0.
    pub confidence: f32,
    /// Raw template score.
    pub score: i32,
}

impl ChordResult {
    /// True unless this is the `"Notes"` fallback.
    pub fn is_identified(&self) -> bool {
        self.quality.is_some()
    }
}

/// A scored (root, quality) pairing
#[derive(Debug, Copy, Clone)]
struct Candidate {
    root: PitchClass,
    quality: ChordKind,
    score: i32,
    inversion: usize,
}

/// Main chord detector
#[derive(Debug, Clone, Default)]
pub struct ChordDetector {
    config: AnalysisConfig,
}

impl ChordDetector {
    /// Create a detector with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        ChordDetector { config }
    }

    /// Detect the single best chord.
    ///
    /// Never fails: with fewer than two distinct pitches, or when no template
    /// is accepted, the `"Notes"` fallback is returned.
    pub fn detect_chord<I, N>(&self, notes: I) -> ChordResult
    where
        I: IntoIterator<Item = N>,
        N: Into<ChordNote>,
    {
        let pitches = normalize(notes);
        let present = pitch_classes(&pitches);

        match self.candidates(&pitches).first() {
            Some(best) => {
                log::debug!("chord {}{} (score {})", best.root, best.quality, best.score);
                self.result(best, &pitches, present)
            }
            None => {
                log::debug!("no chord among {} pitches", pitches.len());
                ChordResult {
                    name: "Notes".to_string(),
                    root: None,
                    quality: None,
                    bass: pitches.first().map(|&p| PitchClass::from_midi(p)),
                    notes: present,
                    inversion: 0,
                    confidence: self.config.fallback_chord_confidence,
                    score: 0,
                }
            }
        }
    }

    /// Detect the top `k` accepted chords, best first.
    ///
    /// Returns:
    /// - `Err(InvalidArgument)` if `k == 0`.
    /// - fewer than `k` results (possibly none) when few templates are accepted.
    pub fn top_k<I, N>(&self, notes: I, k: usize) -> Result<Vec<ChordResult>, ChordError>
    where
        I: IntoIterator<Item = N>,
        N: Into<ChordNote>,
    {
        if k == 0 {
            return Err(ChordError::InvalidArgument {
                arg: "k",
                msg: "must be >= 1".to_string(),
            });
        }
        let pitches = normalize(notes);
        let present = pitch_classes(&pitches);
        Ok(self
            .candidates(&pitches)
            .iter()
            .take(k)
            .map(|c| self.result(c, &pitches, present.clone()))
            .collect())
    }

    /// Every accepted (root, quality) pairing, by score then inversion.
    fn candidates(&self, pitches: &[i32]) -> Vec<Candidate> {
        if pitches.len() < 2 {
            return Vec::new();
        }
        let bass = PitchClass::from_midi(pitches[0]);

        let mut tried = [false; SEMITONES];
        let mut found = Vec::new();
        for &root_pitch in pitches {
            let root = PitchClass::from_midi(root_pitch);
            if std::mem::replace(&mut tried[root.index()], true) {
                continue;
            }

            let mut intervals = [false; SEMITONES];
            for &p in pitches {
                intervals[PitchClass::from_midi(p).interval_above(root)] = true;
            }
            intervals[0] = false;

            for (&quality, &template) in CHORD_KINDS.iter().zip(CHORD_INTERVALS.iter()) {
                if let Some(c) = self.score(root, bass, quality, template, &intervals) {
                    found.push(c);
                }
            }
        }

        // stable: equal (score, inversion) keeps discovery order
        found.sort_by(|a, b| b.score.cmp(&a.score).then(a.inversion.cmp(&b.inversion)));
        found
    }

    /// Score one template against an interval set, `None` if not accepted.
    fn score(
        &self,
        root: PitchClass,
        bass: PitchClass,
        quality: ChordKind,
        template: &[usize],
        intervals: &[bool; SEMITONES],
    ) -> Option<Candidate> {
        let matched = template.iter().filter(|&&i| intervals[i]).count();
        let missing = template.len() - matched;
        let extra = intervals.iter().filter(|&&present| present).count() - matched;

        let score = matched as i32 * self.config.chord_match_points
            - missing as i32 * self.config.chord_missing_penalty
            - extra as i32 * self.config.chord_extra_penalty;
        if score < self.config.min_chord_score || matched < self.config.min_chord_matches {
            return None;
        }

        // matched tones include the root itself
        let mut inversion = 0;
        if matched + 1 >= 3 && bass != root {
            let bass_interval = bass.interval_above(root);
            inversion = template
                .iter()
                .position(|&i| i == bass_interval)
                .map_or(0, |pos| pos + 1);
        }

        Some(Candidate {
            root,
            quality,
            score,
            inversion,
        })
    }

    fn result(&self, c: &Candidate, pitches: &[i32], notes: Vec<PitchClass>) -> ChordResult {
        let bass = pitches.first().map(|&p| PitchClass::from_midi(p));
        let mut name = format!("{}{}", c.root, c.quality);
        if c.inversion > 0 {
            if let Some(bass) = bass {
                name.push('/');
                name.push_str(bass.name());
            }
        }
        let template_len = c.quality.intervals().len() + 1;
        let confidence =
            (c.score as f32 / (template_len as f32 * self.config.chord_match_points as f32))
                .clamp(0.0, 1.0);

        ChordResult {
            name,
            root: Some(c.root),
            quality: Some(c.quality),
            bass,
            notes,
            inversion: c.inversion,
            confidence,
            score: c.score,
        }
    }
}

/// Valid input pitches, deduplicated and ascending.
fn normalize<I, N>(notes: I) -> Vec<i32>
where
    I: IntoIterator<Item = N>,
    N: Into<ChordNote>,
{
    let mut pitches: Vec<i32> = notes
        .into_iter()
        .filter_map(|n| {
            let note: ChordNote = n.into();
            let midi = note.to_midi();
            if midi.is_none() {
                log::trace!("ignoring malformed chord note {note:?}");
            }
            midi
        })
        .collect();
    pitches.sort_unstable();
    pitches.dedup();
    pitches
}

/// Distinct pitch classes in ascending pitch order.
fn pitch_classes(pitches: &[i32]) -> Vec<PitchClass> {
    let mut out: Vec<PitchClass> = Vec::new();
    for &p in pitches {
        let pc = PitchClass::from_midi(p);
        if !out.contains(&pc) {
            out.push(pc);
        }
    }
    out
}
