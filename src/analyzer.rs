//! Per-tick analysis pipeline
//!
//! spectrum -> peaks -> harmonics -> notes -> key, bundled into one
//! [`AnalysisResult`]. Chords are detected on demand from any note set.

use crate::chord_detector::{ChordDetector, ChordNote, ChordResult};
use crate::config::AnalysisConfig;
use crate::key_detector::{KeyDetector, KeyResult};
use crate::note::Note;
use crate::note_mapper::NoteMapper;
use crate::peaks::{FrequencyCandidate, SpectralPeakExtractor};
use crate::spectrum::MagnitudeSpectrum;

/// Everything extracted from one spectrum snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisResult {
    /// Spectral candidates, strongest first.
    pub frequencies: Vec<FrequencyCandidate>,
    /// Notes identified from the candidates.
    pub notes: Vec<Note>,
    /// Most likely key, if the notes support one.
    pub key: Option<KeyResult>,
    /// A harmonic-rich tone (rather than a bare sine or noise) is sounding.
    pub is_instrument: bool,
}

/// Runs the full pipeline with one shared configuration.
#[derive(Debug, Clone, Default)]
pub struct PitchAnalyzer {
    config: AnalysisConfig,
    peaks: SpectralPeakExtractor,
    notes: NoteMapper,
    keys: KeyDetector,
    chords: ChordDetector,
}

impl PitchAnalyzer {
    /// Create an analyzer with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        PitchAnalyzer {
            peaks: SpectralPeakExtractor::with_config(config.clone()),
            notes: NoteMapper::with_config(config.clone()),
            keys: KeyDetector::with_config(config.clone()),
            chords: ChordDetector::with_config(config.clone()),
            config,
        }
    }

    /// The configuration shared by every stage.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one spectrum snapshot.
    pub fn analyze(&self, spectrum: &MagnitudeSpectrum) -> AnalysisResult {
        let frequencies = self.peaks.extract_peaks(spectrum);
        let notes = self.notes.detect_notes(&frequencies);
        let key = self.keys.analyze_notes(&notes);
        let is_instrument = frequencies.iter().any(|c| {
            c.is_fundamental && c.harmonic_count >= self.config.instrument_min_harmonics
        });

        log::debug!(
            "tick: {} peaks, {} notes, key {:?}, instrument {}",
            frequencies.len(),
            notes.len(),
            key.as_ref().map(|k| k.name.as_str()),
            is_instrument
        );
        AnalysisResult {
            frequencies,
            notes,
            key,
            is_instrument,
        }
    }

    /// Identify the chord formed by `notes`.
    pub fn detect_chord<I, N>(&self, notes: I) -> ChordResult
    where
        I: IntoIterator<Item = N>,
        N: Into<ChordNote>,
    {
        self.chords.detect_chord(notes)
    }
}
