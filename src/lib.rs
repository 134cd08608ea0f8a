//! # pitch_harmony
//!
//! Real-time musical analysis of magnitude spectra: pick spectral peaks,
//! separate fundamentals from harmonics, name the notes, infer the key and
//! identify chords.
//!
//! ## Example
//! ```rust
//! use pitch_harmony::{MagnitudeSpectrum, PitchAnalyzer};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Build the pipeline once
//!     let analyzer = PitchAnalyzer::new();
//!
//!     // 2) On every capture tick, wrap the dB spectrum from your FFT:
//!     let decibels = vec![-100.0; 4096];
//!     let spectrum = MagnitudeSpectrum::new(decibels, 44_100.0, 8192)?;
//!     let result = analyzer.analyze(&spectrum);
//!     for note in &result.notes {
//!         println!("{note} ({:+} cents)", note.cents_deviation);
//!     }
//!     if let Some(key) = &result.key {
//!         println!("key: {} ({:.2})", key.name, key.confidence);
//!     }
//!
//!     // 3) Chords on demand, from MIDI numbers or named notes
//!     let chord = analyzer.detect_chord([64, 67, 72]);
//!     assert_eq!(chord.name, "Cmaj/E");
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! ## Features
//! - `spectrum` (default): enables [`SpectrumAnalyzer`], a convenience FFT front-end via
//!   `rustfft`; the analysis itself only consumes [`MagnitudeSpectrum`]
//! - `serde`: derives `Serialize`/`Deserialize` for configuration and results

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Per-tick pipeline.
pub use analyzer::{AnalysisResult, PitchAnalyzer};

/// Chord identification.
pub use chord_detector::{ChordDetector, ChordError, ChordKind, ChordNote, ChordResult};

/// Tuned constants.
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ConfigError};

/// Harmonic classification.
pub use harmonics::HarmonicAnalyzer;

/// Key inference.
pub use key_detector::{KeyDetector, KeyResult, KeySignature, Mode, KEY_SIGNATURES};

/// Pitch classes and notes.
pub use note::{Note, ParsePitchClassError, PitchClass};

/// Frequency to note mapping.
pub use note_mapper::{NoteMapper, ReferencePitch};

/// Spectral peak picking.
pub use peaks::{FrequencyCandidate, SpectralPeakExtractor};

/// Spectrum input.
pub use spectrum::{MagnitudeSpectrum, SpectrumError};

/// PCM front-end.
#[cfg(feature = "spectrum")]
pub use spectrum::{SpectrumAnalyzer, SpectrumAnalyzerBuilder};

/// Analysis pipeline module.
pub mod analyzer;

/// Chord detection module.
pub mod chord_detector;

/// Configuration module.
pub mod config;

/// Harmonic analysis module.
pub mod harmonics;

/// Key detection module.
pub mod key_detector;

/// Pitch class and note module.
pub mod note;

/// Note mapping module.
pub mod note_mapper;

/// Spectral peak extraction module.
pub mod peaks;

/// Magnitude spectrum module.
pub mod spectrum;
