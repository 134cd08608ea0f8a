//! Analysis configuration
//!
//! Every empirically tuned threshold used by the analysis components lives in
//! [`AnalysisConfig`]. Components receive a copy at construction time so the
//! constants stay discoverable and testable instead of being scattered literals.

use thiserror::Error;

/// Errors returned when building an [`AnalysisConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A frequency range was empty or negative.
    #[error("invalid frequency range `{name}`: {min} Hz .. {max} Hz")]
    InvalidRange {
        /// Name of the offending range.
        name: &'static str,
        /// Lower bound in Hz.
        min: f32,
        /// Upper bound in Hz.
        max: f32,
    },

    /// A scalar parameter was outside its accepted domain.
    #[error("invalid parameter `{arg}`: {msg}")]
    InvalidParameter {
        /// The name of the invalid parameter.
        arg: &'static str,
        /// A description of the problem.
        msg: String,
    },
}

/// Tuned constants for peak extraction, harmonic scoring, note mapping,
/// key inference and chord matching.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisConfig {
    // Peak extraction
    /// Lowest frequency of the analysed band in Hz (default: 20.0)
    pub min_band_hz: f32,
    /// Highest frequency of the analysed band in Hz (default: 5000.0)
    pub max_band_hz: f32,
    /// Multiplier applied to the mean linear amplitude of the band (default: 10.0)
    pub noise_floor_factor: f32,
    /// Maximum number of candidates returned per spectrum (default: 12)
    pub max_peaks: usize,

    // Harmonic analysis
    /// Fundamentals below this frequency use the low tolerance (default: 200.0 Hz)
    pub low_fundamental_hz: f32,
    /// Relative ratio tolerance for low fundamentals (default: 0.03)
    pub low_harmonic_tolerance: f32,
    /// Relative ratio tolerance for everything else (default: 0.015)
    pub high_harmonic_tolerance: f32,
    /// Highest harmonic number searched above a fundamental (default: 10)
    pub max_harmonic: u32,
    /// Highest harmonic number searched when flagging a candidate as a harmonic (default: 5)
    pub max_reverse_harmonic: u32,
    /// Largest relative magnitude boost granted to a fundamental (default: 0.5)
    pub max_fundamental_boost: f32,

    // Note mapping
    /// Lowest frequency mapped to a note (default: 15.0 Hz)
    pub min_note_hz: f32,
    /// Highest frequency mapped to a note (default: 8000.0 Hz)
    pub max_note_hz: f32,
    /// Largest accepted deviation from the reference pitch (default: 50 cents)
    pub max_cents_deviation: f32,
    /// Candidates at or below this normalized magnitude are not mapped (default: 20.0)
    pub min_note_magnitude: f32,

    // Key detection
    /// Distinct pitch classes needed before a key is reported (default: 3)
    pub min_key_notes: usize,
    /// Per-degree weights for major scales, tonic first (default: 5/1/1/1/3/1/1)
    pub major_degree_weights: [f32; 7],
    /// Per-degree weights for minor scales, tonic first (default: 5/1/1.5/1/3/1/1)
    pub minor_degree_weights: [f32; 7],
    /// Fraction of a note's weight subtracted when it is outside the scale (default: 0.5)
    pub out_of_scale_penalty: f32,
    /// Upper bound on reported key confidence (default: 0.95)
    pub max_key_confidence: f32,

    // Chord detection
    /// Points per template interval present in the input (default: 10)
    pub chord_match_points: i32,
    /// Points lost per template interval absent from the input (default: 5)
    pub chord_missing_penalty: i32,
    /// Points lost per input interval absent from the template (default: 2)
    pub chord_extra_penalty: i32,
    /// Lowest score a chord candidate needs to be accepted (default: 15)
    pub min_chord_score: i32,
    /// Fewest template intervals that must be present (default: 2)
    pub min_chord_matches: usize,
    /// Confidence attached to the unidentified "Notes" result (default: 0.1)
    pub fallback_chord_confidence: f32,

    // Pipeline
    /// Harmonics a fundamental needs for the tick to count as an instrument (default: 2)
    pub instrument_min_harmonics: u32,
}

impl AnalysisConfig {
    /// Start customizing with a builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new()
    }

    /// Relative harmonic tolerance for a candidate fundamental.
    pub fn harmonic_tolerance(&self, fundamental_hz: f32) -> f32 {
        if fundamental_hz < self.low_fundamental_hz {
            self.low_harmonic_tolerance
        } else {
            self.high_harmonic_tolerance
        }
    }

    /// Check every field for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("band", self.min_band_hz, self.max_band_hz)?;
        check_range("note", self.min_note_hz, self.max_note_hz)?;
        check_positive("noise_floor_factor", self.noise_floor_factor)?;
        check_positive("low_harmonic_tolerance", self.low_harmonic_tolerance)?;
        check_positive("high_harmonic_tolerance", self.high_harmonic_tolerance)?;
        check_positive("max_cents_deviation", self.max_cents_deviation)?;

        if self.max_peaks == 0 {
            return Err(invalid("max_peaks", "must be >= 1"));
        }
        if self.max_harmonic < 2 {
            return Err(invalid("max_harmonic", "must be >= 2"));
        }
        if self.max_reverse_harmonic < 2 {
            return Err(invalid("max_reverse_harmonic", "must be >= 2"));
        }
        if !(0.0..=1.0).contains(&self.max_fundamental_boost) {
            return Err(invalid("max_fundamental_boost", "must be within 0.0..=1.0"));
        }
        if !(0.0..=1.0).contains(&self.max_key_confidence) {
            return Err(invalid("max_key_confidence", "must be within 0.0..=1.0"));
        }
        if !(0.0..=1.0).contains(&self.fallback_chord_confidence) {
            return Err(invalid("fallback_chord_confidence", "must be within 0.0..=1.0"));
        }
        if self.min_key_notes == 0 {
            return Err(invalid("min_key_notes", "must be >= 1"));
        }
        if self.chord_match_points <= 0 {
            return Err(invalid("chord_match_points", "must be > 0"));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_band_hz: 20.0,
            max_band_hz: 5000.0,
            noise_floor_factor: 10.0,
            max_peaks: 12,
            low_fundamental_hz: 200.0,
            low_harmonic_tolerance: 0.03,
            high_harmonic_tolerance: 0.015,
            max_harmonic: 10,
            max_reverse_harmonic: 5,
            max_fundamental_boost: 0.5,
            min_note_hz: 15.0,
            max_note_hz: 8000.0,
            max_cents_deviation: 50.0,
            min_note_magnitude: 20.0,
            min_key_notes: 3,
            major_degree_weights: [5.0, 1.0, 1.0, 1.0, 3.0, 1.0, 1.0],
            minor_degree_weights: [5.0, 1.0, 1.5, 1.0, 3.0, 1.0, 1.0],
            out_of_scale_penalty: 0.5,
            max_key_confidence: 0.95,
            chord_match_points: 10,
            chord_missing_penalty: 5,
            chord_extra_penalty: 2,
            min_chord_score: 15,
            min_chord_matches: 2,
            fallback_chord_confidence: 0.1,
            instrument_min_harmonics: 2,
        }
    }
}

fn invalid(arg: &'static str, msg: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        arg,
        msg: msg.to_string(),
    }
}

fn check_range(name: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min >= 0.0 && min < max {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange { name, min, max })
    }
}

fn check_positive(arg: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(arg, "must be a finite value > 0"))
    }
}

/// Builder for [`AnalysisConfig`].
///
/// Starts from [`AnalysisConfig::default`]; only the knobs callers commonly
/// retune have setters; everything else can be changed on the built struct.
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    /// Start with the default constants.
    pub fn new() -> Self {
        AnalysisConfigBuilder {
            config: AnalysisConfig::default(),
        }
    }

    /// Set the analysed band in Hz.
    pub fn band(mut self, min_hz: f32, max_hz: f32) -> Self {
        self.config.min_band_hz = min_hz;
        self.config.max_band_hz = max_hz;
        self
    }

    /// Set the noise floor multiplier.
    pub fn noise_floor_factor(mut self, factor: f32) -> Self {
        self.config.noise_floor_factor = factor;
        self
    }

    /// Set the maximum number of returned peaks.
    pub fn max_peaks(mut self, n: usize) -> Self {
        self.config.max_peaks = n;
        self
    }

    /// Set the low and high harmonic tolerances.
    pub fn harmonic_tolerances(mut self, low: f32, high: f32) -> Self {
        self.config.low_harmonic_tolerance = low;
        self.config.high_harmonic_tolerance = high;
        self
    }

    /// Set the frequency range mapped to notes.
    pub fn note_range(mut self, min_hz: f32, max_hz: f32) -> Self {
        self.config.min_note_hz = min_hz;
        self.config.max_note_hz = max_hz;
        self
    }

    /// Set the largest accepted cents deviation.
    pub fn max_cents_deviation(mut self, cents: f32) -> Self {
        self.config.max_cents_deviation = cents;
        self
    }

    /// Set the minimum normalized magnitude for note mapping.
    pub fn min_note_magnitude(mut self, magnitude: f32) -> Self {
        self.config.min_note_magnitude = magnitude;
        self
    }

    /// Set the number of distinct pitch classes key detection requires.
    pub fn min_key_notes(mut self, n: usize) -> Self {
        self.config.min_key_notes = n;
        self
    }

    /// Set the lowest accepted chord score.
    pub fn min_chord_score(mut self, score: i32) -> Self {
        self.config.min_chord_score = score;
        self
    }

    /// Finalize and validate the configuration.
    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for AnalysisConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
