//! Spectral Peak Extraction
//!
//! Picks local maxima above an adaptive noise floor from one magnitude spectrum
//! and refines each to sub-bin precision with parabolic interpolation.

use crate::config::AnalysisConfig;
use crate::harmonics::HarmonicAnalyzer;
use crate::spectrum::MagnitudeSpectrum;

/// A frequency present in one spectrum snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyCandidate {
    /// Interpolated frequency in Hz.
    pub frequency: f32,
    /// Normalized magnitude (0..=255), boosted for fundamentals.
    pub magnitude: f32,
    /// FFT bin holding the local maximum.
    pub source_bin: usize,
    /// At least one other candidate sits on a harmonic of this one.
    pub is_fundamental: bool,
    /// This candidate sits on a harmonic of another one.
    pub is_harmonic: bool,
    /// Sum of `magnitude / harmonic_number` over matched harmonics.
    pub harmonic_score: f32,
    /// Number of matched harmonics.
    pub harmonic_count: u32,
}

impl FrequencyCandidate {
    /// A fresh, unclassified candidate.
    pub fn new(frequency: f32, magnitude: f32, source_bin: usize) -> Self {
        FrequencyCandidate {
            frequency,
            magnitude,
            source_bin,
            is_fundamental: false,
            is_harmonic: false,
            harmonic_score: 0.0,
            harmonic_count: 0,
        }
    }
}

/// Map a dB value onto 0..=255.
pub fn normalize_magnitude(db: f32) -> f32 {
    ((db + 100.0) * 2.55).clamp(0.0, 255.0)
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Vertex offset, in bins, of the parabola through three equally spaced points.
///
/// Returns 0.0 when the points are collinear or not finite.
pub fn parabolic_offset(left: f32, centre: f32, right: f32) -> f32 {
    let denom = left - 2.0 * centre + right;
    if !(left.is_finite() && centre.is_finite() && right.is_finite()) || denom == 0.0 {
        return 0.0;
    }
    let offset = (left - right) / (2.0 * denom);
    if offset.is_finite() {
        offset.clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Finds the strongest spectral peaks of a [`MagnitudeSpectrum`].
#[derive(Debug, Clone, Default)]
pub struct SpectralPeakExtractor {
    config: AnalysisConfig,
    harmonics: HarmonicAnalyzer,
}

impl SpectralPeakExtractor {
    /// Create an extractor with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        SpectralPeakExtractor {
            harmonics: HarmonicAnalyzer::with_config(config.clone()),
            config,
        }
    }

    /// Extract up to `max_peaks` candidates, strongest first.
    ///
    /// Candidates are classified by the [`HarmonicAnalyzer`] before the list
    /// is truncated, so fundamentals boosted by their harmonics can outrank
    /// louder isolated peaks. Silence yields an empty list.
    pub fn extract_peaks(&self, spectrum: &MagnitudeSpectrum) -> Vec<FrequencyCandidate> {
        let db = spectrum.decibels();
        if db.len() < 3 {
            return Vec::new();
        }

        let bin_width = spectrum.bin_width();
        let first = (self.config.min_band_hz / bin_width).ceil() as usize;
        let last = ((self.config.max_band_hz / bin_width).floor() as usize).min(db.len() - 1);
        if last < first + 2 {
            return Vec::new();
        }

        let band = &db[first..=last];
        let linear: Vec<f32> = band.iter().map(|&v| db_to_linear(v)).collect();
        let mean = linear.iter().sum::<f32>() / linear.len() as f32;
        let threshold = mean * self.config.noise_floor_factor;
        log::trace!(
            "peak scan over bins {first}..={last}, noise floor threshold {threshold:.6}"
        );

        let mut candidates = Vec::new();
        for (left, w) in linear.windows(3).enumerate() {
            let power = w[1];
            if power <= threshold || power <= w[0] || power <= w[2] {
                continue;
            }

            let i = left + 1;
            let offset = parabolic_offset(band[i - 1], band[i], band[i + 1]);
            let bin = first + i;
            let frequency = spectrum.bin_frequency(bin as f32 + offset);
            candidates.push(FrequencyCandidate::new(
                frequency,
                normalize_magnitude(band[i]),
                bin,
            ));
        }

        let mut candidates = self.harmonics.analyze_harmonics(candidates);
        candidates.truncate(self.config.max_peaks);

        log::debug!(
            "extracted {} spectral peaks ({} fundamentals)",
            candidates.len(),
            candidates.iter().filter(|c| c.is_fundamental).count()
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;
    const FFT_SIZE: usize = 8192;

    /// Flat -100 dB spectrum with symmetric three-bin peaks at the given bins.
    fn spectrum_with_peaks(peaks: &[(usize, f32)]) -> MagnitudeSpectrum {
        let mut db = vec![-100.0; FFT_SIZE / 2];
        for &(bin, level) in peaks {
            db[bin - 1] = level - 12.0;
            db[bin] = level;
            db[bin + 1] = level - 12.0;
        }
        MagnitudeSpectrum::new(db, SAMPLE_RATE, FFT_SIZE).unwrap()
    }

    #[test]
    fn silence_yields_nothing() {
        let extractor = SpectralPeakExtractor::new();
        let flat = MagnitudeSpectrum::new(vec![-100.0; FFT_SIZE / 2], SAMPLE_RATE, FFT_SIZE)
            .unwrap();
        assert!(extractor.extract_peaks(&flat).is_empty());

        let empty = MagnitudeSpectrum::new(vec![], SAMPLE_RATE, FFT_SIZE).unwrap();
        assert!(extractor.extract_peaks(&empty).is_empty());
    }

    #[test]
    fn symmetric_peak_lands_on_bin_centre() {
        let extractor = SpectralPeakExtractor::new();
        let peaks = extractor.extract_peaks(&spectrum_with_peaks(&[(100, -20.0)]));
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].source_bin, 100);
        assert!((peaks[0].frequency - 100.0 * SAMPLE_RATE / FFT_SIZE as f32).abs() < 1e-3);
        assert!((peaks[0].magnitude - 204.0).abs() < 1e-3);
    }

    #[test]
    fn asymmetric_peak_is_interpolated_towards_louder_neighbour() {
        let mut db = vec![-100.0; FFT_SIZE / 2];
        db[199] = -40.0;
        db[200] = -20.0;
        db[201] = -30.0;
        let spectrum = MagnitudeSpectrum::new(db, SAMPLE_RATE, FFT_SIZE).unwrap();

        let peaks = SpectralPeakExtractor::new().extract_peaks(&spectrum);
        // (-40 - -30) / (2 * (-40 + 40 - 30)) = 1/6
        let expected = (200.0 + 1.0 / 6.0) * SAMPLE_RATE / FFT_SIZE as f32;
        assert!((peaks[0].frequency - expected).abs() < 1e-2);
    }

    #[test]
    fn peaks_outside_band_are_ignored() {
        // bin 2 ~ 10.8 Hz, bin 1000 ~ 5383 Hz
        let spectrum = spectrum_with_peaks(&[(2, -20.0), (1000, -20.0), (300, -30.0)]);
        let peaks = SpectralPeakExtractor::new().extract_peaks(&spectrum);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].source_bin, 300);
    }

    #[test]
    fn nan_bin_cannot_reach_the_extractor() {
        let mut db = vec![-100.0; FFT_SIZE / 2];
        db[300] = f32::NAN;
        for bin in [500, 700, 900] {
            db[bin] = -90.0;
        }
        assert!(MagnitudeSpectrum::new(db.clone(), SAMPLE_RATE, FFT_SIZE).is_err());

        // as silence the same spectrum has nothing above the floor
        db[300] = f32::NEG_INFINITY;
        let spectrum = MagnitudeSpectrum::new(db, SAMPLE_RATE, FFT_SIZE).unwrap();
        let peaks = SpectralPeakExtractor::new().extract_peaks(&spectrum);
        assert!(peaks.is_empty(), "{peaks:?}");
    }

    #[test]
    fn local_maximum_under_noise_floor_is_rejected() {
        let mut db = vec![-100.0; FFT_SIZE / 2];
        db[199] = -32.0;
        db[200] = -20.0;
        db[201] = -32.0;
        // a local maximum, but far below 10x the mean amplitude
        db[500] = -90.0;
        let spectrum = MagnitudeSpectrum::new(db, SAMPLE_RATE, FFT_SIZE).unwrap();

        let bins: Vec<usize> = SpectralPeakExtractor::new()
            .extract_peaks(&spectrum)
            .iter()
            .map(|c| c.source_bin)
            .collect();
        assert_eq!(bins, vec![200]);
    }

    #[test]
    fn band_edge_bins_are_never_peaks() {
        // band is bins 4..=928 at 44.1 kHz / 8192
        let mut db = vec![-100.0; FFT_SIZE / 2];
        db[4] = -20.0;
        db[5] = -32.0;
        db[927] = -32.0;
        db[928] = -20.0;
        let spectrum = MagnitudeSpectrum::new(db, SAMPLE_RATE, FFT_SIZE).unwrap();
        assert!(SpectralPeakExtractor::new().extract_peaks(&spectrum).is_empty());
    }

    #[test]
    fn output_is_capped_and_sorted() {
        let peaks: Vec<(usize, f32)> = (0..20)
            .map(|i| (60 + i * 37, -20.0 - i as f32 * 0.5))
            .collect();
        let found = SpectralPeakExtractor::new().extract_peaks(&spectrum_with_peaks(&peaks));
        assert_eq!(found.len(), 12);
        assert!(found.windows(2).all(|w| w[0].magnitude >= w[1].magnitude));
    }

    #[test]
    fn repeated_extraction_is_identical() {
        let spectrum = spectrum_with_peaks(&[(41, -25.0), (82, -30.0), (123, -35.0)]);
        let extractor = SpectralPeakExtractor::new();
        assert_eq!(extractor.extract_peaks(&spectrum), extractor.extract_peaks(&spectrum));
    }

    #[test]
    fn parabolic_offset_guards_degenerate_input() {
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
        assert_eq!(parabolic_offset(f32::NEG_INFINITY, -20.0, -30.0), 0.0);
        assert_eq!(parabolic_offset(-30.0, -20.0, -30.0), 0.0);
    }
}
