//! Harmonic Analysis
//!
//! Classifies spectral candidates as fundamentals or harmonics by looking for
//! integer frequency ratios between every pair, then boosts fundamentals by the
//! evidence their overtones provide.

use crate::config::AnalysisConfig;
use crate::peaks::FrequencyCandidate;

/// Scores harmonic relationships between frequency candidates.
#[derive(Debug, Clone, Default)]
pub struct HarmonicAnalyzer {
    config: AnalysisConfig,
}

impl HarmonicAnalyzer {
    /// Create an analyzer with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with a custom configuration.
    pub fn with_config(config: AnalysisConfig) -> Self {
        HarmonicAnalyzer { config }
    }

    /// Integer harmonic number `n` in `2..=max` for which `ratio` is within
    /// `tolerance * n` of `n`, if any.
    fn harmonic_number(ratio: f32, tolerance: f32, max: u32) -> Option<u32> {
        (2..=max).find(|&n| {
            let n_f = n as f32;
            (ratio - n_f).abs() <= tolerance * n_f
        })
    }

    /// Classify and re-rank `candidates`, strongest first.
    ///
    /// Relationships are evaluated on the magnitudes as supplied, so the
    /// result does not depend on input order. A candidate may end up both a
    /// fundamental and a harmonic.
    ///
    /// A fundamental's magnitude is scaled by `1 + min(score / 255, 1) * boost`,
    /// so the boost never exceeds `max_fundamental_boost` even when the
    /// harmonic score passes 255.
    pub fn analyze_harmonics(
        &self,
        candidates: Vec<FrequencyCandidate>,
    ) -> Vec<FrequencyCandidate> {
        let snapshot: Vec<(f32, f32)> = candidates
            .iter()
            .map(|c| (c.frequency, c.magnitude))
            .collect();

        let mut result: Vec<FrequencyCandidate> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, mut candidate)| {
                self.classify(i, &snapshot, &mut candidate);
                candidate
            })
            .collect();

        result.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        result
    }

    fn classify(&self, i: usize, snapshot: &[(f32, f32)], candidate: &mut FrequencyCandidate) {
        let (potential, _) = snapshot[i];
        if !potential.is_finite() || potential <= 0.0 {
            return;
        }
        let tolerance = self.config.harmonic_tolerance(potential);

        for (j, &(other, other_magnitude)) in snapshot.iter().enumerate() {
            if i == j || !other.is_finite() || other <= 0.0 {
                continue;
            }

            if let Some(n) =
                Self::harmonic_number(other / potential, tolerance, self.config.max_harmonic)
            {
                candidate.harmonic_count += 1;
                candidate.harmonic_score += other_magnitude / n as f32;
            }

            let reverse_tolerance = self.config.harmonic_tolerance(other);
            if Self::harmonic_number(
                potential / other,
                reverse_tolerance,
                self.config.max_reverse_harmonic,
            )
            .is_some()
            {
                candidate.is_harmonic = true;
            }
        }

        if candidate.harmonic_count >= 1 {
            candidate.is_fundamental = true;
            let evidence = (candidate.harmonic_score / 255.0).min(1.0);
            let boost = 1.0 + evidence * self.config.max_fundamental_boost;
            candidate.magnitude = (candidate.magnitude * boost).min(255.0);
            log::trace!(
                "{:.2} Hz is a fundamental with {} harmonics (score {:.1})",
                candidate.frequency,
                candidate.harmonic_count,
                candidate.harmonic_score
            );
        }
    }
}
