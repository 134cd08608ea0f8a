//! Magnitude spectra
//!
//! [`MagnitudeSpectrum`] is the per-tick input of the analysis pipeline: one dB
//! value per FFT bin together with the sample rate and FFT size that produced it.
//!
//! With the `spectrum` feature (default) [`SpectrumAnalyzer`] builds such a
//! spectrum from raw PCM frames using `rustfft`.

use thiserror::Error;

#[cfg(feature = "spectrum")]
use rustfft::{num_complex::Complex, Fft, FftPlanner};
#[cfg(feature = "spectrum")]
use std::{f32::consts::PI, sync::Arc};

/// Lowest dB value produced by [`SpectrumAnalyzer`]; silent bins are clamped here.
pub const MIN_DECIBELS: f32 = -160.0;

/// Errors returned when constructing spectra.
#[derive(Debug, Error, PartialEq)]
pub enum SpectrumError {
    /// Frame received was not of the expected size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The expected size of the audio frame.
        expected: usize,
        /// The actual size of the received audio frame.
        got: usize,
    },

    /// More bins were supplied than the FFT size can produce.
    #[error("fft size {fft_size} yields at most {max} bins, got {got}")]
    TooManyBins {
        /// FFT size the spectrum claims to come from.
        fft_size: usize,
        /// Largest valid bin count, `fft_size / 2 + 1`.
        max: usize,
        /// Number of bins supplied.
        got: usize,
    },

    /// A bin held NaN or positive infinity.
    #[error("bin {bin} is not a valid dB value: {value}")]
    InvalidDecibels {
        /// Index of the offending bin.
        bin: usize,
        /// The value found there.
        value: f32,
    },

    /// An error occurred during configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// One snapshot of per-bin magnitudes in dB.
///
/// Bin `i` represents `i * sample_rate / fft_size` Hz.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagnitudeSpectrum {
    decibels: Vec<f32>,
    sample_rate: f32,
    fft_size: usize,
}

impl MagnitudeSpectrum {
    /// Wrap dB values produced by an FFT of `fft_size` samples at `sample_rate` Hz.
    ///
    /// Every bin must be finite or `-inf` (silence).
    pub fn new(
        decibels: Vec<f32>,
        sample_rate: f32,
        fft_size: usize,
    ) -> Result<Self, SpectrumError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SpectrumError::Configuration(format!(
                "sample rate must be > 0, got {sample_rate}"
            )));
        }
        if fft_size == 0 {
            return Err(SpectrumError::Configuration("fft_size cannot be zero".into()));
        }
        let max = fft_size / 2 + 1;
        if decibels.len() > max {
            return Err(SpectrumError::TooManyBins {
                fft_size,
                max,
                got: decibels.len(),
            });
        }
        if let Some((bin, &value)) = decibels
            .iter()
            .enumerate()
            .find(|(_, v)| v.is_nan() || **v == f32::INFINITY)
        {
            return Err(SpectrumError::InvalidDecibels { bin, value });
        }
        Ok(MagnitudeSpectrum {
            decibels,
            sample_rate,
            fft_size,
        })
    }

    /// Per-bin magnitudes in dB.
    pub fn decibels(&self) -> &[f32] {
        &self.decibels
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// FFT size the bins were computed with.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.decibels.len()
    }

    /// True when no bins were supplied.
    pub fn is_empty(&self) -> bool {
        self.decibels.is_empty()
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    /// Centre frequency of a (possibly fractional) bin position.
    pub fn bin_frequency(&self, bin: f32) -> f32 {
        bin * self.bin_width()
    }
}

/// Builder for a [`SpectrumAnalyzer`].
#[cfg(feature = "spectrum")]
pub struct SpectrumAnalyzerBuilder {
    fft_size: usize,
    sample_rate: f32,
}

#[cfg(feature = "spectrum")]
impl SpectrumAnalyzerBuilder {
    /// Start with default parameters: fft_size = 8192, sample_rate = 44_100.
    pub fn new() -> Self {
        SpectrumAnalyzerBuilder {
            fft_size: 8192,
            sample_rate: 44_100.0,
        }
    }

    /// Set the FFT size, which is also the expected frame length.
    pub fn fft_size(mut self, size: usize) -> Self {
        self.fft_size = size;
        self
    }

    /// Set the sampling rate of the audio.
    pub fn sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Finalize and create the analyzer.
    pub fn build(self) -> Result<SpectrumAnalyzer, SpectrumError> {
        if self.fft_size < 2 {
            return Err(SpectrumError::Configuration("fft_size must be >= 2".into()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(SpectrumError::Configuration(format!(
                "sample rate must be > 0, got {}",
                self.sample_rate
            )));
        }

        // Prepare FFT plan once
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.fft_size);

        Ok(SpectrumAnalyzer {
            window: blackman_window(self.fft_size),
            fft_buffer: vec![Complex { re: 0.0, im: 0.0 }; self.fft_size],
            fft_size: self.fft_size,
            sample_rate: self.sample_rate,
            fft,
        })
    }
}

#[cfg(feature = "spectrum")]
impl Default for SpectrumAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns fixed-size PCM frames into dB magnitude spectra.
///
/// Frames are Blackman windowed, which keeps sidelobes well under the peak
/// extractor's noise floor. Magnitudes are scaled by `1 / fft_size` before
/// conversion, so a full-scale sine lands around -13.5 dB.
#[cfg(feature = "spectrum")]
pub struct SpectrumAnalyzer {
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    fft_size: usize,
    sample_rate: f32,
    fft: Arc<dyn Fft<f32>>,
}

#[cfg(feature = "spectrum")]
impl SpectrumAnalyzer {
    /// Start customizing with a builder.
    pub fn builder() -> SpectrumAnalyzerBuilder {
        SpectrumAnalyzerBuilder::new()
    }

    /// Expected frame length.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute the spectrum of one frame. Returns `fft_size / 2` bins.
    pub fn process(&mut self, frame: &[f32]) -> Result<MagnitudeSpectrum, SpectrumError> {
        if frame.len() != self.fft_size {
            return Err(SpectrumError::InvalidFrameSize {
                expected: self.fft_size,
                got: frame.len(),
            });
        }

        for ((slot, &sample), &w) in self.fft_buffer.iter_mut().zip(frame).zip(&self.window) {
            slot.re = sample * w;
            slot.im = 0.0;
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / self.fft_size as f32;
        let decibels = self.fft_buffer[..self.fft_size / 2]
            .iter()
            .map(|c| to_decibels(c.norm() * scale))
            .collect();

        MagnitudeSpectrum::new(decibels, self.sample_rate, self.fft_size)
    }
}

#[cfg(feature = "spectrum")]
fn to_decibels(magnitude: f32) -> f32 {
    if magnitude > 0.0 {
        (20.0 * magnitude.log10()).max(MIN_DECIBELS)
    } else {
        MIN_DECIBELS
    }
}

/// Blackman window of length `n`.
#[cfg(feature = "spectrum")]
fn blackman_window(n: usize) -> Vec<f32> {
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / denom;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        })
        .collect()
}
