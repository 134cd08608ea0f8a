//! End-to-end tests: synthetic dB spectra through the full pipeline.

use lazy_static::lazy_static;
use pitch_harmony::{
    MagnitudeSpectrum, NoteMapper, PitchAnalyzer, PitchClass, SpectralPeakExtractor,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

const SAMPLE_RATE: f32 = 44_100.0;
/// ~1.35 Hz bins, so bin-centred peaks sit within a few cents of their target
const FINE_FFT: usize = 32_768;

lazy_static! {
    static ref ANALYZER: PitchAnalyzer = PitchAnalyzer::new();
    static ref MAPPER: NoteMapper = NoteMapper::new();
}

/// Flat -100 dB spectrum with a three-bin peak nearest each `(frequency, dB)` pair.
fn spectrum_with_tones(tones: &[(f32, f32)]) -> MagnitudeSpectrum {
    let bin_width = SAMPLE_RATE / FINE_FFT as f32;
    let mut db = vec![-100.0; FINE_FFT / 2];
    for &(freq, level) in tones {
        let bin = (freq / bin_width).round() as usize;
        db[bin - 1] = level - 12.0;
        db[bin] = level;
        db[bin + 1] = level - 12.0;
    }
    MagnitudeSpectrum::new(db, SAMPLE_RATE, FINE_FFT).unwrap()
}

#[test]
fn every_reference_pitch_maps_to_itself() {
    let failures: Vec<String> = NoteMapper::reference_table()
        .par_iter()
        .filter_map(|pitch| match MAPPER.frequency_to_note(pitch.frequency) {
            Some(note)
                if note.name == pitch.name
                    && note.octave == pitch.octave
                    && note.cents_deviation == 0 =>
            {
                None
            }
            other => Some(format!(
                "{}{} -> {:?}",
                pitch.name,
                pitch.octave,
                other.map(|n| n.to_string())
            )),
        })
        .collect();
    assert!(failures.is_empty(), "{failures:?}");
}

#[test]
fn scale_fragment_spectrum_reads_as_c_major() {
    let spectrum = spectrum_with_tones(&[
        (261.63, -10.0), // C4
        (392.00, -20.0), // G4
        (329.63, -30.0), // E4
        (293.66, -40.0), // D4
        (349.23, -45.0), // F4
    ]);
    let result = ANALYZER.analyze(&spectrum);

    assert_eq!(result.frequencies.len(), 5);
    let names: Vec<PitchClass> = result.notes.iter().map(|n| n.name).collect();
    assert_eq!(
        names,
        vec![
            PitchClass::C,
            PitchClass::G,
            PitchClass::E,
            PitchClass::D,
            PitchClass::F
        ]
    );
    assert!(result.notes.iter().all(|n| n.octave == 4));
    assert!(result.notes.iter().all(|n| n.cents_deviation.abs() <= 5));

    let key = result.key.expect("a key");
    assert_eq!(key.name, "C Major");
    assert!(key.confidence > 0.5 && key.confidence <= 0.95);
    assert!(!result.is_instrument);
}

#[test]
fn fundamental_with_overtones_outranks_louder_isolated_peak() {
    let spectrum = spectrum_with_tones(&[
        (700.0, -20.0),
        (150.0, -22.0),
        (300.0, -30.0),
        (450.0, -30.0),
        (600.0, -30.0),
    ]);
    let result = ANALYZER.analyze(&spectrum);

    let top = &result.frequencies[0];
    assert!((top.frequency - 150.0).abs() < 1.0, "top was {}", top.frequency);
    assert!(top.is_fundamental);
    assert_eq!(top.harmonic_count, 3);
    assert!(result.is_instrument);
}

#[test]
fn extraction_is_repeatable() {
    let spectrum = spectrum_with_tones(&[(110.0, -25.0), (220.0, -30.0), (330.0, -35.0)]);
    let extractor = SpectralPeakExtractor::new();
    let first = extractor.extract_peaks(&spectrum);
    let second = extractor.extract_peaks(&spectrum);
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(ANALYZER.analyze(&spectrum), ANALYZER.analyze(&spectrum));
}
