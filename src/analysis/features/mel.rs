//! Mel filterbank and DCT-II for cepstral coefficients

/// Number of triangular mel bands
pub const MEL_BANDS: usize = 26;

/// Number of cepstral coefficients kept
pub const MFCC_COUNT: usize = 13;

/// Floor added before the log to keep silent bands finite
const LOG_FLOOR: f32 = 1e-10;

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters spaced evenly on the mel scale from 0 Hz to Nyquist
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// (first bin, weights) per band
    filters: Vec<(usize, Vec<f32>)>,
    dct: Vec<[f32; MEL_BANDS]>,
}

impl MelFilterbank {
    /// Build filters for a spectrum of `fft_size / 2 + 1` power bins
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let n_bins = fft_size / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let max_mel = hz_to_mel(nyquist);

        // MEL_BANDS + 2 edge points, mapped to fractional FFT bins
        let edges: Vec<f32> = (0..MEL_BANDS + 2)
            .map(|i| {
                let hz = mel_to_hz(max_mel * i as f32 / (MEL_BANDS + 1) as f32);
                hz * fft_size as f32 / sample_rate as f32
            })
            .collect();

        let filters = (0..MEL_BANDS)
            .map(|band| {
                let (left, centre, right) = (edges[band], edges[band + 1], edges[band + 2]);
                let first = left.floor().max(0.0) as usize;
                let last = (right.ceil() as usize).min(n_bins - 1);
                let weights = (first..=last)
                    .map(|bin| {
                        let b = bin as f32;
                        if b <= left || b >= right {
                            0.0
                        } else if b <= centre {
                            (b - left) / (centre - left).max(f32::EPSILON)
                        } else {
                            (right - b) / (right - centre).max(f32::EPSILON)
                        }
                    })
                    .collect();
                (first, weights)
            })
            .collect();

        let dct = (0..MFCC_COUNT)
            .map(|k| {
                let mut row = [0.0f32; MEL_BANDS];
                for (m, w) in row.iter_mut().enumerate() {
                    *w = (std::f32::consts::PI * k as f32 * (m as f32 + 0.5) / MEL_BANDS as f32).cos();
                }
                row
            })
            .collect();

        Self { filters, dct }
    }

    /// Cepstral coefficients of a power spectrum
    pub fn mfcc(&self, power: &[f32]) -> [f32; MFCC_COUNT] {
        let mut log_energies = [0.0f32; MEL_BANDS];
        for (energy, (first, weights)) in log_energies.iter_mut().zip(&self.filters) {
            let sum: f32 = weights
                .iter()
                .zip(power.iter().skip(*first))
                .map(|(w, p)| w * p)
                .sum();
            *energy = (sum + LOG_FLOOR).ln();
        }

        let mut coeffs = [0.0f32; MFCC_COUNT];
        for (c, row) in coeffs.iter_mut().zip(&self.dct) {
            *c = row.iter().zip(&log_energies).map(|(w, e)| w * e).sum();
        }
        coeffs
    }
}
