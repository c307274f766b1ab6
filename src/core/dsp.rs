use ndarray::Array2;
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::config::HpssConfig;

struct FftCache {
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

static FFT_CACHE: Lazy<Mutex<HashMap<usize, Arc<FftCache>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn fft_cache(n_fft: usize) -> Arc<FftCache> {
    let build = || {
        let mut planner = FftPlanner::new();
        Arc::new(FftCache {
            fft_forward: planner.plan_fft_forward(n_fft),
            fft_inverse: planner.plan_fft_inverse(n_fft),
            hann_window: compute_hann(n_fft),
        })
    };

    match FFT_CACHE.lock() {
        Ok(mut cache) => cache.entry(n_fft).or_insert_with(build).clone(),
        // A poisoned cache only costs a re-plan.
        Err(_) => build(),
    }
}

/// Periodic Hann window.
fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = n_fft as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// Centered STFT of a mono signal.
/// Returns a `[n_fft / 2 + 1, 1 + len / hop]` complex spectrogram.
pub fn stft_centered(signal: &[f32], n_fft: usize, hop: usize) -> Array2<Complex32> {
    let t = signal.len();
    let pad = n_fft / 2;

    let mut padded = vec![0.0f32; pad + t + pad + n_fft % 2];
    padded[pad..pad + t].copy_from_slice(signal);

    let frames = 1 + t / hop;
    let f_bins = n_fft / 2 + 1;

    let cache = fft_cache(n_fft);
    let window = &cache.hann_window;

    let mut out = Array2::<Complex32>::zeros((f_bins, frames));
    let mut buf = vec![Complex32::zero(); n_fft];

    for fr in 0..frames {
        let start = fr * hop;
        let frame = &padded[start..start + n_fft];

        for i in 0..n_fft {
            buf[i] = Complex32::new(frame[i] * window[i], 0.0);
        }

        cache.fft_forward.process(&mut buf);

        for fi in 0..f_bins {
            out[[fi, fr]] = buf[fi];
        }
    }

    out
}

/// Inverse of [`stft_centered`]: windowed overlap-add normalized by the summed
/// squared window, trimmed to `target_length` samples.
pub fn istft_centered(
    spec: &Array2<Complex32>,
    n_fft: usize,
    hop: usize,
    target_length: usize,
) -> Vec<f32> {
    let (f_bins, frames) = spec.dim();

    let cache = fft_cache(n_fft);
    let window = &cache.hann_window;

    let pad = n_fft / 2;
    let padded_length = (target_length + 2 * pad).max((frames.max(1) - 1) * hop + n_fft);

    let mut out = vec![0.0f32; padded_length];
    let mut window_sum = vec![0.0f32; padded_length];
    let mut buf = vec![Complex32::zero(); n_fft];

    let scale = 1.0 / (n_fft as f32);

    for fr in 0..frames {
        buf.fill(Complex32::zero());

        for fi in 0..f_bins.min(n_fft) {
            buf[fi] = spec[[fi, fr]];
        }

        // Mirror the negative frequencies
        for fi in 1..f_bins {
            let neg_fi = n_fft - fi;
            if neg_fi >= f_bins {
                buf[neg_fi] = buf[fi].conj();
            }
        }

        buf[0].im = 0.0;
        if n_fft % 2 == 0 {
            buf[n_fft / 2].im = 0.0;
        }

        cache.fft_inverse.process(&mut buf);

        let start = fr * hop;
        for i in 0..n_fft {
            let pos = start + i;
            if pos < padded_length {
                let w = window[i];
                out[pos] += buf[i].re * w * scale;
                window_sum[pos] += w * w;
            }
        }
    }

    for (sample, &sum) in out.iter_mut().zip(&window_sum) {
        if sum > 1e-10 {
            *sample /= sum;
        }
    }

    let start = pad.min(out.len());
    let end = (pad + target_length).min(out.len());
    let mut trimmed = out[start..end].to_vec();
    trimmed.resize(target_length, 0.0);
    trimmed
}

/// Half-sample symmetric reflection (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m >= n {
        2 * n - 1 - m
    } else {
        m
    }
}

fn median_of(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *median
}

/// Median filter each frequency row along time.
pub fn median_filter_time(mag: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let (n_freq, n_time) = mag.dim();
    let half = (kernel / 2) as isize;

    let rows: Vec<Vec<f32>> = (0..n_freq)
        .into_par_iter()
        .map(|f| {
            let mut window = vec![0.0f32; kernel];
            (0..n_time)
                .map(|t| {
                    for (k, slot) in window.iter_mut().enumerate() {
                        let idx = reflect(t as isize + k as isize - half, n_time);
                        *slot = mag[[f, idx]];
                    }
                    median_of(&mut window)
                })
                .collect()
        })
        .collect();

    let mut out = Array2::<f32>::zeros((n_freq, n_time));
    for (f, row) in rows.into_iter().enumerate() {
        for (t, v) in row.into_iter().enumerate() {
            out[[f, t]] = v;
        }
    }
    out
}

/// Median filter each frame along frequency.
pub fn median_filter_freq(mag: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let (n_freq, n_time) = mag.dim();
    let half = (kernel / 2) as isize;

    let cols: Vec<Vec<f32>> = (0..n_time)
        .into_par_iter()
        .map(|t| {
            let mut window = vec![0.0f32; kernel];
            (0..n_freq)
                .map(|f| {
                    for (k, slot) in window.iter_mut().enumerate() {
                        let idx = reflect(f as isize + k as isize - half, n_freq);
                        *slot = mag[[idx, t]];
                    }
                    median_of(&mut window)
                })
                .collect()
        })
        .collect();

    let mut out = Array2::<f32>::zeros((n_freq, n_time));
    for (t, col) in cols.into_iter().enumerate() {
        for (f, v) in col.into_iter().enumerate() {
            out[[f, t]] = v;
        }
    }
    out
}

/// Soft masks `(H^p / (H^p + P^p), P^p / (H^p + P^p))`. Cells where both
/// references are (numerically) zero get a zero mask on both sides.
pub fn soft_masks(
    harmonic: &Array2<f32>,
    percussive: &Array2<f32>,
    power: f32,
) -> (Array2<f32>, Array2<f32>) {
    let mut mask_h = Array2::<f32>::zeros(harmonic.dim());
    let mut mask_p = Array2::<f32>::zeros(harmonic.dim());

    ndarray::Zip::from(&mut mask_h)
        .and(&mut mask_p)
        .and(harmonic)
        .and(percussive)
        .for_each(|mh, mp, &h, &p| {
            let z = h.max(p);
            if z < f32::MIN_POSITIVE {
                return;
            }
            let wh = (h / z).powf(power);
            let wp = (p / z).powf(power);
            let total = wh + wp;
            if total > 0.0 && total.is_finite() {
                *mh = wh / total;
                *mp = wp / total;
            }
        });

    (mask_h, mask_p)
}

/// Median-filtering harmonic/percussive decomposition of a mono signal.
/// Both outputs have the input's length.
pub fn hpss(signal: &[f32], cfg: &HpssConfig) -> (Vec<f32>, Vec<f32>) {
    if signal.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let spec = stft_centered(signal, cfg.n_fft, cfg.hop_length);
    let mag = spec.mapv(|c| c.norm());

    let (harmonic_ref, percussive_ref) = rayon::join(
        || median_filter_time(&mag, cfg.harmonic_kernel),
        || median_filter_freq(&mag, cfg.percussive_kernel),
    );
    let (mask_h, mask_p) = soft_masks(&harmonic_ref, &percussive_ref, cfg.power);

    let harmonic_spec = &spec * &mask_h.mapv(|m| Complex32::new(m, 0.0));
    let percussive_spec = &spec * &mask_p.mapv(|m| Complex32::new(m, 0.0));

    rayon::join(
        || istft_centered(&harmonic_spec, cfg.n_fft, cfg.hop_length, signal.len()),
        || istft_centered(&percussive_spec, cfg.n_fft, cfg.hop_length, signal.len()),
    )
}

/// Root-mean-square amplitude. Empty input gives 0.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}
