use ndarray::{Array1, ArrayD};

use crate::{
    Real,
    fft::{Norm, RealFftPlan, conjugate_multiplicity},
    geometry::Wavevectors,
    util::to_f64,
};

/// Binned power spectrum of a real field.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// Mean `|k|` of the modes in each bin, or the bin centre when empty.
    pub k: Array1<f64>,
    pub power: Array1<f64>,
    /// Number of full-spectrum modes in each bin.
    pub modes: Array1<u64>,
}

/// Estimates the power spectrum of `field` in `bins` linear `|k|` shells
/// between zero and the Nyquist frequency.
///
/// The zero mode is left out. Each half-spectrum mode counts with its
/// conjugate multiplicity. With `bins == 0` the spectrum is empty.
pub fn powspec<T: Real>(field: &ArrayD<T>, spacing: T, bins: usize) -> PowerSpectrum {
    if bins == 0 {
        return PowerSpectrum {
            k: Array1::zeros(0),
            power: Array1::zeros(0),
            modes: Array1::zeros(0),
        };
    }
    let shape = field.shape().to_vec();
    let plan = RealFftPlan::new(&shape);
    let kvec = Wavevectors::new(&shape, spacing);
    let modes = plan.rfftn(field, Norm::Backward);

    let dim = shape.len();
    let cell_vol = to_f64(spacing).powi(dim as i32);
    let box_vol = cell_vol * shape.iter().product::<usize>() as f64;
    let k_max = to_f64(kvec.nyquist());
    let last = dim - 1;
    let n_last = shape[last];

    let mut k_sum = vec![0.0; bins];
    let mut p_sum = vec![0.0; bins];
    let mut counts = vec![0u64; bins];
    for (idx, m) in modes.indexed_iter() {
        let k = to_f64(kvec.norm2(&idx)).sqrt();
        if k == 0.0 || k >= k_max {
            continue;
        }
        let bin = ((k / k_max * bins as f64) as usize).min(bins - 1);
        let w = conjugate_multiplicity(idx[last], n_last) as u64;
        let p = to_f64(m.norm_sqr()) * cell_vol * cell_vol / box_vol;
        k_sum[bin] += w as f64 * k;
        p_sum[bin] += w as f64 * p;
        counts[bin] += w;
    }

    let width = k_max / bins as f64;
    let k = Array1::from_shape_fn(bins, |b| {
        if counts[b] == 0 {
            (b as f64 + 0.5) * width
        } else {
            k_sum[b] / counts[b] as f64
        }
    });
    let power = Array1::from_shape_fn(bins, |b| {
        if counts[b] == 0 {
            0.0
        } else {
            p_sum[b] / counts[b] as f64
        }
    });
    PowerSpectrum {
        k,
        power,
        modes: Array1::from(counts),
    }
}
