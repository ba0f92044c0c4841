use std::f64::consts::PI;

use libm::{cos, sin, sqrt};
use log::debug;
use ndarray::{ArrayD, IxDyn, Zip};
use num_complex::Complex;
use random::Source;

use crate::{
    Real,
    conf::Configuration,
    fft::{Norm, RealFftPlan},
    util::real,
};

/// Standard normal deviates by the Box-Muller transform, two per pair of
/// uniform draws.
struct Normal<S> {
    source: S,
    spare: Option<f64>,
}

impl<S: Source> Normal<S> {
    fn new(source: S) -> Self {
        Self { source, spare: None }
    }
    fn next(&mut self) -> f64 {
        if let Some(x) = self.spare.take() {
            return x;
        }
        let phase = 2.0 * PI * self.source.read_f64();
        let u = (1.0 - self.source.read_f64()).max(f64::MIN_POSITIVE);
        let r = sqrt(-2.0 * u.ln());
        self.spare = Some(r * sin(phase));
        r * cos(phase)
    }
}

/// Fourier modes of a unit Gaussian white-noise field on the particle grid.
///
/// The real-space field is drawn from `seed` in row-major order and
/// transformed with orthonormal scaling, so every mode has unit variance.
/// `fix_amp` sets the modulus of every nonzero mode to one; `negate` flips
/// the sign of the whole field.
pub fn white_noise<T: Real>(
    seed: u64,
    conf: &Configuration<T>,
    fix_amp: bool,
    negate: bool,
) -> ArrayD<Complex<T>> {
    let shape = conf.ptcl_grid_shape();
    let mut normal = Normal::new(random::default(seed));
    // `from_shape_fn` visits indices in row-major order
    let field = ArrayD::from_shape_fn(IxDyn(shape), |_| real::<T>(normal.next()));
    debug!("drew {} normal deviates from seed {}", field.len(), seed);
    let mut modes = RealFftPlan::new(shape).rfftn(&field, Norm::Ortho);

    if fix_amp {
        Zip::from(&mut modes).par_for_each(|m| {
            let amp = m.norm();
            if amp != T::zero() {
                *m = *m / amp;
            }
        });
    }
    if negate {
        modes.mapv_inplace(|m| -m);
    }
    modes
}

#[cfg(test)]
mod tests {
    use super::white_noise;
    use crate::conf::Configuration;

    #[test]
    fn deterministic() {
        let conf = Configuration::new([8, 6, 4], 1.0f64);
        let a = white_noise(42, &conf, false, false);
        let b = white_noise(42, &conf, false, false);
        let c = white_noise(43, &conf, false, false);
        assert_eq!(a.shape(), &[8, 6, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fixed_amplitude_and_negation() {
        let conf = Configuration::new([8, 8], 0.5f64);
        let base = white_noise(7, &conf, false, false);
        let fixed = white_noise(7, &conf, true, false);
        for (b, f) in base.iter().zip(fixed.iter()) {
            if b.norm() != 0.0 {
                assert!((f.norm() - 1.0).abs() < 1e-12);
                assert!((f - b / b.norm()).norm() < 1e-12);
            }
        }
        let negated = white_noise(7, &conf, true, true);
        for (f, n) in fixed.iter().zip(negated.iter()) {
            assert_eq!(*n, -*f);
        }
    }

    #[test]
    fn unit_variance() {
        let conf = Configuration::new([32, 32, 32], 1.0f64);
        let modes = white_noise(1, &conf, false, false);
        let n = modes.len() as f64;
        let mean_power = modes.iter().map(|m| m.norm_sqr()).sum::<f64>() / n;
        assert!((mean_power - 1.0).abs() < 0.05, "mean power {}", mean_power);
    }

    #[test]
    fn single_precision() {
        let conf = Configuration::new([4, 4], 1.0f32);
        let modes = white_noise(3, &conf, true, false);
        assert!(modes.iter().all(|m| (m.norm() - 1.0).abs() < 1e-5 || m.norm() == 0.0));
    }
}
