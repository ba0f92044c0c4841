use ndarray::{ArrayD, IxDyn, Zip};
use num_complex::Complex;
use num_traits::Float;

use crate::{Real, util::real};

/// Angular frequencies of the half-spectrum grid, one vector per axis.
///
/// Every axis but the last follows `fftfreq` ordering; the last follows
/// `rfftfreq`.
#[derive(Debug, Clone)]
pub struct Wavevectors<T> {
    axes: Vec<Vec<T>>,
    nyquist: T,
}

impl<T: Real> Wavevectors<T> {
    pub fn new(grid_shape: &[usize], spacing: T) -> Self {
        let dim = grid_shape.len();
        let axes = grid_shape
            .iter()
            .enumerate()
            .map(|(axis, &n)| {
                let len = if axis + 1 == dim { n / 2 + 1 } else { n };
                (0..len)
                    .map(|j| {
                        let j = j as i64;
                        let j = if axis + 1 != dim && 2 * j >= n as i64 {
                            j - n as i64
                        } else {
                            j
                        };
                        // `2j / n` is exactly one at the Nyquist bin, so the
                        // result compares exactly against `nyquist`.
                        let f = real::<T>((2 * j) as f64) / real::<T>(n as f64);
                        f * T::PI() / spacing
                    })
                    .collect()
            })
            .collect();
        Self {
            axes,
            nyquist: T::PI() / spacing,
        }
    }
    pub fn dim(&self) -> usize {
        self.axes.len()
    }
    pub fn axis(&self, axis: usize) -> &[T] {
        &self.axes[axis]
    }
    pub fn nyquist(&self) -> T {
        self.nyquist
    }
    pub fn spectrum_shape(&self) -> Vec<usize> {
        self.axes.iter().map(Vec::len).collect()
    }
    pub fn component(&self, axis: usize, idx: &IxDyn) -> T {
        self.axes[axis][idx[axis]]
    }

    /// `k_axis` at `idx`, or zero where `|k_axis|` sits at the Nyquist
    /// frequency.
    pub fn masked_component(&self, axis: usize, idx: &IxDyn) -> T {
        let k = self.component(axis, idx);
        let eps = self.nyquist * T::epsilon();
        if Float::abs(Float::abs(k) - self.nyquist) <= eps {
            T::zero()
        } else {
            k
        }
    }
    pub fn norm2(&self, idx: &IxDyn) -> T {
        (0..self.dim())
            .map(|axis| {
                let k = self.component(axis, idx);
                k * k
            })
            .fold(T::zero(), |a, b| a + b)
    }

    /// `f` evaluated on every bin of the half-spectrum grid.
    pub fn grid<F: Fn(&IxDyn) -> T>(&self, f: F) -> ArrayD<T> {
        ArrayD::from_shape_fn(IxDyn(&self.spectrum_shape()), |idx| f(&idx))
    }
    pub fn norm2_grid(&self) -> ArrayD<T> {
        self.grid(|idx| self.norm2(idx))
    }
    pub fn masked_grid(&self, axis: usize) -> ArrayD<T> {
        self.grid(|idx| self.masked_component(axis, idx))
    }
    pub fn magnitude(&self) -> ArrayD<T> {
        self.grid(|idx| self.norm2(idx).sqrt())
    }
}

/// Solves `∇² pot = src` in Fourier space. The zero mode of the result is
/// zero.
pub fn poisson<T: Real>(kvec: &Wavevectors<T>, src: &ArrayD<Complex<T>>) -> ArrayD<Complex<T>> {
    Zip::from(src).and(&kvec.norm2_grid()).par_map_collect(|&s, &k2| {
        if k2 == T::zero() {
            Complex::new(T::zero(), T::zero())
        } else {
            -s / k2
        }
    })
}

/// `-i k_axis pot`, the Fourier modes of the negative gradient.
pub fn neg_grad<T: Real>(
    kvec: &Wavevectors<T>,
    axis: usize,
    pot: &ArrayD<Complex<T>>,
) -> ArrayD<Complex<T>> {
    Zip::from(pot)
        .and(&kvec.masked_grid(axis))
        .par_map_collect(|&p, &k| Complex::new(T::zero(), -k) * p)
}

/// Cotangent of `pot` in [`neg_grad`] given the cotangent of its output.
pub fn neg_grad_adjoint<T: Real>(
    kvec: &Wavevectors<T>,
    axis: usize,
    cot: &ArrayD<Complex<T>>,
) -> ArrayD<Complex<T>> {
    Zip::from(cot)
        .and(&kvec.masked_grid(axis))
        .par_map_collect(|&c, &k| Complex::new(T::zero(), k) * c)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use ndarray::{ArrayD, IxDyn};
    use num_complex::Complex64;

    use super::{Wavevectors, neg_grad, poisson};

    #[test]
    fn frequencies() {
        let kvec = Wavevectors::new(&[4, 5, 6], 0.5f64);
        let f = 2.0 * PI / (4.0 * 0.5);
        assert_eq!(kvec.spectrum_shape(), vec![4, 5, 4]);
        let expected = [0.0, f, -2.0 * f, -f];
        for (k, e) in kvec.axis(0).iter().zip(expected) {
            assert!((k - e).abs() < 1e-12);
        }
        let f = 2.0 * PI / (5.0 * 0.5);
        let expected = [0.0, f, 2.0 * f, -2.0 * f, -f];
        for (k, e) in kvec.axis(1).iter().zip(expected) {
            assert!((k - e).abs() < 1e-12);
        }
        assert_eq!(kvec.axis(2)[3], kvec.nyquist());
        assert_eq!(kvec.axis(0)[2], -kvec.nyquist());
    }

    #[test]
    fn rfft_axis_keeps_positive_nyquist() {
        let kvec = Wavevectors::new(&[4, 6], 1.0f64);
        let f = PI / 3.0;
        let expected = [0.0, f, 2.0 * f, PI];
        assert_eq!(kvec.axis(1).len(), 4);
        for (k, e) in kvec.axis(1).iter().zip(expected) {
            assert!((k - e).abs() < 1e-12, "{} vs {}", k, e);
        }
        assert!(kvec.axis(1).iter().all(|&k| k >= 0.0));
        let k2 = kvec.norm2_grid();
        assert_eq!(k2.shape(), &[4, 4]);
        assert_eq!(k2[[2, 3]], kvec.norm2(&IxDyn(&[2, 3])));
        assert_eq!(kvec.masked_grid(1)[[1, 3]], 0.0);
    }

    #[test]
    fn nyquist_mask() {
        let kvec = Wavevectors::new(&[4, 4], 1.0f32);
        assert_eq!(kvec.masked_component(0, &IxDyn(&[2, 0])), 0.0);
        assert_eq!(kvec.masked_component(1, &IxDyn(&[0, 2])), 0.0);
        assert!(kvec.masked_component(0, &IxDyn(&[1, 2])) > 0.0);
        assert!(kvec.masked_component(0, &IxDyn(&[3, 0])) < 0.0);
    }

    #[test]
    fn poisson_and_gradient() {
        let kvec = Wavevectors::new(&[4, 4], 1.0f64);
        let src = ArrayD::from_elem(IxDyn(&[4, 3]), Complex64::new(1.0, 2.0));
        let pot = poisson(&kvec, &src);
        assert_eq!(pot[[0, 0]], Complex64::new(0.0, 0.0));
        let k2 = kvec.norm2(&IxDyn(&[1, 1]));
        assert!((pot[[1, 1]] + src[[1, 1]] / k2).norm() < 1e-14);

        let grad = neg_grad(&kvec, 1, &pot);
        let k = kvec.axis(1)[1];
        assert!((grad[[1, 1]] - Complex64::new(0.0, -k) * pot[[1, 1]]).norm() < 1e-14);
        assert_eq!(grad[[1, 2]], Complex64::new(0.0, 0.0));
    }
}
