use ndarray::{ArrayD, Zip};
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    Real,
    error::LptError,
    fft::{Norm, RealFftPlan},
    geometry::Wavevectors,
    util::real,
};

/// `-k_i k_j` on the half-spectrum grid, Nyquist components zeroed.
fn strain_kernel<T: Real>(kvec: &Wavevectors<T>, i: usize, j: usize) -> ArrayD<T> {
    kvec.grid(|idx| -kvec.masked_component(i, idx) * kvec.masked_component(j, idx))
}

/// Real-space `∂_i ∂_j` of the potential whose modes are `pot`.
pub fn strain<T: Real>(
    kvec: &Wavevectors<T>,
    i: usize,
    j: usize,
    pot: &ArrayD<Complex<T>>,
    plan: &RealFftPlan<T>,
) -> ArrayD<T> {
    let modes = Zip::from(pot)
        .and(&strain_kernel(kvec, i, j))
        .par_map_collect(|&p, &k| p * k);
    plan.irfftn(&modes, Norm::Backward)
}

/// Cotangent of `pot` in [`strain`] given the cotangent of the strain field.
pub fn strain_adjoint<T: Real>(
    kvec: &Wavevectors<T>,
    i: usize,
    j: usize,
    cot: &ArrayD<T>,
    plan: &RealFftPlan<T>,
) -> ArrayD<Complex<T>> {
    let mut ret = plan.irfftn_adjoint(cot, Norm::Backward);
    Zip::from(&mut ret)
        .and(&strain_kernel(kvec, i, j))
        .par_for_each(|v, &k| *v = *v * k);
    ret
}

/// Component pairs `(i, j)` with `i <= j`, in the order [`StrainSet`] stores
/// them.
fn component_pairs(dim: usize) -> Vec<(usize, usize)> {
    (0..dim)
        .flat_map(|i| (i..dim).map(move |j| (i, j)))
        .collect()
}

/// The independent components of the strain tensor of one potential.
pub struct StrainSet<T> {
    dim: usize,
    components: Vec<ArrayD<T>>,
}

impl<T: Real> StrainSet<T> {
    pub fn new(kvec: &Wavevectors<T>, pot: &ArrayD<Complex<T>>, plan: &RealFftPlan<T>) -> Self {
        let dim = kvec.dim();
        let components = component_pairs(dim)
            .into_par_iter()
            .map(|(i, j)| strain(kvec, i, j, pot, plan))
            .collect();
        Self { dim, components }
    }
    pub fn dim(&self) -> usize {
        self.dim
    }
    fn offset(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        i * self.dim - i * (i + 1) / 2 + j
    }

    /// `s_ij`, symmetric in its indices.
    pub fn get(&self, i: usize, j: usize) -> &ArrayD<T> {
        &self.components[self.offset(i, j)]
    }

    /// Sum over axis pairs `i < j` of `s_ii s_jj - s_ij^2`.
    pub fn self_source(&self) -> ArrayD<T> {
        let mut acc = ArrayD::zeros(self.get(0, 0).raw_dim());
        for i in 0..self.dim {
            for j in (i + 1)..self.dim {
                Zip::from(&mut acc)
                    .and(self.get(i, i))
                    .and(self.get(j, j))
                    .and(self.get(i, j))
                    .par_for_each(|acc, &sii, &sjj, &sij| *acc = *acc + (sii * sjj - sij * sij));
            }
        }
        acc
    }

    /// The symmetrised source of two strain sets. Equal to
    /// [`Self::self_source`] bit for bit when both sets are the same.
    pub fn cross_source(&self, other: &Self) -> ArrayD<T> {
        let mut acc = ArrayD::zeros(self.get(0, 0).raw_dim());
        for i in 0..self.dim {
            for j in (i + 1)..self.dim {
                let shear = Zip::from(self.get(i, j))
                    .and(other.get(i, j))
                    .par_map_collect(|&mij, &nij| mij * nij + nij * mij);
                Zip::from(&mut acc)
                    .and(self.get(i, i))
                    .and(self.get(j, j))
                    .and(other.get(i, i))
                    .and(other.get(j, j))
                    .and(&shear)
                    .par_for_each(|acc, &mii, &mjj, &nii, &njj, &shear| {
                        *acc = *acc + ((mii * njj + mjj * nii) - shear);
                    });
            }
        }
        let half = real::<T>(0.5);
        acc.mapv_inplace(|v| v * half);
        acc
    }

    /// Cotangent of the potential behind this set given the cotangent of
    /// [`Self::self_source`].
    pub fn source_adjoint(
        &self,
        kvec: &Wavevectors<T>,
        source_cot: &ArrayD<T>,
        plan: &RealFftPlan<T>,
    ) -> ArrayD<Complex<T>> {
        let two = real::<T>(2.0);
        let parts: Vec<_> = component_pairs(self.dim)
            .into_par_iter()
            .map(|(i, j)| {
                let cot = if i == j {
                    let mut others = ArrayD::zeros(source_cot.raw_dim());
                    for k in (0..self.dim).filter(|&k| k != i) {
                        others += self.get(k, k);
                    }
                    others * source_cot
                } else {
                    Zip::from(self.get(i, j))
                        .and(source_cot)
                        .par_map_collect(|&s, &c| -two * c * s)
                };
                strain_adjoint(kvec, i, j, &cot, plan)
            })
            .collect();
        // summed in pair order so the result does not depend on scheduling
        parts
            .into_iter()
            .fold(ArrayD::zeros(kvec.spectrum_shape()), |acc, part| acc + part)
    }
}

/// Second order LPT source of `pot_m`, or the symmetrised source of `pot_m`
/// and `pot_n`.
pub fn second_order_source<T: Real>(
    kvec: &Wavevectors<T>,
    pot_m: &ArrayD<Complex<T>>,
    pot_n: Option<&ArrayD<Complex<T>>>,
    plan: &RealFftPlan<T>,
) -> ArrayD<T> {
    let m = StrainSet::new(kvec, pot_m, plan);
    match pot_n {
        None => m.self_source(),
        Some(pot_n) => m.cross_source(&StrainSet::new(kvec, pot_n, plan)),
    }
}

/// Sign of the permutation `indices`, zero if any index repeats.
pub fn levi_civita(indices: &[usize]) -> i32 {
    let mut sign = 1;
    for hi in 0..indices.len() {
        for lo in 0..hi {
            sign *= match indices[hi].cmp(&indices[lo]) {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
            };
        }
    }
    sign
}

const PERMUTATIONS_3: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Third order source `Σ ε_ijk s_0i s_1j s_2k` of a three dimensional
/// potential.
pub fn third_order_source<T: Real>(
    kvec: &Wavevectors<T>,
    pot: &ArrayD<Complex<T>>,
    plan: &RealFftPlan<T>,
) -> Result<ArrayD<T>, LptError> {
    if kvec.dim() != 3 {
        return Err(LptError::configuration("dim", kvec.dim()));
    }
    let s = StrainSet::new(kvec, pot, plan);
    let mut acc = ArrayD::zeros(s.get(0, 0).raw_dim());
    for [i, j, k] in PERMUTATIONS_3 {
        let eps = real::<T>(levi_civita(&[i, j, k]) as f64);
        Zip::from(&mut acc)
            .and(s.get(0, i))
            .and(s.get(1, j))
            .and(s.get(2, k))
            .par_for_each(|acc, &a, &b, &c| *acc = *acc + eps * a * b * c);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use ndarray::{ArrayD, IxDyn};
    use random::Source;

    use super::{
        PERMUTATIONS_3, StrainSet, levi_civita, second_order_source, strain, third_order_source,
    };
    use crate::{
        error::LptError,
        fft::{Norm, RealFftPlan},
        geometry::Wavevectors,
    };

    fn max_abs(a: &ArrayD<f64>) -> f64 {
        a.iter().fold(0.0f64, |m, &v| m.max(v.abs()))
    }

    fn random_real(shape: &[usize], seed: u64) -> ArrayD<f64> {
        let mut rand = random::default(seed);
        ArrayD::from_shape_fn(IxDyn(shape), |_| rand.read_f64() - 0.5)
    }

    #[test]
    fn levi_civita_signs() {
        let even = [[0, 1, 2], [1, 2, 0], [2, 0, 1]];
        for p in PERMUTATIONS_3 {
            let expected = if even.contains(&p) { 1 } else { -1 };
            assert_eq!(levi_civita(&p), expected, "{:?}", p);
        }
        assert_eq!(levi_civita(&[0, 2, 1]), -1);
        assert_eq!(levi_civita(&[0, 0, 2]), 0);
        assert_eq!(levi_civita(&[1, 0]), -1);
        assert_eq!(levi_civita(&[3, 0, 1, 2]), -1);
    }

    #[test]
    fn cosine_hessian() {
        let shape = [8usize, 8, 8];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 1.0f64);
        let k = [2.0 * PI / 8.0, 4.0 * PI / 8.0, 2.0 * PI / 8.0];
        let phi = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            (k[0] * idx[0] as f64 + k[1] * idx[1] as f64 + k[2] * idx[2] as f64).cos()
        });
        let pot = plan.rfftn(&phi, Norm::Backward);
        for i in 0..3 {
            for j in 0..3 {
                let s = strain(&kvec, i, j, &pot, &plan);
                let expected = phi.mapv(|v| -k[i] * k[j] * v);
                assert!(max_abs(&(&s - &expected)) < 1e-12, "s_{}{}", i, j);
            }
        }
    }

    #[test]
    fn nyquist_components_vanish() {
        let shape = [8usize, 6];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 0.5f64);
        let phi = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            (PI * idx[0] as f64).cos() + (PI * idx[1] as f64).cos()
        });
        let pot = plan.rfftn(&phi, Norm::Backward);
        let set = StrainSet::new(&kvec, &pot, &plan);
        for (i, j) in [(0, 0), (0, 1), (1, 1)] {
            assert!(max_abs(set.get(i, j)) < 1e-12);
        }
    }

    #[test]
    fn cross_source_reproduces_self_source() {
        let shape = [6usize, 4, 8];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 2.0f64);
        let pot = plan.rfftn(&random_real(&shape, 5), Norm::Backward);
        let own = second_order_source(&kvec, &pot, None, &plan);
        let cross = second_order_source(&kvec, &pot, Some(&pot), &plan);
        assert_eq!(own, cross);
        assert!(max_abs(&own) > 0.0);

        let other = plan.rfftn(&random_real(&shape, 6), Norm::Backward);
        let mn = second_order_source(&kvec, &pot, Some(&other), &plan);
        let nm = second_order_source(&kvec, &other, Some(&pot), &plan);
        assert!(max_abs(&(&mn - &nm)) < 1e-12 * max_abs(&mn));
    }

    #[test]
    fn one_dimensional_source_is_zero() {
        let shape = [16usize];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 1.0f64);
        let pot = plan.rfftn(&random_real(&shape, 2), Norm::Backward);
        assert!(second_order_source(&kvec, &pot, None, &plan).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn source_adjoint_matches_finite_difference() {
        let shape = [4usize, 6, 4];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 1.0f64);
        let pot = plan.rfftn(&random_real(&shape, 11), Norm::Backward);
        let dir = plan.rfftn(&random_real(&shape, 12), Norm::Backward);
        let weight = random_real(&shape, 13);
        let loss = |p: &ArrayD<_>| (second_order_source(&kvec, p, None, &plan) * &weight).sum();

        let h = 1e-3;
        let fd = (loss(&(&pot + &dir.mapv(|d| d * h))) - loss(&(&pot - &dir.mapv(|d| d * h))))
            / (2.0 * h);
        let cot = StrainSet::new(&kvec, &pot, &plan).source_adjoint(&kvec, &weight, &plan);
        let ad: f64 = cot
            .iter()
            .zip(dir.iter())
            .map(|(c, d)| c.re * d.re + c.im * d.im)
            .sum();
        assert!((fd - ad).abs() < 1e-8 * fd.abs().max(1.0), "{} vs {}", fd, ad);
    }

    #[test]
    fn third_order_is_hessian_determinant() {
        let shape = [8usize, 8, 8];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 1.0f64);
        let k = [2.0 * PI / 8.0, 4.0 * PI / 8.0, 6.0 * PI / 8.0];
        let phi = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            (k[0] * idx[0] as f64).cos() + (k[1] * idx[1] as f64).cos() + (k[2] * idx[2] as f64).cos()
        });
        let pot = plan.rfftn(&phi, Norm::Backward);
        let m = third_order_source(&kvec, &pot, &plan).unwrap();
        let expected = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            (0..3)
                .map(|a| -k[a] * k[a] * (k[a] * idx[a] as f64).cos())
                .product::<f64>()
        });
        assert!(max_abs(&(&m - &expected)) < 1e-10);

        let plane = ArrayD::from_shape_fn(IxDyn(&shape), |idx| (k[1] * idx[1] as f64).sin());
        let m = third_order_source(&kvec, &plan.rfftn(&plane, Norm::Backward), &plan).unwrap();
        assert!(max_abs(&m) < 1e-12);

        let shape = [8usize, 8];
        let plan = RealFftPlan::new(&shape);
        let kvec = Wavevectors::new(&shape, 1.0f64);
        let pot = plan.rfftn(&random_real(&shape, 1), Norm::Backward);
        assert!(matches!(
            third_order_source(&kvec, &pot, &plan),
            Err(LptError::Configuration { param: "dim", .. })
        ));
    }
}
