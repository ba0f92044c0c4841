use log::{debug, info};
use ndarray::{Array2, ArrayD, ArrayView1, Axis, Zip};
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    Real,
    conf::Configuration,
    cosmology::{CosmologyProvider, Deriv, GrowthOrder},
    error::LptError,
    fft::{Norm, RealFftPlan},
    geometry::{Wavevectors, neg_grad, poisson},
    particles::{ParticleDelta, ParticleSet},
    sqrt::{StableSqrt, Vjp},
    strain::StrainSet,
};

/// Auxiliary observables produced alongside the particles.
///
/// Reserved: [`lpt`] always returns `None` for it.
// TODO: fill with lightcone crossings once interpolation between the LPT
// particles and the N-body steps exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Observables<T> {
    pub snapshots: Vec<(T, ParticleSet<T>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LptOutput<T> {
    pub particles: ParticleSet<T>,
    pub observables: Option<Observables<T>>,
}

/// Scales white-noise `modes` to linear modes with power spectrum
/// `cosmo.linear_power(|k|, a)`.
pub fn linear_modes<T: Real, C: CosmologyProvider<T>>(
    kvec: &Wavevectors<T>,
    a: Option<T>,
    modes: &ArrayD<Complex<T>>,
    cosmo: &C,
) -> ArrayD<Complex<T>> {
    let scale = linear_scale(kvec, a, cosmo);
    Zip::from(modes)
        .and(&scale.sqrt)
        .par_map_collect(|&m, &s| m * s)
}

/// `P(|k|)` on the half-spectrum grid and `sqrt(P * box_vol)`.
pub(crate) struct LinearScale<T> {
    pub power: ArrayD<T>,
    pub sqrt: ArrayD<T>,
}

pub(crate) fn linear_scale<T: Real, C: CosmologyProvider<T>>(
    kvec: &Wavevectors<T>,
    a: Option<T>,
    cosmo: &C,
) -> LinearScale<T> {
    let k = kvec.magnitude();
    let power = cosmo.linear_power(k.view(), a);
    let box_vol = cosmo.conf().box_vol();
    let sqrt = StableSqrt.forward(&power.mapv(|p| p * box_vol));
    LinearScale { power, sqrt }
}

/// Displacement and velocity weights of one order at `a_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GrowthWeights<T> {
    pub order: GrowthOrder,
    pub disp: T,
    pub vel: T,
}

pub(crate) fn validate<T: Real>(
    conf: &Configuration<T>,
    modes: &ArrayD<Complex<T>>,
) -> Result<(), LptError> {
    conf.validate()?;
    let expected = conf.spectrum_shape();
    if modes.shape() != expected.as_slice() {
        return Err(LptError::ModeShape {
            expected,
            found: modes.shape().to_vec(),
        });
    }
    Ok(())
}

/// The stages of the LPT forward pass over one configuration.
pub(crate) struct Pipeline<'a, T, C> {
    pub cosmo: &'a C,
    pub kvec: Wavevectors<T>,
    pub plan: RealFftPlan<T>,
}

impl<'a, T: Real, C: CosmologyProvider<T>> Pipeline<'a, T, C> {
    pub fn new(cosmo: &'a C) -> Self {
        let conf = cosmo.conf();
        Self {
            cosmo,
            kvec: Wavevectors::new(conf.ptcl_grid_shape(), conf.ptcl_spacing()),
            plan: RealFftPlan::new(conf.ptcl_grid_shape()),
        }
    }
    pub fn conf(&self) -> &'a Configuration<T> {
        self.cosmo.conf()
    }
    pub fn orders(&self) -> Vec<GrowthOrder> {
        (1..=self.conf().lpt_order())
            .filter_map(GrowthOrder::from_lpt_order)
            .collect()
    }

    /// Order 1 potential from the linear density modes.
    pub fn first_potential(&self, scale: &LinearScale<T>, modes: &ArrayD<Complex<T>>) -> ArrayD<Complex<T>> {
        let cell_vol = self.conf().ptcl_cell_vol();
        let delta = Zip::from(modes)
            .and(&scale.sqrt)
            .par_map_collect(|&m, &s| m * s / cell_vol);
        poisson(&self.kvec, &delta)
    }

    pub fn strains(&self, pot: &ArrayD<Complex<T>>) -> StrainSet<T> {
        StrainSet::new(&self.kvec, pot, &self.plan)
    }

    /// Order 2 potential from the strains of the order 1 potential.
    pub fn second_potential(&self, strains: &StrainSet<T>) -> ArrayD<Complex<T>> {
        let source = strains.self_source();
        poisson(&self.kvec, &self.plan.rfftn(&source, Norm::Backward))
    }

    pub fn weights(&self, order: GrowthOrder) -> GrowthWeights<T> {
        let a = self.conf().a_start();
        let d = self.cosmo.growth(a, order, Deriv::Value);
        let dd_dlna = self.cosmo.growth(a, order, Deriv::LogA);
        let hubble = self.cosmo.expansion_rate_squared(a).sqrt();
        GrowthWeights {
            order,
            disp: d,
            vel: a * a * hubble * dd_dlna,
        }
    }

    /// Real-space negative gradient of `pot` along each axis.
    pub fn gradients(&self, pot: &ArrayD<Complex<T>>) -> Vec<ArrayD<T>> {
        (0..self.kvec.dim())
            .into_par_iter()
            .map(|axis| {
                self.plan
                    .irfftn(&neg_grad(&self.kvec, axis, pot), Norm::Backward)
            })
            .collect()
    }

    pub fn delta(
        &self,
        pot: &ArrayD<Complex<T>>,
        weights: GrowthWeights<T>,
    ) -> Result<ParticleDelta<T>, LptError> {
        let num = self.conf().ptcl_num();
        let grads = self.gradients(pot);
        let columns = grads
            .iter()
            .map(|g| g.view().into_shape_with_order(num))
            .collect::<Result<Vec<ArrayView1<'_, T>>, _>>()?;
        let grad: Array2<T> = ndarray::stack(Axis(1), &columns)?;
        debug!(
            "order {} weights: disp {}, vel {}",
            weights.order.lpt_order(),
            weights.disp,
            weights.vel
        );
        Ok(ParticleDelta {
            disp: &grad * weights.disp,
            vel: grad * weights.vel,
        })
    }

    /// Folds the per-order deltas of `potentials`, lowest order first, into
    /// the lattice.
    pub fn particles(&self, potentials: &[ArrayD<Complex<T>>]) -> Result<ParticleSet<T>, LptError> {
        self.orders()
            .into_iter()
            .zip(potentials)
            .try_fold(ParticleSet::lattice(self.conf()), |set, (order, pot)| {
                Ok(set.accumulate(self.delta(pot, self.weights(order))?))
            })
    }
}

/// Displacements and velocities of the lattice particles at `a_start`, to
/// the configured LPT order.
pub fn lpt<T: Real, C: CosmologyProvider<T>>(
    modes: &ArrayD<Complex<T>>,
    cosmo: &C,
) -> Result<LptOutput<T>, LptError> {
    let conf = cosmo.conf();
    validate(conf, modes)?;
    info!(
        "lpt order {} on grid {:?}, a_start = {}",
        conf.lpt_order(),
        conf.ptcl_grid_shape(),
        conf.a_start()
    );
    let pipeline = Pipeline::new(cosmo);
    let mut potentials = vec![];
    if conf.lpt_order() >= 1 {
        let scale = linear_scale(&pipeline.kvec, None, cosmo);
        potentials.push(pipeline.first_potential(&scale, modes));
        debug!("solved order 1 potential");
    }
    if conf.lpt_order() >= 2 {
        let strains = pipeline.strains(&potentials[0]);
        potentials.push(pipeline.second_potential(&strains));
        debug!("solved order 2 potential");
    }
    let particles = pipeline.particles(&potentials)?;
    Ok(LptOutput {
        particles,
        observables: None,
    })
}
