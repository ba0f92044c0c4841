use log::{debug, info};
use ndarray::{ArrayD, ArrayView2, Zip};
use num_complex::Complex;
use rayon::prelude::*;

use crate::{
    Real,
    conf::RecomputePolicy,
    cosmology::CosmologyProvider,
    error::LptError,
    fft::Norm,
    geometry::{neg_grad_adjoint, poisson},
    lpt::{LinearScale, LptOutput, Pipeline, linear_scale, validate},
    sqrt::{StableSqrt, Vjp},
    strain::StrainSet,
};

/// Cotangents of the inputs of [`crate::lpt::lpt`].
///
/// Complex cotangents hold `∂L/∂re` in the real part and `∂L/∂im` in the
/// imaginary part.
#[derive(Debug, Clone, PartialEq)]
pub struct LptCotangents<T> {
    /// Of the white-noise modes.
    pub modes: ArrayD<Complex<T>>,
    /// Of the unscaled linear power evaluated at each half-spectrum bin.
    pub power: ArrayD<T>,
}

struct Intermediates<T> {
    scale: LinearScale<T>,
    potentials: Vec<ArrayD<Complex<T>>>,
    strains: Option<StrainSet<T>>,
}

/// Computation record of one LPT forward pass.
pub struct LptPullback<'a, T, C> {
    pipeline: Pipeline<'a, T, C>,
    modes: ArrayD<Complex<T>>,
    retained: Option<Intermediates<T>>,
}

impl<'a, T: Real, C: CosmologyProvider<T>> LptPullback<'a, T, C> {
    fn forward(pipeline: &Pipeline<'a, T, C>, modes: &ArrayD<Complex<T>>) -> Intermediates<T> {
        let order = pipeline.conf().lpt_order();
        let scale = linear_scale(&pipeline.kvec, None, pipeline.cosmo);
        let mut potentials = vec![];
        let mut strains = None;
        if order >= 1 {
            potentials.push(pipeline.first_potential(&scale, modes));
        }
        if order >= 2 {
            let s = pipeline.strains(&potentials[0]);
            potentials.push(pipeline.second_potential(&s));
            strains = Some(s);
        }
        Intermediates {
            scale,
            potentials,
            strains,
        }
    }

    pub fn policy(&self) -> RecomputePolicy {
        self.pipeline.conf().recompute()
    }

    fn check_cotangent(&self, cot: &ArrayView2<'_, T>) -> Result<(), LptError> {
        let conf = self.pipeline.conf();
        let expected = vec![conf.ptcl_num(), conf.dim()];
        if cot.shape() != expected.as_slice() {
            return Err(LptError::CotangentShape {
                expected,
                found: cot.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Pulls the cotangents of the particle displacements and velocities
    /// back to the white-noise modes and the linear power.
    pub fn backward(
        &self,
        disp_cot: ArrayView2<'_, T>,
        vel_cot: ArrayView2<'_, T>,
    ) -> Result<LptCotangents<T>, LptError> {
        self.check_cotangent(&disp_cot)?;
        self.check_cotangent(&vel_cot)?;
        let recomputed;
        let inter = match &self.retained {
            Some(inter) => inter,
            None => {
                debug!("recomputing potentials for the backward pass");
                recomputed = Self::forward(&self.pipeline, &self.modes);
                &recomputed
            }
        };
        let pipeline = &self.pipeline;
        let conf = pipeline.conf();
        let kvec = &pipeline.kvec;
        let plan = &pipeline.plan;

        let mut pot_cots = vec![];
        for (order, _) in pipeline.orders().into_iter().zip(&inter.potentials) {
            let w = pipeline.weights(order);
            let parts = (0..conf.dim())
                .into_par_iter()
                .map(|axis| -> Result<ArrayD<Complex<T>>, LptError> {
                    let grad_cot = Zip::from(disp_cot.column(axis))
                        .and(vel_cot.column(axis))
                        .par_map_collect(|&d, &v| d * w.disp + v * w.vel)
                        .into_shape_with_order(conf.ptcl_grid_shape())?;
                    let modes_cot = plan.irfftn_adjoint(&grad_cot, Norm::Backward);
                    Ok(neg_grad_adjoint(kvec, axis, &modes_cot))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let pot_cot = parts
                .into_iter()
                .fold(ArrayD::zeros(kvec.spectrum_shape()), |acc, part| acc + part);
            pot_cots.push(pot_cot);
        }

        let mut pot_cots = pot_cots.into_iter();
        let Some(mut pot1_cot) = pot_cots.next() else {
            return Ok(LptCotangents {
                modes: ArrayD::zeros(self.modes.raw_dim()),
                power: ArrayD::zeros(inter.scale.power.raw_dim()),
            });
        };
        if let (Some(pot2_cot), Some(strains)) = (pot_cots.next(), &inter.strains) {
            let source_cot = plan.rfftn_adjoint(&poisson(kvec, &pot2_cot), Norm::Backward);
            pot1_cot += &strains.source_adjoint(kvec, &source_cot, plan);
        }

        let delta_cot = poisson(kvec, &pot1_cot);
        let cell_vol = conf.ptcl_cell_vol();
        let modes = Zip::from(&delta_cot)
            .and(&inter.scale.sqrt)
            .par_map_collect(|&c, &s| c * s / cell_vol);
        let sqrt_cot = Zip::from(&delta_cot)
            .and(&self.modes)
            .par_map_collect(|&c, &m| (c.re * m.re + c.im * m.im) / cell_vol);
        let box_vol = conf.box_vol();
        let power = StableSqrt.backward(&inter.scale.sqrt, &sqrt_cot) * box_vol;
        Ok(LptCotangents { modes, power })
    }
}

/// Runs [`crate::lpt::lpt`] and records what its backward pass needs.
///
/// Under [`RecomputePolicy::Retain`] the potentials and strains are kept;
/// under [`RecomputePolicy::Recompute`] only the modes are, and the rest is
/// recomputed in [`LptPullback::backward`].
pub fn lpt_vjp<'a, T: Real, C: CosmologyProvider<T>>(
    modes: &ArrayD<Complex<T>>,
    cosmo: &'a C,
) -> Result<(LptOutput<T>, LptPullback<'a, T, C>), LptError> {
    let conf = cosmo.conf();
    validate(conf, modes)?;
    info!(
        "lpt with pullback, order {} on grid {:?}, {:?}",
        conf.lpt_order(),
        conf.ptcl_grid_shape(),
        conf.recompute()
    );
    let pipeline = Pipeline::new(cosmo);
    let inter = LptPullback::forward(&pipeline, modes);
    let particles = pipeline.particles(&inter.potentials)?;
    let retained = match conf.recompute() {
        RecomputePolicy::Retain => Some(inter),
        RecomputePolicy::Recompute => None,
    };
    let pullback = LptPullback {
        pipeline,
        modes: modes.to_owned(),
        retained,
    };
    Ok((
        LptOutput {
            particles,
            observables: None,
        },
        pullback,
    ))
}
