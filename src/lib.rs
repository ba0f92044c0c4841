//! Lagrangian perturbation theory initial conditions for particle-mesh
//! simulations.
//!
//! The pipeline draws a white-noise field ([`noise::white_noise`]), scales it
//! by a linear power spectrum, solves for the first and second order
//! potentials and assembles particle displacements and velocities
//! ([`lpt::lpt`]). [`adjoint::lpt_vjp`] runs the same pipeline and returns a
//! pullback for reverse-mode gradients.

use std::{fmt::Display, iter::Sum};

use ndarray::ScalarOperand;
use num_traits::{Float, FloatConst, FromPrimitive, NumAssign, ToPrimitive};
use rustfft::FftNum;

pub mod adjoint;
pub mod conf;
pub mod config;
pub mod cosmology;
pub mod error;
pub mod fft;
pub mod geometry;
pub mod lpt;
pub mod noise;
pub mod particles;
pub mod power;
pub mod spectrum;
pub mod sqrt;
pub mod strain;
pub mod util;

pub use adjoint::{LptCotangents, LptPullback, lpt_vjp};
pub use conf::{Configuration, RecomputePolicy};
pub use cosmology::{Cosmology, CosmologyProvider, Deriv, GrowthOrder};
pub use error::{ConfigError, LptError, PowerTableError};
pub use lpt::{LptOutput, Observables, lpt};
pub use noise::white_noise;
pub use particles::ParticleSet;

/// Working floating point precision of a pipeline, `f32` or `f64`.
pub trait Real:
    Float
    + FloatConst
    + NumAssign
    + FftNum
    + FromPrimitive
    + ToPrimitive
    + ScalarOperand
    + Display
    + Sum
    + Send
    + Sync
    + 'static
{
}

impl<T> Real for T where
    T: Float
        + FloatConst
        + NumAssign
        + FftNum
        + FromPrimitive
        + ToPrimitive
        + ScalarOperand
        + Display
        + Sum
        + Send
        + Sync
        + 'static
{
}
