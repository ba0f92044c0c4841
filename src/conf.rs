use crate::{Real, error::LptError, util::real};

/// How [`crate::adjoint::LptPullback`] obtains the intermediate fields it
/// needs for the backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecomputePolicy {
    /// Keep potentials and strains from the forward pass.
    #[default]
    Retain,
    /// Keep only the inputs and recompute the rest during `backward`.
    Recompute,
}

/// Immutable description of the particle lattice and the LPT run.
///
/// The working precision is the type parameter `T`, so every field derived
/// from a configuration shares it.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration<T> {
    ptcl_grid_shape: Vec<usize>,
    ptcl_spacing: T,
    lpt_order: usize,
    a_start: T,
    recompute: RecomputePolicy,
}

impl<T: Real> Configuration<T> {
    pub fn new<S: Into<Vec<usize>>>(ptcl_grid_shape: S, ptcl_spacing: T) -> Self {
        Self {
            ptcl_grid_shape: ptcl_grid_shape.into(),
            ptcl_spacing,
            lpt_order: 2,
            a_start: real(1.0 / 64.0),
            recompute: RecomputePolicy::default(),
        }
    }
    pub fn with_lpt_order(self, lpt_order: usize) -> Self {
        Self { lpt_order, ..self }
    }
    pub fn with_a_start(self, a_start: T) -> Self {
        Self { a_start, ..self }
    }
    pub fn with_recompute(self, recompute: RecomputePolicy) -> Self {
        Self { recompute, ..self }
    }

    pub fn ptcl_grid_shape(&self) -> &[usize] {
        &self.ptcl_grid_shape
    }
    pub fn ptcl_spacing(&self) -> T {
        self.ptcl_spacing
    }
    pub fn lpt_order(&self) -> usize {
        self.lpt_order
    }
    pub fn a_start(&self) -> T {
        self.a_start
    }
    pub fn recompute(&self) -> RecomputePolicy {
        self.recompute
    }
    pub fn dim(&self) -> usize {
        self.ptcl_grid_shape.len()
    }
    pub fn ptcl_num(&self) -> usize {
        self.ptcl_grid_shape.iter().product()
    }
    pub fn ptcl_cell_vol(&self) -> T {
        self.ptcl_spacing.powi(self.dim() as i32)
    }
    pub fn box_size(&self) -> Vec<T> {
        self.ptcl_grid_shape
            .iter()
            .map(|&n| real::<T>(n as f64) * self.ptcl_spacing)
            .collect()
    }
    pub fn box_vol(&self) -> T {
        real::<T>(self.ptcl_num() as f64) * self.ptcl_cell_vol()
    }

    /// Shape of the half-spectrum Fourier grid, `n / 2 + 1` on the last axis.
    pub fn spectrum_shape(&self) -> Vec<usize> {
        let mut shape = self.ptcl_grid_shape.clone();
        if let Some(last) = shape.last_mut() {
            *last = *last / 2 + 1;
        }
        shape
    }

    /// Checks the dimension and LPT order. Order 3 is recognised but reported
    /// as unsupported rather than invalid.
    pub fn validate(&self) -> Result<(), LptError> {
        let dim = self.dim();
        if !(1..=3).contains(&dim) {
            return Err(LptError::configuration("dim", dim));
        }
        if self.ptcl_grid_shape.contains(&0) {
            return Err(LptError::configuration(
                "ptcl_grid_shape",
                format!("{:?}", self.ptcl_grid_shape),
            ));
        }
        if self.lpt_order > 3 {
            return Err(LptError::configuration("lpt_order", self.lpt_order));
        }
        if self.lpt_order == 3 {
            return Err(LptError::unsupported("lpt_order", self.lpt_order));
        }
        Ok(())
    }
}
