use ndarray::{Array2, Zip};

use crate::{Real, conf::Configuration, util::real};

/// Displacement and velocity contributed by one LPT order, shaped
/// `(ptcl_num, dim)`.
#[derive(Debug, Clone)]
pub struct ParticleDelta<T> {
    pub disp: Array2<T>,
    pub vel: Array2<T>,
}

/// Particles on the Lagrangian lattice.
///
/// Rows are particles in row-major lattice order; `pid` holds their integer
/// lattice coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet<T> {
    pub pid: Array2<u32>,
    pub disp: Array2<T>,
    pub vel: Array2<T>,
}

impl<T: Real> ParticleSet<T> {
    /// Unperturbed lattice with zero displacement and velocity.
    pub fn lattice(conf: &Configuration<T>) -> Self {
        let shape = conf.ptcl_grid_shape();
        let (num, dim) = (conf.ptcl_num(), conf.dim());
        let pid = Array2::from_shape_fn((num, dim), |(p, axis)| {
            let stride: usize = shape[axis + 1..].iter().product();
            ((p / stride) % shape[axis]) as u32
        });
        Self {
            pid,
            disp: Array2::zeros((num, dim)),
            vel: Array2::zeros((num, dim)),
        }
    }
    pub fn len(&self) -> usize {
        self.pid.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn dim(&self) -> usize {
        self.pid.ncols()
    }

    /// Eulerian positions, `pid * spacing + disp`, not wrapped into the box.
    pub fn positions(&self, spacing: T) -> Array2<T> {
        Zip::from(&self.pid)
            .and(&self.disp)
            .par_map_collect(|&q, &d| real::<T>(q as f64) * spacing + d)
    }

    pub fn accumulate(mut self, delta: ParticleDelta<T>) -> Self {
        self.disp += &delta.disp;
        self.vel += &delta.vel;
        self
    }
}
