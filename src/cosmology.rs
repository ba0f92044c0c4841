use libm::{exp, log, pow};
use ndarray::{ArrayD, ArrayViewD, Zip};

use crate::{
    Real,
    conf::Configuration,
    power::LinearPower,
    util::{real, rk4_step, to_f64},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthOrder {
    First,
    Second,
}

impl GrowthOrder {
    pub fn from_lpt_order(order: usize) -> Option<Self> {
        match order {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }
    pub fn lpt_order(self) -> usize {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// Which quantity [`CosmologyProvider::growth`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deriv {
    /// `D(a)`
    Value,
    /// `dD / dln a`
    LogA,
}

/// Everything the LPT pipeline asks of a cosmological model.
pub trait CosmologyProvider<T: Real>: Sync {
    fn conf(&self) -> &Configuration<T>;

    /// Linear matter power at each wavenumber in `k`. With `a = None` the
    /// power is not scaled by growth.
    fn linear_power(&self, k: ArrayViewD<'_, T>, a: Option<T>) -> ArrayD<T>;

    fn growth(&self, a: T, order: GrowthOrder, deriv: Deriv) -> T;

    /// `E^2(a) = H^2(a) / H_0^2`.
    fn expansion_rate_squared(&self, a: T) -> T;
}

/// Start of the growth integration relative to the requested scale factor.
const GROWTH_A_RATIO: f64 = 1e-3;
const GROWTH_STEPS: usize = 2048;

/// Background with matter, curvature and a cosmological constant, and a
/// linear power shape `P`.
#[derive(Debug, Clone)]
pub struct Cosmology<T, P> {
    conf: Configuration<T>,
    omega_m: f64,
    omega_lambda: f64,
    power: P,
}

impl<T: Real, P: LinearPower> Cosmology<T, P> {
    pub fn new(conf: Configuration<T>, omega_m: f64, omega_lambda: f64, power: P) -> Self {
        Self {
            conf,
            omega_m,
            omega_lambda,
            power,
        }
    }
    pub fn einstein_de_sitter(conf: Configuration<T>, power: P) -> Self {
        Self::new(conf, 1.0, 0.0, power)
    }
    pub fn flat_lcdm(conf: Configuration<T>, omega_m: f64, power: P) -> Self {
        Self::new(conf, omega_m, 1.0 - omega_m, power)
    }
    pub fn omega_m(&self) -> f64 {
        self.omega_m
    }
    pub fn omega_lambda(&self) -> f64 {
        self.omega_lambda
    }
    pub fn omega_k(&self) -> f64 {
        1.0 - self.omega_m - self.omega_lambda
    }
    pub fn power(&self) -> &P {
        &self.power
    }

    fn e2(&self, a: f64) -> f64 {
        self.omega_m * pow(a, -3.0) + self.omega_k() * pow(a, -2.0) + self.omega_lambda
    }
    fn dlne_dlna(&self, a: f64) -> f64 {
        (-3.0 * self.omega_m * pow(a, -3.0) - 2.0 * self.omega_k() * pow(a, -2.0))
            / (2.0 * self.e2(a))
    }
    fn omega_m_at(&self, a: f64) -> f64 {
        self.omega_m * pow(a, -3.0) / self.e2(a)
    }

    /// `[D1, dD1/dlna, D2, dD2/dlna]` at `a`, integrated in `ln a` from the
    /// matter dominated growing mode.
    pub fn growth_state(&self, a: f64) -> [f64; 4] {
        if a <= 0.0 {
            return [0.0; 4];
        }
        let a_i = a * GROWTH_A_RATIO;
        let rhs = |lna: f64, y: &[f64; 4]| {
            let a = exp(lna);
            let friction = 2.0 + self.dlne_dlna(a);
            let source = 1.5 * self.omega_m_at(a);
            [
                y[1],
                source * y[0] - friction * y[1],
                y[3],
                source * (y[2] - y[0] * y[0]) - friction * y[3],
            ]
        };
        let mut y = [a_i, a_i, -3.0 / 7.0 * a_i * a_i, -6.0 / 7.0 * a_i * a_i];
        let t0 = log(a_i);
        let h = (log(a) - t0) / GROWTH_STEPS as f64;
        for step in 0..GROWTH_STEPS {
            y = rk4_step(&rhs, t0 + step as f64 * h, y, h);
        }
        y
    }
}

impl<T: Real, P: LinearPower> CosmologyProvider<T> for Cosmology<T, P> {
    fn conf(&self) -> &Configuration<T> {
        &self.conf
    }
    fn linear_power(&self, k: ArrayViewD<'_, T>, a: Option<T>) -> ArrayD<T> {
        let d2 = a.map_or(1.0, |a| pow(self.growth_state(to_f64(a))[0], 2.0));
        Zip::from(k).par_map_collect(|&k| real(self.power.power(to_f64(k)) * d2))
    }
    fn growth(&self, a: T, order: GrowthOrder, deriv: Deriv) -> T {
        let y = self.growth_state(to_f64(a));
        let i = match (order, deriv) {
            (GrowthOrder::First, Deriv::Value) => 0,
            (GrowthOrder::First, Deriv::LogA) => 1,
            (GrowthOrder::Second, Deriv::Value) => 2,
            (GrowthOrder::Second, Deriv::LogA) => 3,
        };
        real(y[i])
    }
    fn expansion_rate_squared(&self, a: T) -> T {
        real(self.e2(to_f64(a)))
    }
}
