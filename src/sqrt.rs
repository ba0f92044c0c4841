use ndarray::{ArrayD, Zip};

use crate::{Real, util::real};

/// A forward map paired with its vector-Jacobian product.
///
/// `backward` receives the forward output rather than the input, which is
/// all the pullbacks in this crate need.
pub trait Vjp<T> {
    fn forward(&self, input: &ArrayD<T>) -> ArrayD<T>;
    fn backward(&self, output: &ArrayD<T>, output_cot: &ArrayD<T>) -> ArrayD<T>;
}

pub fn stable_sqrt<T: Real>(x: T) -> T {
    x.sqrt()
}

/// Cotangent of `x` given `y = sqrt(x)` and the cotangent of `y`. Zero where
/// `y` is zero instead of the infinite derivative.
pub fn stable_sqrt_backward<T: Real>(y: T, y_cot: T) -> T {
    if y == T::zero() {
        T::zero()
    } else {
        real::<T>(0.5) / y * y_cot
    }
}

/// Elementwise square root whose gradient stays finite at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableSqrt;

impl<T: Real> Vjp<T> for StableSqrt {
    fn forward(&self, input: &ArrayD<T>) -> ArrayD<T> {
        input.mapv(stable_sqrt)
    }
    fn backward(&self, output: &ArrayD<T>, output_cot: &ArrayD<T>) -> ArrayD<T> {
        Zip::from(output)
            .and(output_cot)
            .par_map_collect(|&y, &c| stable_sqrt_backward(y, c))
    }
}
