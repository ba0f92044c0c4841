use crate::Real;

/// Converts an `f64` constant into the working precision.
pub fn real<T: Real>(x: f64) -> T {
    T::from_f64(x).unwrap_or_else(T::nan)
}

pub fn to_f64<T: Real>(x: T) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}

pub fn linear_interp(a: f64, b: f64, l: f64) -> f64 {
    a * (1.0 - l) + b * l
}

/// Interpolates `ys` over sorted `xs` linearly in `ln x` and `ln y`. Returns
/// `None` outside `[xs[0], xs[n - 1]]`.
pub fn log_interp(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let n = xs.len();
    if n < 2 || x < xs[0] || x > xs[n - 1] {
        return None;
    }
    let hi = xs.partition_point(|&v| v < x).clamp(1, n - 1);
    let lo = hi - 1;
    let l = (x.ln() - xs[lo].ln()) / (xs[hi].ln() - xs[lo].ln());
    Some(linear_interp(ys[lo].ln(), ys[hi].ln(), l).exp())
}

/// One classical Runge-Kutta step of `dy/dt = f(t, y)`.
pub fn rk4_step<const N: usize, F>(f: &F, t: f64, y: [f64; N], h: f64) -> [f64; N]
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    let shift = |y: &[f64; N], k: &[f64; N], c: f64| {
        let mut ret = *y;
        for i in 0..N {
            ret[i] += c * k[i];
        }
        ret
    };
    let k1 = f(t, &y);
    let k2 = f(t + h / 2.0, &shift(&y, &k1, h / 2.0));
    let k3 = f(t + h / 2.0, &shift(&y, &k2, h / 2.0));
    let k4 = f(t + h, &shift(&y, &k3, h));
    let mut ret = y;
    for i in 0..N {
        ret[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    ret
}
