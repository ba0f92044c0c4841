use std::sync::{Arc, Mutex, PoisonError};

use ndarray::{ArrayD, ArrayView1, Axis, IxDyn, Zip};
use num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::{Real, util::real};

/// Normalisation of a transform pair, as in `numpy.fft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    /// Forward unscaled, inverse scaled by `1 / N`.
    Backward,
    /// Both directions scaled by `1 / sqrt(N)`.
    Ortho,
}

/// Real-to-half-spectrum FFT over a fixed N-dimensional grid.
///
/// The half spectrum keeps `n / 2 + 1` bins along the last axis.
pub struct RealFftPlan<T> {
    shape: Vec<usize>,
    forward: Vec<Arc<dyn Fft<T>>>,
    inverse: Vec<Arc<dyn Fft<T>>>,
    scratch: Mutex<Vec<Vec<Complex<T>>>>,
}

/// Number of full-spectrum modes represented by half-spectrum bin `q` of an
/// axis of length `n`.
pub fn conjugate_multiplicity(q: usize, n: usize) -> usize {
    if q == 0 || (n % 2 == 0 && q == n / 2) {
        1
    } else {
        2
    }
}

fn hermitian_extend<T: Real>(half: ArrayView1<'_, Complex<T>>, full: &mut [Complex<T>]) {
    let n = full.len();
    if n == 0 {
        return;
    }
    let m = half.len();
    for q in 0..m {
        full[q] = half[q];
    }
    full[0].im = T::zero();
    if n % 2 == 0 {
        full[n / 2].im = T::zero();
    }
    for q in 1..(n + 1 - m) {
        full[n - q] = half[q].conj();
    }
}

impl<T: Real> RealFftPlan<T> {
    pub fn new(shape: &[usize]) -> Self {
        let mut planner = FftPlanner::new();
        let forward = shape
            .iter()
            .map(|&n| planner.plan_fft(n, FftDirection::Forward))
            .collect();
        let inverse = shape
            .iter()
            .map(|&n| planner.plan_fft(n, FftDirection::Inverse))
            .collect();
        Self {
            shape: shape.to_vec(),
            forward,
            inverse,
            scratch: Mutex::new(vec![]),
        }
    }
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    pub fn spectrum_shape(&self) -> Vec<usize> {
        let mut shape = self.shape.clone();
        if let Some(last) = shape.last_mut() {
            *last = *last / 2 + 1;
        }
        shape
    }
    fn last_axis(&self) -> usize {
        self.shape.len() - 1
    }
    fn total_size(&self) -> T {
        real(self.shape.iter().product::<usize>() as f64)
    }
    fn forward_scale(&self, norm: Norm) -> T {
        match norm {
            Norm::Backward => T::one(),
            Norm::Ortho => self.total_size().sqrt().recip(),
        }
    }
    fn inverse_scale(&self, norm: Norm) -> T {
        match norm {
            Norm::Backward => self.total_size().recip(),
            Norm::Ortho => self.total_size().sqrt().recip(),
        }
    }
    /// Conjugate multiplicity of every half-spectrum bin.
    fn multiplicity(&self) -> ArrayD<T> {
        let last = self.last_axis();
        let n = self.shape[last];
        ArrayD::from_shape_fn(IxDyn(&self.spectrum_shape()), |idx| {
            real(conjugate_multiplicity(idx[last], n) as f64)
        })
    }
    fn alloc_scratch(&self, total_length: usize) -> Vec<Complex<T>> {
        let v = &mut *self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut ret) = v.pop() {
            ret.resize(total_length, Complex::new(T::zero(), T::zero()));
            ret
        } else {
            vec![Complex::new(T::zero(), T::zero()); total_length]
        }
    }
    fn retain_scratch(&self, s: Vec<Complex<T>>) {
        self.scratch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(s);
    }
    fn plan(&self, axis: usize, direction: FftDirection) -> &dyn Fft<T> {
        match direction {
            FftDirection::Forward => self.forward[axis].as_ref(),
            FftDirection::Inverse => self.inverse[axis].as_ref(),
        }
    }
    fn transform_one_axis_inplace(
        &self,
        field: &mut ArrayD<Complex<T>>,
        axis: usize,
        direction: FftDirection,
    ) {
        let plan = self.plan(axis, direction);
        let len = field.len_of(Axis(axis));
        Zip::from(field.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let mut buffer = self.alloc_scratch(len + plan.get_inplace_scratch_len());
            let (data, scratch) = buffer.as_mut_slice().split_at_mut(len);
            for (d, v) in data.iter_mut().zip(lane.iter()) {
                *d = *v;
            }
            plan.process_with_scratch(data, scratch);
            for (v, d) in lane.iter_mut().zip(data.iter()) {
                *v = *d;
            }
            self.retain_scratch(buffer);
        });
    }

    /// Forward transform of a real field into its half spectrum.
    pub fn rfftn(&self, field: &ArrayD<T>, norm: Norm) -> ArrayD<Complex<T>> {
        debug_assert_eq!(field.shape(), self.shape.as_slice());
        let last = self.last_axis();
        let n = self.shape[last];
        let plan = self.plan(last, FftDirection::Forward);
        let mut modes = ArrayD::<Complex<T>>::zeros(IxDyn(&self.spectrum_shape()));
        Zip::from(modes.lanes_mut(Axis(last)))
            .and(field.lanes(Axis(last)))
            .par_for_each(|mut out, input| {
                let mut buffer = self.alloc_scratch(n + plan.get_inplace_scratch_len());
                let (data, scratch) = buffer.as_mut_slice().split_at_mut(n);
                for (d, &x) in data.iter_mut().zip(input.iter()) {
                    *d = Complex::new(x, T::zero());
                }
                plan.process_with_scratch(data, scratch);
                for (o, d) in out.iter_mut().zip(data.iter()) {
                    *o = *d;
                }
                self.retain_scratch(buffer);
            });
        for axis in 0..last {
            self.transform_one_axis_inplace(&mut modes, axis, FftDirection::Forward);
        }
        let scale = self.forward_scale(norm);
        if scale != T::one() {
            modes.mapv_inplace(|m| m * scale);
        }
        modes
    }

    /// Inverse of [`Self::rfftn`]. The imaginary parts of self-conjugate bins
    /// along the last axis are ignored, as in `numpy.fft.irfftn`.
    pub fn irfftn(&self, modes: &ArrayD<Complex<T>>, norm: Norm) -> ArrayD<T> {
        debug_assert_eq!(modes.shape(), self.spectrum_shape().as_slice());
        let last = self.last_axis();
        let n = self.shape[last];
        let mut partial = modes.to_owned();
        for axis in 0..last {
            self.transform_one_axis_inplace(&mut partial, axis, FftDirection::Inverse);
        }
        let plan = self.plan(last, FftDirection::Inverse);
        let mut field = ArrayD::<T>::zeros(IxDyn(&self.shape));
        Zip::from(field.lanes_mut(Axis(last)))
            .and(partial.lanes(Axis(last)))
            .par_for_each(|mut out, half| {
                let mut buffer = self.alloc_scratch(n + plan.get_inplace_scratch_len());
                let (data, scratch) = buffer.as_mut_slice().split_at_mut(n);
                hermitian_extend(half, data);
                plan.process_with_scratch(data, scratch);
                for (o, d) in out.iter_mut().zip(data.iter()) {
                    *o = d.re;
                }
                self.retain_scratch(buffer);
            });
        let scale = self.inverse_scale(norm);
        field.mapv_inplace(|x| x * scale);
        field
    }

    /// Cotangent of the modes of [`Self::irfftn`] given the cotangent of its
    /// output.
    pub fn irfftn_adjoint(&self, cot: &ArrayD<T>, norm: Norm) -> ArrayD<Complex<T>> {
        let scale = self.inverse_scale(norm);
        let mut ret = self.rfftn(cot, Norm::Backward);
        Zip::from(&mut ret)
            .and(&self.multiplicity())
            .par_for_each(|v, &w| *v = *v * (scale * w));
        ret
    }

    /// Cotangent of the real input of [`Self::rfftn`] given the cotangent of
    /// its modes.
    pub fn rfftn_adjoint(&self, cot: &ArrayD<Complex<T>>, norm: Norm) -> ArrayD<T> {
        let weighted = Zip::from(cot)
            .and(&self.multiplicity())
            .par_map_collect(|&v, &w| v / w);
        let scale = self.forward_scale(norm) * self.total_size();
        let mut field = self.irfftn(&weighted, Norm::Backward);
        field.mapv_inplace(|x| x * scale);
        field
    }
}
