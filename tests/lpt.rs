use lptic::{
    Configuration, Cosmology, CosmologyProvider, Deriv, GrowthOrder,
    fft::{Norm, RealFftPlan},
    geometry::Wavevectors,
    lpt,
    power::FlatPower,
    spectrum::powspec,
    white_noise,
};
use ndarray::{Array2, ArrayD, IxDyn, Zip};
use num_complex::Complex64;

/// `-∇·disp` on the lattice, computed spectrally.
fn divergence(conf: &Configuration<f64>, disp: &Array2<f64>) -> anyhow::Result<ArrayD<f64>> {
    let shape = conf.ptcl_grid_shape();
    let plan = RealFftPlan::new(shape);
    let kvec = Wavevectors::new(shape, conf.ptcl_spacing());
    let mut div = ArrayD::<Complex64>::zeros(IxDyn(&plan.spectrum_shape()));
    for axis in 0..conf.dim() {
        let column = disp.column(axis).to_owned().into_shape_with_order(shape)?;
        let modes = plan.rfftn(&column, Norm::Backward);
        let k = kvec.grid(|idx| kvec.component(axis, idx));
        Zip::from(&mut div).and(&modes).and(&k).for_each(|d, &m, &k| {
            *d -= Complex64::new(0.0, k) * m;
        });
    }
    Ok(plan.irfftn(&div, Norm::Backward))
}

fn max_abs(a: &Array2<f64>) -> f64 {
    a.iter().fold(0.0f64, |m, &v| m.max(v.abs()))
}

#[test]
fn first_order_power_spectrum() -> anyhow::Result<()> {
    let amplitude = 50.0;
    let conf = Configuration::new([32, 32, 32], 2.0).with_lpt_order(1);
    let cosmo = Cosmology::einstein_de_sitter(conf.clone(), FlatPower { amplitude });
    let modes = white_noise(1, &conf, true, false);
    let out = lpt(&modes, &cosmo)?;

    let delta = divergence(&conf, &out.particles.disp)?;
    let ps = powspec(&delta, conf.ptcl_spacing(), 16);
    let d1 = cosmo.growth(conf.a_start(), GrowthOrder::First, Deriv::Value);
    let expected = amplitude * d1 * d1;
    let mut checked = 0;
    for ((&k, &p), &n) in ps.k.iter().zip(ps.power.iter()).zip(ps.modes.iter()) {
        if n == 0 {
            continue;
        }
        assert!(
            (p / expected - 1.0).abs() < 1e-6,
            "k = {}: {} vs {}",
            k,
            p,
            expected
        );
        checked += 1;
    }
    assert!(checked > 10);
    Ok(())
}

#[test]
fn zeldovich_velocity() -> anyhow::Result<()> {
    let a = 0.25f64;
    let conf = Configuration::new([16, 8, 12], 1.0)
        .with_lpt_order(1)
        .with_a_start(a);
    let cosmo = Cosmology::einstein_de_sitter(conf.clone(), FlatPower { amplitude: 10.0 });
    let modes = white_noise(5, &conf, false, false);
    let particles = lpt(&modes, &cosmo)?.particles;

    // a^2 H(a) in units of H_0
    let a2h = a * a * cosmo.expansion_rate_squared(a).sqrt();
    assert!((a2h - a.sqrt()).abs() < 1e-12);
    let expected = &particles.disp * a2h;
    assert!(max_abs(&(&particles.vel - &expected)) < 1e-7 * max_abs(&expected));
    assert!(max_abs(&particles.disp) > 0.0);
    Ok(())
}

#[test]
fn second_order_correction() -> anyhow::Result<()> {
    let a = 0.5f64;
    let conf = Configuration::new([16, 16, 8], 1.0).with_a_start(a);
    let cosmo = Cosmology::einstein_de_sitter(conf.clone(), FlatPower { amplitude: 20.0 });
    let modes = white_noise(11, &conf, false, false);
    let second = lpt(&modes, &cosmo)?.particles;

    let first_conf = conf.clone().with_lpt_order(1);
    let first_cosmo = Cosmology::einstein_de_sitter(first_conf, FlatPower { amplitude: 20.0 });
    let first = lpt(&modes, &first_cosmo)?.particles;
    assert_eq!(first.pid, second.pid);

    let disp2 = &second.disp - &first.disp;
    let vel2 = &second.vel - &first.vel;
    assert!(max_abs(&disp2) > 1e-6 * max_abs(&first.disp));
    // dlnD2/dlna = 2 in Einstein-de Sitter
    let a2h = a * a * cosmo.expansion_rate_squared(a).sqrt();
    let expected = &disp2 * (2.0 * a2h);
    assert!(max_abs(&(&vel2 - &expected)) < 1e-6 * max_abs(&expected));
    Ok(())
}

#[test]
fn deterministic_across_calls() -> anyhow::Result<()> {
    let conf = Configuration::new([8, 8, 8], 1.0f32);
    let cosmo = Cosmology::flat_lcdm(conf.clone(), 0.3, FlatPower { amplitude: 30.0 });
    let modes = white_noise(2, &conf, false, false);
    let a = lpt(&modes, &cosmo)?;
    let b = lpt(&white_noise(2, &conf, false, false), &cosmo)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn lower_dimensions() -> anyhow::Result<()> {
    let conf = Configuration::new([32], 1.0);
    let cosmo = Cosmology::einstein_de_sitter(conf.clone(), FlatPower { amplitude: 1.0 });
    let modes = white_noise(4, &conf, false, false);
    let second = lpt(&modes, &cosmo)?.particles;
    let first_cosmo =
        Cosmology::einstein_de_sitter(conf.clone().with_lpt_order(1), FlatPower { amplitude: 1.0 });
    let first = lpt(&modes, &first_cosmo)?.particles;
    // a single axis has no second order source
    assert_eq!(first, second);

    let conf = Configuration::new([8, 12], 0.5);
    let cosmo = Cosmology::einstein_de_sitter(conf.clone(), FlatPower { amplitude: 1.0 });
    let modes = white_noise(4, &conf, false, false);
    let particles = lpt(&modes, &cosmo)?.particles;
    assert_eq!(particles.disp.shape(), &[96, 2]);
    assert_eq!(particles.pid.row(13).to_vec(), vec![1, 1]);
    Ok(())
}
