use std::{fs::File, io::BufWriter, time::Instant};

use clap::Parser;
use log::{LevelFilter, info};
use lptic::{
    Configuration, Cosmology, Real,
    config::{Precision, RunConfig, read_toml},
    fft::{Norm, RealFftPlan},
    geometry::Wavevectors,
    lpt::{linear_modes, lpt},
    noise::white_noise,
    power::LinearPower,
    spectrum::{PowerSpectrum, powspec},
};
use ndarray_npy::{NpzWriter, WritableElement};

#[derive(Parser)]
struct CommandLineArguments {
    /// Run description
    #[clap(long, short)]
    toml: String,
    #[clap(long, short)]
    verbose: bool,
}

/// Power spectrum of the linear density field at `a_start`.
fn linear_spectrum<T: Real, P: LinearPower>(
    cosmo: &Cosmology<T, P>,
    conf: &Configuration<T>,
    modes: &ndarray::ArrayD<num_complex::Complex<T>>,
    bins: usize,
) -> PowerSpectrum {
    let kvec = Wavevectors::new(conf.ptcl_grid_shape(), conf.ptcl_spacing());
    let cell_vol = conf.ptcl_cell_vol();
    let delta = linear_modes(&kvec, Some(conf.a_start()), modes, cosmo).mapv(|m| m / cell_vol);
    let field = RealFftPlan::new(conf.ptcl_grid_shape()).irfftn(&delta, Norm::Backward);
    powspec(&field, conf.ptcl_spacing(), bins)
}

fn run<T: Real + WritableElement>(run: &RunConfig) -> anyhow::Result<()> {
    let conf = run.configuration::<T>();
    let cosmo = Cosmology::new(
        conf.clone(),
        run.cosmology.omega_m,
        run.cosmology.omega_lambda(),
        run.power.load()?,
    );
    let modes = white_noise(run.seed, &conf, run.fix_amp, run.negate);

    let start = Instant::now();
    let out = lpt(&modes, &cosmo)?;
    info!("lpt finished in {:.3}s", start.elapsed().as_secs_f64());

    let spectrum = linear_spectrum(&cosmo, &conf, &modes, run.spectrum_bins);
    let particles = out.particles;
    let pos = particles.positions(conf.ptcl_spacing());

    let mut npz = NpzWriter::new_compressed(BufWriter::new(File::create(&run.output)?));
    npz.add_array("pid", &particles.pid)?;
    npz.add_array("disp", &particles.disp)?;
    npz.add_array("vel", &particles.vel)?;
    npz.add_array("pos", &pos)?;
    npz.add_array("k", &spectrum.k)?;
    npz.add_array("plin", &spectrum.power)?;
    npz.add_array("nmodes", &spectrum.modes)?;
    npz.finish()?;
    info!("wrote {} particles to {}", particles.pid.nrows(), run.output);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = CommandLineArguments::parse();
    env_logger::builder()
        .format_timestamp_secs()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let config = read_toml(&args.toml)?;
    info!("grid {:?}, seed {}, {:?}", config.grid, config.seed, config.precision);
    match config.precision {
        Precision::F32 => run::<f32>(&config),
        Precision::F64 => run::<f64>(&config),
    }
}
