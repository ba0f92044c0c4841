use serde::Deserialize;

use crate::{
    Real,
    conf::Configuration,
    error::ConfigError,
    power::{FlatPower, LinearPower, PowerLaw, TabulatedPower},
    util::real,
};

/// Floating point precision of a run.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    #[default]
    F64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CosmologyParameters {
    /// Matter density today in units of the critical density
    pub omega_m: f64,
    /// Cosmological constant density; flat when absent
    pub omega_lambda: Option<f64>,
}

impl CosmologyParameters {
    pub fn omega_lambda(&self) -> f64 {
        self.omega_lambda.unwrap_or(1.0 - self.omega_m)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PowerParameters {
    Flat {
        amplitude: f64,
    },
    PowerLaw {
        amplitude: f64,
        index: f64,
        #[serde(default = "default_pivot")]
        pivot: f64,
    },
    /// Two column `k P` text file
    Table { path: String },
}

fn default_pivot() -> f64 {
    1.0
}

impl PowerParameters {
    pub fn load(&self) -> Result<Box<dyn LinearPower>, ConfigError> {
        let power: Box<dyn LinearPower> = match self {
            Self::Flat { amplitude } => Box::new(FlatPower {
                amplitude: *amplitude,
            }),
            Self::PowerLaw {
                amplitude,
                index,
                pivot,
            } => Box::new(PowerLaw {
                amplitude: *amplitude,
                index: *index,
                pivot: *pivot,
            }),
            Self::Table { path } => {
                let text = std::fs::read_to_string(path)
                    .map_err(|_| ConfigError::Read { path: path.clone() })?;
                Box::new(TabulatedPower::parse(&text, path)?)
            }
        };
        Ok(power)
    }
}

fn default_lpt_order() -> usize {
    2
}

fn default_a_start() -> f64 {
    1.0 / 64.0
}

fn default_bins() -> usize {
    32
}

/// A run of the initial conditions generator, deserialized from TOML.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Particles per axis
    pub grid: Vec<usize>,
    /// Lattice spacing
    pub spacing: f64,
    #[serde(default = "default_lpt_order")]
    pub lpt_order: usize,
    #[serde(default = "default_a_start")]
    pub a_start: f64,
    pub seed: u64,
    #[serde(default)]
    pub fix_amp: bool,
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub precision: Precision,
    pub cosmology: CosmologyParameters,
    pub power: PowerParameters,
    /// Path of the `.npz` archive to write
    pub output: String,
    /// Number of `|k|` bins of the linear power estimate
    #[serde(default = "default_bins")]
    pub spectrum_bins: usize,
}

impl RunConfig {
    pub fn configuration<T: Real>(&self) -> Configuration<T> {
        Configuration::new(self.grid.clone(), real(self.spacing))
            .with_lpt_order(self.lpt_order)
            .with_a_start(real(self.a_start))
    }
}

pub fn parse_toml(contents: &str) -> Result<RunConfig, ConfigError> {
    let run: RunConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
        msg: format!("{e:?}"),
    })?;
    if run.spectrum_bins == 0 {
        return Err(ConfigError::Invalid {
            param: "spectrum_bins",
            value: run.spectrum_bins.to_string(),
        });
    }
    Ok(run)
}

/// Reads a run description from a TOML file.
pub fn read_toml(path: &str) -> Result<RunConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::Read {
        path: path.to_string(),
    })?;
    parse_toml(&contents)
}
