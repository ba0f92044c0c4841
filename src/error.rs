use ndarray::ShapeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LptError {
    #[error("{param}={value} not supported")]
    Configuration { param: &'static str, value: String },

    #[error("{param}={value} not implemented yet")]
    UnsupportedFeature { param: &'static str, value: String },

    #[error("modes have shape {found:?}, expected {expected:?} for the configured grid")]
    ModeShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("cotangent has shape {found:?}, expected {expected:?}")]
    CotangentShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl LptError {
    pub fn configuration<V: ToString>(param: &'static str, value: V) -> Self {
        Self::Configuration {
            param,
            value: value.to_string(),
        }
    }
    pub fn unsupported<V: ToString>(param: &'static str, value: V) -> Self {
        Self::UnsupportedFeature {
            param,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read run file: {path}")]
    Read { path: String },

    #[error("Unable to parse run file: {msg}")]
    Parse { msg: String },

    #[error("Invalid run parameter {param}={value}")]
    Invalid { param: &'static str, value: String },

    #[error("Invalid power table {path}: {source}")]
    PowerTable {
        path: String,
        #[source]
        source: PowerTableError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum PowerTableError {
    #[error("line {line}: expected two numbers")]
    Row { line: usize },

    #[error("{k} wavenumbers but {p} power values")]
    Length { k: usize, p: usize },

    #[error("need at least two rows")]
    TooShort,

    #[error("wavenumbers must be strictly increasing")]
    NotIncreasing,

    #[error("wavenumbers and power must be positive")]
    NotPositive,
}
