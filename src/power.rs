use crate::{
    error::{ConfigError, PowerTableError},
    util::log_interp,
};

/// Shape of the linear matter power spectrum at unit growth.
pub trait LinearPower: Send + Sync {
    fn power(&self, k: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatPower {
    pub amplitude: f64,
}

impl LinearPower for FlatPower {
    fn power(&self, _k: f64) -> f64 {
        self.amplitude
    }
}

/// `amplitude * (k / pivot)^index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLaw {
    pub amplitude: f64,
    pub index: f64,
    pub pivot: f64,
}

impl LinearPower for PowerLaw {
    fn power(&self, k: f64) -> f64 {
        if k == 0.0 {
            // keep the mean mode finite for red spectra
            return if self.index > 0.0 { 0.0 } else { self.amplitude };
        }
        self.amplitude * (k / self.pivot).powf(self.index)
    }
}

/// Power interpolated log-log in a `(k, P)` table, zero outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedPower {
    k: Vec<f64>,
    p: Vec<f64>,
}

impl TabulatedPower {
    pub fn from_columns(k: Vec<f64>, p: Vec<f64>) -> Result<Self, PowerTableError> {
        if k.len() != p.len() {
            return Err(PowerTableError::Length {
                k: k.len(),
                p: p.len(),
            });
        }
        if k.len() < 2 {
            return Err(PowerTableError::TooShort);
        }
        if k.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PowerTableError::NotIncreasing);
        }
        if k[0] <= 0.0 || p.iter().any(|&v| v <= 0.0) {
            return Err(PowerTableError::NotPositive);
        }
        Ok(Self { k, p })
    }

    /// Parses whitespace separated `k P` rows. Blank lines and lines starting
    /// with `#` are skipped.
    pub fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        let err = |source| ConfigError::PowerTable {
            path: path.to_string(),
            source,
        };
        let mut k = vec![];
        let mut p = vec![];
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split_whitespace().map(str::parse::<f64>);
            match (cols.next(), cols.next()) {
                (Some(Ok(kv)), Some(Ok(pv))) => {
                    k.push(kv);
                    p.push(pv);
                }
                _ => return Err(err(PowerTableError::Row { line: lineno + 1 })),
            }
        }
        Self::from_columns(k, p).map_err(err)
    }

    pub fn k_range(&self) -> (f64, f64) {
        (self.k[0], self.k[self.k.len() - 1])
    }
}

impl LinearPower for TabulatedPower {
    fn power(&self, k: f64) -> f64 {
        log_interp(&self.k, &self.p, k).unwrap_or(0.0)
    }
}

impl<P: LinearPower + ?Sized> LinearPower for Box<P> {
    fn power(&self, k: f64) -> f64 {
        (**self).power(k)
    }
}
