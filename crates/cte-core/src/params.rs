//! Trap characterization and correction parameters.
//!
//! The parameter bundle is produced by an external reference-table loader
//! and handed to the engine fully populated. For tests and the command-line
//! driver it can also be read from YAML:
//!
//! ```yaml
//! n_par: 7
//! n_forward: 5
//! thresh: -10.0
//! rn_amp: 3.25
//! fix_rocr: true
//! scale_frac: 0.42
//! traps:
//!   cte_len: 3
//!   qlevq: [5.0, 50.0]
//!   dpdew: [1.0, 1.0]
//!   rprof: [0.5, 0.3, 0.2, 0.5, 0.3, 0.2]
//!   cprof: [0.5, 0.2, 0.0, 0.5, 0.2, 0.0]
//! scales:
//!   scale512: [1.0, 1.0]
//!   scale1024: [1.0, 1.0]
//!   scale1536: [1.0, 1.0]
//!   scale2048: [1.0, 1.0]
//! ```
//!
//! Profile tables are flat, addressed as `profile[trap * cte_len + t]`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Per-trap parameters and trail release profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapCharacterization {
    /// Number of transfers a released trail extends over.
    pub cte_len: usize,
    /// Charge threshold per trap, ascending.
    pub qlevq: Vec<f64>,
    /// Trap density per trap.
    pub dpdew: Vec<f64>,
    /// Differential release profile, `cte_traps * cte_len` entries.
    pub rprof: Vec<f64>,
    /// Cumulative release profile, `cte_traps * cte_len` entries.
    pub cprof: Vec<f64>,
}

impl TrapCharacterization {
    /// Number of traps.
    #[inline]
    pub fn cte_traps(&self) -> usize {
        self.qlevq.len()
    }

    /// Differential release for trap `w` at tail position `t`.
    #[inline(always)]
    pub fn rprof(&self, w: usize, t: usize) -> f64 {
        self.rprof[w * self.cte_len + t]
    }

    /// Cumulative release for trap `w` at tail position `t`.
    #[inline(always)]
    pub fn cprof(&self, w: usize, t: usize) -> f64 {
        self.cprof[w * self.cte_len + t]
    }

    /// Checks table sizes and ordering.
    pub fn validate(&self) -> Result<()> {
        if self.qlevq.is_empty() {
            return Err(Error::allocation_problem("trap characterization has no traps"));
        }
        if self.cte_len == 0 {
            return Err(Error::invalid_parameter("cte_len must be >= 1"));
        }
        let traps = self.cte_traps();
        if self.dpdew.len() != traps {
            return Err(Error::size_mismatch(format!(
                "dpdew has {} entries for {} traps",
                self.dpdew.len(),
                traps
            )));
        }
        let table = traps * self.cte_len;
        for (name, prof) in [("rprof", &self.rprof), ("cprof", &self.cprof)] {
            if prof.len() != table {
                return Err(Error::size_mismatch(format!(
                    "{name} has {} entries, expected {traps}x{}",
                    prof.len(),
                    self.cte_len
                )));
            }
        }
        if self.qlevq.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid_parameter("qlevq must be sorted ascending"));
        }
        Ok(())
    }
}

/// Column scale curves measured at the reference rows 512/1024/1536/2048.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnScales {
    /// Scaling appropriate at row 512.
    pub scale512: Vec<f64>,
    /// Scaling appropriate at row 1024.
    pub scale1024: Vec<f64>,
    /// Scaling appropriate at row 1536.
    pub scale1536: Vec<f64>,
    /// Scaling appropriate at row 2048.
    pub scale2048: Vec<f64>,
}

impl ColumnScales {
    /// Curves with the same value in every column.
    pub fn uniform(n_columns: usize, value: f64) -> Self {
        Self {
            scale512: vec![value; n_columns],
            scale1024: vec![value; n_columns],
            scale1536: vec![value; n_columns],
            scale2048: vec![value; n_columns],
        }
    }

    /// Number of columns covered by the curves.
    pub fn len(&self) -> usize {
        self.scale512.len()
    }

    /// Returns `true` if no curve data is present.
    pub fn is_empty(&self) -> bool {
        self.scale512.is_empty()
    }

    /// The four curves in reference-row order.
    pub fn curves(&self) -> [&[f64]; 4] {
        [&self.scale512, &self.scale1024, &self.scale1536, &self.scale2048]
    }

    /// Checks that all four curves cover the same columns.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        if self.curves().iter().any(|c| c.len() != n) {
            return Err(Error::size_mismatch(format!(
                "column scale curves differ in length: {}/{}/{}/{}",
                self.scale512.len(),
                self.scale1024.len(),
                self.scale1536.len(),
                self.scale2048.len()
            )));
        }
        Ok(())
    }
}

/// Full parameter bundle for one correction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CteParameters {
    /// Reference table name, informational.
    #[serde(default)]
    pub name: Option<String>,
    /// Physical transfer clocks simulated per readout call.
    #[serde(default = "default_n_par")]
    pub n_par: u32,
    /// Inversion iteration count.
    #[serde(default = "default_n_forward")]
    pub n_forward: u32,
    /// CR over-subtraction threshold.
    #[serde(default = "default_thresh")]
    pub thresh: f64,
    /// Readnoise amplitude.
    #[serde(default = "default_rn_amp")]
    pub rn_amp: f64,
    /// Enable readout-CR mitigation.
    #[serde(default = "default_fix_rocr")]
    pub fix_rocr: bool,
    /// Noise mitigation model; only 0 is implemented.
    #[serde(default)]
    pub noise_mit: u32,
    /// Time-dependent trap density scale.
    #[serde(default = "default_scale_frac")]
    pub scale_frac: f64,
    /// Row of the image's first row within the full detector.
    #[serde(default)]
    pub row_offset: usize,
    /// Column of the image's first column within the scale curves.
    #[serde(default)]
    pub column_offset: usize,
    /// Trap characterization.
    pub traps: TrapCharacterization,
    /// Column scale curves for the trap pixel map.
    #[serde(default)]
    pub scales: ColumnScales,
}

fn default_n_par() -> u32 {
    7
}

fn default_n_forward() -> u32 {
    5
}

fn default_thresh() -> f64 {
    -10.0
}

fn default_rn_amp() -> f64 {
    3.25
}

fn default_fix_rocr() -> bool {
    true
}

fn default_scale_frac() -> f64 {
    1.0
}

impl CteParameters {
    /// Bundle with default knobs around the given traps and scales.
    pub fn new(traps: TrapCharacterization, scales: ColumnScales) -> Self {
        Self {
            name: None,
            n_par: default_n_par(),
            n_forward: default_n_forward(),
            thresh: default_thresh(),
            rn_amp: default_rn_amp(),
            fix_rocr: default_fix_rocr(),
            noise_mit: 0,
            scale_frac: default_scale_frac(),
            row_offset: 0,
            column_offset: 0,
            traps,
            scales,
        }
    }

    /// Loads parameters from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading CTE parameters");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parses and validates parameters from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    /// Serializes the bundle to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks every knob and table.
    pub fn validate(&self) -> Result<()> {
        self.traps.validate()?;
        self.scales.validate()?;
        if self.n_par == 0 {
            return Err(Error::invalid_parameter("n_par must be >= 1"));
        }
        if self.n_forward == 0 {
            return Err(Error::invalid_parameter("n_forward must be >= 1"));
        }
        if self.noise_mit != 0 {
            return Err(Error::invalid_parameter(format!(
                "noise mitigation model {} not implemented, only 0",
                self.noise_mit
            )));
        }
        if !self.rn_amp.is_finite() || self.rn_amp < 0.0 {
            return Err(Error::invalid_parameter(format!("rn_amp {} out of range", self.rn_amp)));
        }
        if !self.thresh.is_finite() || !self.scale_frac.is_finite() {
            return Err(Error::invalid_parameter("thresh and scale_frac must be finite"));
        }
        Ok(())
    }
}

/// Fraction of the trap growth between the two reference dates reached at
/// `expstart` (all MJD).
///
/// ```rust
/// use cte_core::params::scale_fraction;
///
/// let f = scale_fraction(55_500.0, 55_000.0, 56_000.0).unwrap();
/// assert!((f - 0.5).abs() < 1e-12);
/// ```
pub fn scale_fraction(expstart: f64, date0: f64, date1: f64) -> Result<f64> {
    let span = date1 - date0;
    if !span.is_finite() || span == 0.0 {
        return Err(Error::invalid_parameter(format!(
            "degenerate CTE date range {date0}..{date1}"
        )));
    }
    Ok((expstart - date0) / span)
}
