//! openems-export: Compile tagged 3D scenes into openEMS FDTD simulations
//!
//! This crate provides:
//! - Parsing of serialized scene snapshots (JSON)
//! - Axis-aligned primitive extraction and procedural attribute aggregation
//! - Non-uniform rectilinear grid construction with smoothing
//! - Python script generation for openEMS / CSXCAD
//!
//! Geometry stays in scene units throughout; the grid carries the
//! metres-per-unit factor (`SetDeltaUnit`) for the solver.

pub mod aggregate;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod scene;
pub mod solid;

pub use codegen::{generate_openems_script, ScriptAdapter, SolverAdapter, SolverJob};
pub use compile::{
    compile, CompileReport, CompileSession, CompileStatus, Compiled, PortHandle, Primitive,
};
pub use error::{AttributeError, CompileError, ConfigError, ObjectError, SceneError, SolidError};
pub use geometry::{get_axis, Aabb, Axis, AxisPlane};
pub use grid::{smooth_lines, Grid, GridBuilder, LineSet, Smoothing};
pub use scene::{JsonScene, LineObject, Mesh, Role, Scene, SceneObject, SceneProvider};
pub use solid::{SolidStore, StlStore};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Speed of light in vacuum (m/s)
pub const C0: f64 = 299_792_458.0;

/// Main entry point: compile a JSON scene and generate an openEMS Python script
pub fn translate(json: &str, config: &CompileConfig) -> Result<(String, CompileReport)> {
    let provider = JsonScene::from_json(json)?;
    let store = StlStore::new(&config.solid_dir);
    let (compiled, _session) = compile(&provider, &store, config, CompileSession::new())?;
    let script = generate_openems_script(&SolverJob::new(&compiled, config))?;
    Ok((script, compiled.report))
}

/// Grid preview wireframe of a scene.
///
/// Runs the full compile so the preview shows the same lines the solver
/// gets, procedural anchors included.
pub fn preview<P: SceneProvider + ?Sized>(provider: &P, config: &CompileConfig) -> Result<Mesh> {
    let store = StlStore::new(&config.solid_dir);
    let (compiled, _session) = compile(provider, &store, config, CompileSession::new())?;
    Ok(compiled.grid.preview())
}

/// Wavelength in `unit` for a frequency in MHz
pub fn wavelength(freq_mhz: f64, unit: LengthUnit) -> f64 {
    unit.from_meters(C0 / (freq_mhz * 1e6))
}

/// Configuration for the compile and the generated simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Length unit of the scene (default: mm)
    pub unit: LengthUnit,
    /// Grid smoothing
    pub smoothing: Smoothing,
    /// Vertex group whose members become fixed grid lines
    pub anchor_group: String,
    /// Directory for the round-tripped solids
    pub solid_dir: PathBuf,
    /// Excitation signal
    pub excitation: Excitation,
    /// Boundary conditions: x-min, x-max, y-min, y-max, z-min, z-max
    pub boundaries: [Boundary; 6],
    /// Energy decay at which the solver stops
    pub end_criteria: f64,
    /// Timestep limit
    pub max_timesteps: u64,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            unit: LengthUnit::Millimeter,
            smoothing: Smoothing::default(),
            anchor_group: "anchor".to_string(),
            solid_dir: std::env::temp_dir().join("scene-to-openems"),
            excitation: Excitation::default(),
            boundaries: [Boundary::Mur; 6],
            end_criteria: 1e-4,
            max_timesteps: 1_000_000,
        }
    }
}

impl CompileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.smoothing;
        if !s.max_res.is_finite() || s.max_res <= 0.0 {
            return Err(ConfigError::MaxRes(s.max_res));
        }
        if !s.ratio.is_finite() || s.ratio <= 1.0 {
            return Err(ConfigError::Ratio(s.ratio));
        }
        if !self.end_criteria.is_finite() || self.end_criteria <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "end_criteria",
                value: self.end_criteria,
            });
        }
        if self.max_timesteps == 0 {
            return Err(ConfigError::MaxTimesteps);
        }
        match self.excitation {
            Excitation::Gauss { f0_mhz, fc_mhz } => {
                positive("f0_mhz", f0_mhz)?;
                positive("fc_mhz", fc_mhz)?;
            }
            Excitation::Sine { f0_mhz } => positive("f0_mhz", f0_mhz)?,
        }
        Ok(())
    }

    /// Metres per scene unit
    pub fn delta_unit(&self) -> f64 {
        self.unit.to_meters(1.0)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

/// Excitation signal (frequencies in MHz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Excitation {
    /// Gaussian pulse: center frequency and 20 dB cutoff half-width
    Gauss { f0_mhz: f64, fc_mhz: f64 },
    Sine { f0_mhz: f64 },
}

impl Default for Excitation {
    fn default() -> Self {
        Excitation::Gauss {
            f0_mhz: 868.0,
            fc_mhz: 1736.0,
        }
    }
}

impl Excitation {
    pub fn center_mhz(&self) -> f64 {
        match self {
            Excitation::Gauss { f0_mhz, .. } | Excitation::Sine { f0_mhz } => *f0_mhz,
        }
    }
}

/// Domain boundary condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    Pec,
    Pmc,
    Mur,
    #[serde(rename = "pml_8")]
    Pml8,
}

impl Boundary {
    /// Name understood by `SetBoundaryCond`
    pub fn as_openems(&self) -> &'static str {
        match self {
            Boundary::Pec => "PEC",
            Boundary::Pmc => "PMC",
            Boundary::Mur => "MUR",
            Boundary::Pml8 => "PML_8",
        }
    }
}

impl FromStr for Boundary {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pec" => Ok(Boundary::Pec),
            "pmc" => Ok(Boundary::Pmc),
            "mur" => Ok(Boundary::Mur),
            "pml_8" | "pml8" | "pml" => Ok(Boundary::Pml8),
            _ => anyhow::bail!("Unknown boundary: {}. Use: pec, pmc, mur, or pml_8", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "um", alias = "µm")]
    Micrometer,
    #[serde(rename = "nm")]
    Nanometer,
}

impl LengthUnit {
    /// Convert from this unit to meters
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Meter => value,
            LengthUnit::Millimeter => value * 1e-3,
            LengthUnit::Micrometer => value * 1e-6,
            LengthUnit::Nanometer => value * 1e-9,
        }
    }

    /// Convert from meters to this unit
    pub fn from_meters(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Meter => value,
            LengthUnit::Millimeter => value * 1e3,
            LengthUnit::Micrometer => value * 1e6,
            LengthUnit::Nanometer => value * 1e9,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            LengthUnit::Meter => "m",
            LengthUnit::Millimeter => "mm",
            LengthUnit::Micrometer => "um",
            LengthUnit::Nanometer => "nm",
        }
    }
}

impl FromStr for LengthUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "m" | "meter" | "meters" => Ok(LengthUnit::Meter),
            "mm" | "millimeter" | "millimeters" => Ok(LengthUnit::Millimeter),
            "um" | "µm" | "micrometer" | "micrometers" => Ok(LengthUnit::Micrometer),
            "nm" | "nanometer" | "nanometers" => Ok(LengthUnit::Nanometer),
            _ => anyhow::bail!("Unknown unit: {}. Use: m, mm, um, or nm", s),
        }
    }
}
