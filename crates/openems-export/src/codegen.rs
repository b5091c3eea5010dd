//! Python code generation for openEMS / CSXCAD simulations

use crate::compile::{Compiled, Primitive};
use crate::grid::Grid;
use crate::{CompileConfig, Excitation};
use anyhow::{Context, Result};
use minijinja::{context, Environment};
use std::fs;
use std::path::{Path, PathBuf};

const OPENEMS_TEMPLATE: &str = r##"#!/usr/bin/env python3
"""
openEMS FDTD Simulation - Auto-generated from a tagged scene
{{ header_comment }}

Generated: {{ timestamp }}
Scene unit: {{ unit }} (delta unit {{ delta_unit }} m)
"""

import argparse
import os

from CSXCAD import ContinuousStructure
from openEMS import openEMS

# =============================================================================
# Simulation Parameters
# =============================================================================

NR_TS = {{ max_timesteps }}
END_CRITERIA = {{ end_criteria }}
BOUNDARIES = [{{ boundaries }}]
{% if excitation.type == "gauss" %}
F0 = {{ excitation.f0 }}  # Hz
FC = {{ excitation.fc }}  # Hz
{% else %}
F0 = {{ excitation.f0 }}  # Hz
{% endif %}


def build_simulation():
    """Build the FDTD solver and the CSXCAD structure."""
    FDTD = openEMS(NrTS=NR_TS, EndCriteria=END_CRITERIA)
{% if excitation.type == "gauss" %}
    FDTD.SetGaussExcite(F0, FC)
{% else %}
    FDTD.SetSineExcite(F0)
{% endif %}
    FDTD.SetBoundaryCond(BOUNDARIES)

    CSX = ContinuousStructure()
    FDTD.SetCSX(CSX)

    # =========================================================================
    # Grid
    # =========================================================================

    mesh = CSX.GetGrid()
    mesh.SetDeltaUnit({{ delta_unit }})
    mesh.AddLine('x', [{{ grid.x }}])
    mesh.AddLine('y', [{{ grid.y }}])
    mesh.AddLine('z', [{{ grid.z }}])

    # =========================================================================
    # Primitives
    # =========================================================================

    ports = []
{% for p in primitives %}

    # {{ p.object }} ({{ p.kind }})
{% if p.kind == "metal_surface" %}
    prop = CSX.AddMetal('{{ p.name }}')
    prop.AddPolygon([[{{ p.u }}], [{{ p.v }}]], '{{ p.axis }}', {{ p.elevation }}, priority=10)
{% elif p.kind == "metal_edge" %}
    prop = CSX.AddMetal('{{ p.name }}')
    prop.AddCurve([[{{ p.x }}], [{{ p.y }}], [{{ p.z }}]], priority=10)
{% elif p.kind == "metal_volume" %}
    prop = CSX.AddMetal('{{ p.name }}')
    solid = prop.AddPolyhedronReader({{ p.path }}, priority=10)
    solid.ReadFile()
{% elif p.kind == "material" %}
    prop = CSX.AddMaterial('{{ p.name }}', epsilon={{ p.epsilon }}
        {%- if p.kappa %}, kappa={{ p.kappa }}{% endif %})
    solid = prop.AddPolyhedronReader({{ p.path }}, priority=5)
    solid.ReadFile()
{% elif p.kind == "dump_box" %}
    prop = CSX.AddDump('{{ p.name }}', dump_type={{ p.dump_type }})
    prop.AddBox([{{ p.start }}], [{{ p.stop }}])
{% elif p.kind == "port" %}
    ports.append(FDTD.AddLumpedPort({{ p.number }}, {{ p.impedance }},
        {#- #} [{{ p.start }}], [{{ p.stop }}], '{{ p.axis }}', excite={{ p.excite }}, priority=5))
{% endif %}
{% endfor %}

    return FDTD, CSX, ports


# =============================================================================
# Entry Point
# =============================================================================

if __name__ == "__main__":
    parser = argparse.ArgumentParser(description="openEMS FDTD Simulation")
    parser.add_argument("--output", type=str, default="output", help="Simulation directory")
    parser.add_argument("--preview", action="store_true", help="Write the structure and exit")

    args = parser.parse_args()

    FDTD, CSX, ports = build_simulation()
    os.makedirs(args.output, exist_ok=True)

    if args.preview:
        CSX.Write2XML(os.path.join(args.output, "structure.xml"))
    else:
        FDTD.Run(args.output, cleanup=True)
"##;

/// Everything the solver needs for one run
#[derive(Debug, Clone, Copy)]
pub struct SolverJob<'a> {
    pub grid: &'a Grid,
    pub primitives: &'a [Primitive],
    pub config: &'a CompileConfig,
}

impl<'a> SolverJob<'a> {
    pub fn new(compiled: &'a Compiled, config: &'a CompileConfig) -> Self {
        Self {
            grid: &compiled.grid,
            primitives: &compiled.primitives,
            config,
        }
    }
}

/// Hands a compiled job to a solver. Fire-and-forget: results of the run
/// itself never come back through this trait.
pub trait SolverAdapter {
    fn submit(&self, job: &SolverJob) -> Result<()>;
}

/// Writes the job as a standalone openEMS Python script
#[derive(Debug, Clone)]
pub struct ScriptAdapter {
    pub output: PathBuf,
}

impl ScriptAdapter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self { output: output.into() }
    }
}

impl SolverAdapter for ScriptAdapter {
    fn submit(&self, job: &SolverJob) -> Result<()> {
        let script = generate_openems_script(job)?;
        if let Some(dir) = self.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        fs::write(&self.output, script)
            .with_context(|| format!("Failed to write {:?}", self.output))?;
        tracing::info!("Wrote openEMS script to {:?}", self.output);
        Ok(())
    }
}

/// Python float literal. Rust's shortest round-trip formatting is
/// valid Python.
fn num(value: f64) -> String {
    let s = format!("{}", value);
    if s.contains(['.', 'e', 'i', 'N']) {
        s
    } else {
        format!("{}.0", s)
    }
}

fn num_list<'a>(values: impl IntoIterator<Item = &'a f64>) -> String {
    values.into_iter().map(|v| num(*v)).collect::<Vec<_>>().join(", ")
}

/// Double-quoted Python string literal
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // control characters all sit below U+00A0
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn py_path(path: &Path) -> String {
    py_str(&path.to_string_lossy())
}

/// CSXCAD property name: object name plus a per-primitive suffix
fn prop_name(object: &str, index: usize) -> String {
    let clean: String = object
        .chars()
        .map(|c| if c == '\'' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("{}_{}", clean, index)
}

fn primitive_data(index: usize, primitive: &Primitive) -> serde_json::Value {
    let name = prop_name(primitive.object(), index);
    let object = primitive.object();
    match primitive {
        Primitive::MetalSurface { plane, .. } => serde_json::json!({
            "kind": "metal_surface",
            "object": object,
            "name": name,
            "axis": plane.axis.as_str(),
            "elevation": num(plane.elevation),
            "u": num_list(plane.points.iter().map(|p| &p[0])),
            "v": num_list(plane.points.iter().map(|p| &p[1])),
        }),
        Primitive::MetalEdge { points, .. } => serde_json::json!({
            "kind": "metal_edge",
            "object": object,
            "name": name,
            "x": num_list(points.iter().map(|p| &p[0])),
            "y": num_list(points.iter().map(|p| &p[1])),
            "z": num_list(points.iter().map(|p| &p[2])),
        }),
        Primitive::MetalVolume { solid, .. } => serde_json::json!({
            "kind": "metal_volume",
            "object": object,
            "name": name,
            "path": py_path(&solid.path),
        }),
        Primitive::Material {
            solid, epsilon_r, kappa, ..
        } => serde_json::json!({
            "kind": "material",
            "object": object,
            "name": name,
            "path": py_path(&solid.path),
            "epsilon": num(*epsilon_r),
            "kappa": kappa.map(num),
        }),
        Primitive::DumpBox { bbox, kind, .. } => serde_json::json!({
            "kind": "dump_box",
            "object": object,
            "name": name,
            "dump_type": kind.dump_type(),
            "start": num_list(&bbox.min),
            "stop": num_list(&bbox.max),
        }),
        Primitive::Port {
            number,
            bbox,
            direction,
            impedance,
            active,
            ..
        } => {
            // the lumped port excites from start towards stop
            let (start, stop) = if direction.is_reversed() {
                (&bbox.max, &bbox.min)
            } else {
                (&bbox.min, &bbox.max)
            };
            let excite = if *active { "1.0" } else { "0" };
            serde_json::json!({
                "kind": "port",
                "object": object,
                "name": name,
                "number": number,
                "impedance": num(*impedance),
                "start": num_list(start),
                "stop": num_list(stop),
                "axis": direction.axis().as_str(),
                "excite": excite,
            })
        }
    }
}

/// Generate an openEMS Python script from a compiled job
pub fn generate_openems_script(job: &SolverJob) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("openems", OPENEMS_TEMPLATE)?;

    let template = env.get_template("openems")?;
    let config = job.config;

    let primitives: Vec<_> = job
        .primitives
        .iter()
        .enumerate()
        .map(|(i, p)| primitive_data(i, p))
        .collect();

    let excitation = match config.excitation {
        Excitation::Gauss { f0_mhz, fc_mhz } => serde_json::json!({
            "type": "gauss",
            "f0": num(f0_mhz * 1e6),
            "fc": num(fc_mhz * 1e6),
        }),
        Excitation::Sine { f0_mhz } => serde_json::json!({
            "type": "sine",
            "f0": num(f0_mhz * 1e6),
        }),
    };

    let boundaries = config
        .boundaries
        .iter()
        .map(|b| format!("'{}'", b.as_openems()))
        .collect::<Vec<_>>()
        .join(", ");

    let output = template.render(context! {
        header_comment => format!("{} primitives", job.primitives.len()),
        timestamp => chrono::Utc::now().to_rfc3339(),
        unit => config.unit.symbol(),
        delta_unit => num(job.grid.delta_unit),
        max_timesteps => config.max_timesteps,
        end_criteria => num(config.end_criteria),
        boundaries => boundaries,
        excitation => excitation,
        grid => context! {
            x => num_list(job.grid.x.iter()),
            y => num_list(job.grid.y.iter()),
            z => num_list(job.grid.z.iter()),
        },
        primitives => primitives,
    })?;

    Ok(output)
}
