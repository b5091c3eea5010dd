//! scene-to-openems: CLI tool for compiling tagged scenes into openEMS simulations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openems_export::{
    compile, generate_openems_script, preview, CompileConfig, CompileSession, CompileStatus,
    JsonScene, LineObject, ScriptAdapter, SolverAdapter, SolverJob, StlStore,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scene-to-openems")]
#[command(about = "Compile tagged 3D scenes into openEMS FDTD simulations")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a scene into an openEMS Python script
    Compile {
        /// Input JSON file (serialized scene)
        #[arg(short, long)]
        input: PathBuf,

        /// Output Python file
        #[arg(short, long, default_value = "simulation.py")]
        output: PathBuf,

        #[command(flatten)]
        options: CompileOptions,

        /// Print generated script to stdout instead of file
        #[arg(long)]
        stdout: bool,
    },

    /// Print a starter line object for a center frequency
    Lines {
        /// Center frequency in MHz
        #[arg(long)]
        freq: f64,

        /// Scene length unit (m, mm, um, nm)
        #[arg(long, default_value = "mm")]
        unit: String,
    },

    /// Write the grid preview wireframe of a scene as JSON
    Preview {
        /// Input JSON file (serialized scene)
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: CompileOptions,
    },
}

/// Overrides for the settings stored in the scene
#[derive(clap::Args, Debug)]
struct CompileOptions {
    /// Directory for exported solids
    #[arg(long)]
    solid_dir: Option<PathBuf>,

    /// Scene length unit (m, mm, um, nm)
    #[arg(long)]
    unit: Option<String>,

    /// Maximum grid spacing, in scene units
    #[arg(long)]
    max_res: Option<f64>,

    /// Maximum ratio between neighbouring cells
    #[arg(long)]
    ratio: Option<f64>,

    /// Keep only the fixed grid lines
    #[arg(long)]
    no_smooth: bool,
}

/// Scene settings first, then command line overrides
fn build_config(provider: &JsonScene, options: CompileOptions) -> Result<CompileConfig> {
    let mut config = provider.scene().settings.clone().unwrap_or_default();
    if let Some(dir) = options.solid_dir {
        config.solid_dir = dir;
    }
    if let Some(unit) = options.unit {
        config.unit = unit.parse()?;
    }
    if let Some(max_res) = options.max_res {
        config.smoothing.max_res = max_res;
    }
    if let Some(ratio) = options.ratio {
        config.smoothing.ratio = ratio;
    }
    if options.no_smooth {
        config.smoothing.enabled = false;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match args.command {
        Command::Compile {
            input,
            output,
            options,
            stdout,
        } => {
            let provider = JsonScene::from_path(&input)
                .with_context(|| format!("Failed to read input file: {:?}", input))?;
            let config = build_config(&provider, options)?;
            let store = StlStore::new(&config.solid_dir);

            let (compiled, _session) = compile(&provider, &store, &config, CompileSession::new())
                .context("Compile failed")?;
            for issue in compiled.report.issues.iter() {
                eprintln!("skipped {}", issue);
            }
            for warning in compiled.report.warnings.iter() {
                eprintln!("warning {}", warning);
            }
            if compiled.report.status == CompileStatus::Failed {
                anyhow::bail!(
                    "No primitives compiled, {} objects skipped",
                    compiled.report.issues.len()
                );
            }

            let job = SolverJob::new(&compiled, &config);
            if stdout {
                println!("{}", generate_openems_script(&job)?);
            } else {
                ScriptAdapter::new(&output).submit(&job)?;
                eprintln!(
                    "Generated openEMS script: {:?} ({} primitives, {} cells)",
                    output,
                    compiled.primitives.len(),
                    compiled.grid.cell_count()
                );
            }
        }
        Command::Lines { freq, unit } => {
            let unit = unit.parse()?;
            let (lines, max_res) = LineObject::default_for(freq, unit);
            let json = serde_json::json!({
                "lines": lines,
                "max_res": max_res,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Preview {
            input,
            output,
            options,
        } => {
            let provider = JsonScene::from_path(&input)
                .with_context(|| format!("Failed to read input file: {:?}", input))?;
            let config = build_config(&provider, options)?;
            let wireframe = preview(&provider, &config).context("Compile failed")?;

            let json = serde_json::to_string_pretty(&wireframe)?;
            fs::write(&output, json)
                .with_context(|| format!("Failed to write output file: {:?}", output))?;
            eprintln!("Generated grid preview: {:?}", output);
        }
    }

    Ok(())
}
