//! sonoframe CLI
//!
//! Inspect frames, evaluate transform notation, list solver parameters and
//! run simulations without a host application.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sonoframe::{presets, Frame, RecordingRenderer};
use sonoframe_acoustic::{
    AxisymmetricSolver, CartesianSolver, RunOutcome, SimulationParameters, SolverKind, UnavailableEngine,
};
use sonoframe_chain::ArgPath;
use sonoframe_ir::{AttachmentConfig, FrameDocument, JsonFileSettings, ParamValue, SettingsStore, SolverConfig};
use sonoframe_math::{compose, parse_transforms, parse_transforms_strict, Point3, Transform};

#[derive(Parser)]
#[command(name = "sonoframe")]
#[command(about = "Kinematic frames and acoustic solver runs", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    /// 2D axisymmetric solver
    Axisymmetric,
    /// 3D Cartesian solver
    Cartesian,
}

impl From<Kind> for SolverKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Axisymmetric => SolverKind::Axisymmetric,
            Kind::Cartesian => SolverKind::Cartesian,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate transform notation such as "Tx50um Rz90deg"
    Transform {
        /// Notation string
        notation: String,
        /// Fail on malformed tokens instead of dropping them
        #[arg(long)]
        strict: bool,
        /// Point to map, as x,y,z
        #[arg(long, value_parser = parse_point)]
        point: Option<Point3>,
    },
    /// List chains with their end effectors and editable values
    Chain {
        /// Frame document (.json or .toml); the default frame when omitted
        #[arg(short, long)]
        frame: Option<PathBuf>,
        /// Only this chain
        #[arg(short, long)]
        name: Option<String>,
        /// Nudge before printing, as CHAIN:JOINT:INDEX:STEPS
        #[arg(long)]
        nudge: Vec<String>,
        /// Print the frame document as JSON after edits
        #[arg(long)]
        json: bool,
    },
    /// Show the layered parameters and grid of a solver
    Params {
        /// Solver kind
        #[arg(value_enum)]
        kind: Kind,
        /// Frame document; solver defaults when omitted
        #[arg(short, long)]
        frame: Option<PathBuf>,
        /// Chain carrying the solver
        #[arg(short, long)]
        chain: Option<String>,
        /// Override a parameter, as NAME=VALUE
        #[arg(long = "set")]
        overrides: Vec<String>,
    },
    /// Run a solver attached to a chain
    Simulate {
        /// Chain carrying the solver
        chain: String,
        /// Solver kind
        #[arg(value_enum)]
        kind: Kind,
        /// Frame document; the default frame when omitted
        #[arg(short, long)]
        frame: Option<PathBuf>,
        /// Artifact directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Write the input artifact for an external solver instead of solving
        #[arg(long)]
        external: bool,
    },
    /// Save, restore or list persisted frame state
    Settings {
        /// Settings file
        file: PathBuf,
        /// Frame document; the default frame when omitted
        #[arg(short, long)]
        frame: Option<PathBuf>,
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Store the frame's current state
    Save,
    /// Apply stored state to the frame and print the resulting end effectors
    Restore,
    /// Print every stored key
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Transform { notation, strict, point } => show_transform(&notation, strict, point)?,
        Commands::Chain {
            frame,
            name,
            nudge,
            json,
        } => show_chains(frame.as_deref(), name.as_deref(), &nudge, json)?,
        Commands::Params {
            kind,
            frame,
            chain,
            overrides,
        } => show_params(kind.into(), frame.as_deref(), chain.as_deref(), &overrides)?,
        Commands::Simulate {
            chain,
            kind,
            frame,
            cache_dir,
            external,
        } => simulate(&chain, kind.into(), frame.as_deref(), cache_dir, external)?,
        Commands::Settings { file, frame, action } => settings(&file, frame.as_deref(), action)?,
    }

    Ok(())
}

fn parse_point(s: &str) -> std::result::Result<Point3, String> {
    let v: Vec<f64> = s
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("{}: {}", c, e)))
        .collect::<std::result::Result<_, _>>()?;
    match v.as_slice() {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got {}", s)),
    }
}

fn load_document(path: Option<&Path>) -> Result<FrameDocument> {
    match path {
        Some(p) => FrameDocument::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(presets::default_frame()),
    }
}

fn load_frame(path: Option<&Path>) -> Result<Frame> {
    let doc = load_document(path)?;
    Ok(Frame::from_document(&doc, Arc::new(UnavailableEngine))?)
}

fn print_matrix(t: &Transform) {
    for row in t.to_rows() {
        println!("  [{:>12.6e} {:>12.6e} {:>12.6e} {:>12.6e}]", row[0], row[1], row[2], row[3]);
    }
}

// =============================================================================
// transform
// =============================================================================

fn show_transform(notation: &str, strict: bool, point: Option<Point3>) -> Result<()> {
    let steps = if strict {
        parse_transforms_strict(Some(notation))?
    } else {
        parse_transforms(Some(notation))
    };
    println!("{} step(s)", steps.len());
    let total = compose(&steps);
    print_matrix(&total);
    if let Some(p) = point {
        let q = total.apply_point(&p);
        println!("({}, {}, {}) -> ({:.6e}, {:.6e}, {:.6e})", p.x, p.y, p.z, q.x, q.y, q.z);
    }
    Ok(())
}

// =============================================================================
// chain
// =============================================================================

fn parse_nudge(text: &str) -> Result<(String, ArgPath, f64)> {
    let parts: Vec<&str> = text.split(':').collect();
    let [chain, joint, index, steps] = parts.as_slice() else {
        bail!("Expected CHAIN:JOINT:INDEX:STEPS, got '{}'", text);
    };
    let index: usize = index.parse().with_context(|| format!("bad index in '{}'", text))?;
    let steps: f64 = steps.parse().with_context(|| format!("bad steps in '{}'", text))?;
    Ok((chain.to_string(), ArgPath::new(*joint, index), steps))
}

fn show_chains(path: Option<&Path>, only: Option<&str>, nudges: &[String], json: bool) -> Result<()> {
    let mut frame = load_frame(path)?;
    for text in nudges {
        let (chain, arg, steps) = parse_nudge(text)?;
        let value = frame.nudge(&chain, &arg, steps)?;
        println!("{} {} -> {}", chain, arg, value);
    }

    let mut scene = RecordingRenderer::new();
    for error in frame.update_render(&mut scene) {
        eprintln!("warning: {}", error);
    }

    for name in frame.chain_names() {
        if only.is_some_and(|o| o != name) {
            continue;
        }
        let end = frame.end_transform(&name)?;
        let o = end.origin();
        let depth = frame
            .chains()
            .id_of(&name)
            .map_or(0, |id| frame.chains().depth(id));
        println!(
            "{}{} end=({:.6}, {:.6}, {:.6})",
            "  ".repeat(depth),
            name,
            o.x,
            o.y,
            o.z
        );
        if only.is_some() {
            print_matrix(&end);
        }
        for value in frame.editable_values(&name)? {
            println!("{}  {} = {}", "  ".repeat(depth), value.path, value.value);
        }
    }
    println!("{} drawable(s)", scene.len());

    if json {
        println!("{}", frame.document().to_json()?);
    }
    Ok(())
}

// =============================================================================
// params
// =============================================================================

fn parse_override(text: &str) -> Result<(String, ParamValue)> {
    let Some((name, raw)) = text.split_once('=') else {
        bail!("Expected NAME=VALUE, got '{}'", text);
    };
    let value = serde_json::from_str::<ParamValue>(raw).unwrap_or_else(|_| ParamValue::from(raw));
    Ok((name.to_string(), value))
}

fn solver_config(doc: &FrameDocument, chain: &str, kind: SolverKind) -> Result<SolverConfig> {
    let config = doc
        .chain(chain)
        .with_context(|| format!("no chain '{}'", chain))?;
    config
        .attachments
        .iter()
        .find_map(|a| match (kind, a) {
            (SolverKind::Axisymmetric, AttachmentConfig::AxisymmetricSolver(c)) => Some(c.clone()),
            (SolverKind::Cartesian, AttachmentConfig::CartesianSolver(c)) => Some(c.clone()),
            _ => None,
        })
        .with_context(|| format!("chain '{}' has no {} solver", chain, kind))
}

fn show_params(kind: SolverKind, path: Option<&Path>, chain: Option<&str>, overrides: &[String]) -> Result<()> {
    let mut config = match chain {
        Some(chain) => solver_config(&load_document(path)?, chain, kind)?,
        None => SolverConfig::default(),
    };
    for text in overrides {
        let (name, value) = parse_override(text)?;
        config.parameters.insert(name, value);
    }
    let params = SimulationParameters::layered(kind, &config);
    println!("{} parameters, hash {}", kind, params.short_hash());
    for (name, value) in params.values() {
        println!("  {:<36} {}", name, value);
    }

    let grid = match kind {
        SolverKind::Axisymmetric => AxisymmetricSolver::new(params).grid().cloned(),
        SolverKind::Cartesian => CartesianSolver::new(params, config.source).grid().cloned(),
    };
    match grid {
        Ok(g) => println!(
            "grid: dx={:.4e} m dims={:?} ppp={} dt={:.4e} s nt={}",
            g.dx, g.dims, g.ppp, g.dt, g.nt
        ),
        Err(e) => eprintln!("grid unavailable: {}", e),
    }
    Ok(())
}

// =============================================================================
// simulate
// =============================================================================

fn simulate(chain: &str, kind: SolverKind, path: Option<&Path>, cache_dir: Option<PathBuf>, external: bool) -> Result<()> {
    let mut doc = load_document(path)?;
    let Some(config) = doc.chains.iter_mut().find(|c| c.name == chain) else {
        bail!("no chain '{}'", chain);
    };
    for attachment in &mut config.attachments {
        let solver = match (kind, attachment) {
            (SolverKind::Axisymmetric, AttachmentConfig::AxisymmetricSolver(c)) => c,
            (SolverKind::Cartesian, AttachmentConfig::CartesianSolver(c)) => c,
            _ => continue,
        };
        if cache_dir.is_some() {
            solver.cache_dir = cache_dir.clone();
        }
        if external {
            solver
                .parameters
                .insert("run_through_external_cpp_solvers".into(), true.into());
        }
    }

    let mut frame = Frame::from_document(&doc, Arc::new(UnavailableEngine))?;
    frame.run_simulation(chain, kind)?;
    for report in frame.wait_simulations() {
        let solved = report.result?;
        match report.outcome {
            Some(RunOutcome::Computed) => println!("{} {}: computed", report.chain, report.kind),
            Some(RunOutcome::Cached(path)) => {
                println!("{} {}: read {}", report.chain, report.kind, path.display())
            }
            Some(RunOutcome::Pending { input, command }) => {
                println!("{} {}: wrote {}", report.chain, report.kind, input.display());
                println!("{}", command);
            }
            None => println!("{} {}: result dropped", report.chain, report.kind),
        }
        if solved {
            let mut scene = RecordingRenderer::new();
            for error in frame.update_render(&mut scene) {
                eprintln!("warning: {}", error);
            }
            println!("{} drawable(s): {}", scene.len(), scene.names().join(", "));
        }
    }
    Ok(())
}

// =============================================================================
// settings
// =============================================================================

fn settings(file: &Path, path: Option<&Path>, action: SettingsAction) -> Result<()> {
    let mut store = JsonFileSettings::open(file)?;
    match action {
        SettingsAction::Save => {
            let frame = load_frame(path)?;
            frame.save_settings(&mut store)?;
            store.save()?;
            println!("saved {} key(s) to {}", store.keys().len(), file.display());
        }
        SettingsAction::Restore => {
            let mut frame = load_frame(path)?;
            let applied = frame.restore_settings(&store);
            println!("applied {} stored value(s)", applied);
            for name in frame.chain_names() {
                let o = frame.end_transform(&name)?.origin();
                println!("{} end=({:.6}, {:.6}, {:.6})", name, o.x, o.y, o.z);
            }
        }
        SettingsAction::Show => {
            for key in store.keys() {
                if let Some(value) = store.get_value(&key) {
                    println!("{} = {}", key, value);
                }
            }
        }
    }
    Ok(())
}
