use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::asset::{BoundingBox, ParsedAsset};
use crate::format;
use crate::settings::{SessionConfig, VisualSettings};
use crate::visualiser::{FrameOutput, VisualiserState};

/// How long the driver waits for a file to decode.
const LOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a file and print a summary as JSON
    Inspect {
        /// PLY, XYZ, JSON, GLB or glTF file
        file: PathBuf,
    },

    /// Run headless frames with a file installed and write the final frame as JSON
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// PLY, XYZ, JSON, GLB or glTF file
    pub file: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 100)]
    pub frames: u32,

    /// Steam particle count
    #[arg(long)]
    pub density: Option<usize>,

    /// Steam speed multiplier
    #[arg(long)]
    pub speed: Option<f32>,

    /// Steam opacity
    #[arg(long)]
    pub intensity: Option<f32>,

    /// Pointer press in viewport pixels, as X,Y
    #[arg(long, value_parser = parse_point)]
    pub pick: Option<(f32, f32)>,

    /// Session configuration JSON
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Viewport width
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Output file for the final frame (stdout if omitted)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Summary printed by `inspect`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub file: String,
    pub format: &'static str,
    pub kind: &'static str,
    pub vertex_count: usize,
    pub bounds: BoundingBox,
    pub center: [f32; 3],
    pub size: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meshes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file } => {
            let summary = inspect(&file)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Simulate(args) => {
            let frame = simulate(&args)?;
            let json = serde_json::to_string_pretty(&frame)?;
            match &args.out {
                Some(path) => {
                    fs::write(path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Wrote frame {} to {}", frame.frame, path.display());
                }
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}

/// Decode `path` and summarize the result.
pub fn inspect(path: &Path) -> Result<AssetSummary> {
    let (bytes, name) = read_input(path)?;
    let asset = format::parse(&bytes, &name)?;
    let bounds = asset.bounds();

    let (meshes, nodes) = match &asset {
        ParsedAsset::Model(model) => (Some(model.meshes().len()), Some(model.nodes().len())),
        ParsedAsset::PointCloud { .. } => (None, None),
    };

    Ok(AssetSummary {
        file: name,
        format: asset.format().name(),
        kind: asset.kind(),
        vertex_count: asset.vertex_count(),
        bounds,
        center: bounds.center(),
        size: bounds.size(),
        meshes,
        nodes,
    })
}

/// Run a headless session over `args.file` and return the final frame.
pub fn simulate(args: &SimulateArgs) -> Result<FrameOutput> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };
    let settings = VisualSettings {
        density: args.density.unwrap_or(config.settings.density),
        speed: args.speed.unwrap_or(config.settings.speed),
        intensity: args.intensity.unwrap_or(config.settings.intensity),
        ..config.settings
    };

    let (bytes, name) = read_input(&args.file)?;
    let mut state = VisualiserState::new(config);
    state.resize(args.width as f32, args.height as f32)?;
    state.queue_settings(settings)?;
    state.load_file(bytes, &name)?;
    if !state.wait_for_load(LOAD_TIMEOUT) {
        bail!("Timed out decoding {}", name);
    }
    if let Some((x, y)) = args.pick {
        state.queue_pick(x, y)?;
    }

    let mut frame = state.step()?;
    if let Some(e) = state.last_load_error() {
        return Err(anyhow::Error::new(e.clone()).context(format!("Failed to load {}", name)));
    }
    for _ in 1..args.frames {
        frame = state.step()?;
    }

    log::info!(
        "Simulated {} frames, {} particles",
        state.frame_count(),
        frame.steam_vertices.len()
    );
    state.teardown();
    Ok(frame)
}

/// Read a session configuration file.
pub fn load_config(path: &Path) -> Result<SessionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: SessionConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

fn read_input(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok((bytes, name))
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse::<f32>().map_err(|e| format!("bad X: {}", e))?;
    let y = y.trim().parse::<f32>().map_err(|e| format!("bad Y: {}", e))?;
    Ok((x, y))
}
