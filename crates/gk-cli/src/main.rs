use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use gk_core::{
    GestureCombinations, GestureError, Pose, Quaternion, StrokeOutcome, TrainingObserver, Vec3,
};
use gk_store::{EngineConfig, Store};

#[derive(Parser)]
#[command(name = "gk", about = "gesturekit gesture database CLI")]
struct Cli {
    /// Override the database file path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Number of parts when creating a fresh database
    #[arg(long, global = true, default_value_t = 1)]
    parts: usize,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new gesture
    Create {
        /// Gesture name
        name: String,
        /// Part (hand/side) the gesture belongs to
        #[arg(long, default_value_t = 0)]
        part: usize,
    },

    /// List registered gestures and combinations
    List,

    /// Record a stroke file as a sample of a gesture
    Record {
        /// Target gesture id
        gesture: u32,
        /// Stroke file (JSON array of frames)
        stroke: PathBuf,
        #[arg(long, default_value_t = 0)]
        part: usize,
    },

    /// Identify a stroke file against the trained model
    Identify {
        /// Stroke file (JSON array of frames)
        stroke: PathBuf,
        #[arg(long, default_value_t = 0)]
        part: usize,
    },

    /// Train the recognition model on all recorded samples
    Train {
        /// Wall-clock bound in seconds
        #[arg(long)]
        max_seconds: Option<u64>,
    },

    /// Show database statistics
    Stats,

    /// Export the database to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import a JSON file, replacing or merging the database
    Import {
        /// Input file path
        path: PathBuf,
        /// Merge by gesture name instead of replacing
        #[arg(long)]
        merge: bool,
    },

    /// Print the engine version
    Version,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Create { name, part } => cmd_create(&cli, name, *part),
        Commands::List => cmd_list(&cli),
        Commands::Record {
            gesture,
            stroke,
            part,
        } => cmd_record(&cli, *gesture, stroke, *part),
        Commands::Identify { stroke, part } => cmd_identify(&cli, stroke, *part),
        Commands::Train { max_seconds } => cmd_train(&cli, *max_seconds),
        Commands::Stats => cmd_stats(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path, merge } => cmd_import(&cli, path, *merge),
        Commands::Version => {
            println!("{}", gk_core::VERSION);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Database plumbing
// ---------------------------------------------------------------------------

fn db_path(cli: &Cli) -> PathBuf {
    cli.db
        .clone()
        .unwrap_or_else(|| gk_store::data_dir().join("gestures.db"))
}

fn open_system(cli: &Cli) -> Result<GestureCombinations> {
    let path = db_path(cli);
    if path.exists() {
        let store = Store::open_existing(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        store.load_system().context("failed to load gesture database")
    } else {
        let mut system = GestureCombinations::new(cli.parts.max(1))
            .map_err(|e| anyhow::anyhow!("invalid part count: {e}"))?;
        let config = EngineConfig::load(&gk_store::data_dir())?;
        config.apply(&mut system)?;
        Ok(system)
    }
}

fn save_system(cli: &Cli, system: &GestureCombinations) -> Result<()> {
    let path = db_path(cli);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store =
        Store::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    store.save_system(system).context("failed to save gesture database")
}

// ---------------------------------------------------------------------------
// Stroke files
// ---------------------------------------------------------------------------

/// One frame of a recorded stroke file. Only the position is mandatory.
#[derive(Deserialize)]
struct StrokeRecord {
    p: [f64; 3],
    q: Option<[f64; 4]>,
    hmd_p: Option<[f64; 3]>,
    hmd_q: Option<[f64; 4]>,
}

fn read_stroke(path: &Path) -> Result<Vec<StrokeRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<StrokeRecord> =
        serde_json::from_str(&content).context("invalid stroke file")?;
    if records.is_empty() {
        bail!("stroke file contains no frames");
    }
    Ok(records)
}

fn record_hmd(record: &StrokeRecord) -> Pose {
    Pose::new(
        record.hmd_p.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
        record
            .hmd_q
            .map(Quaternion::from_array)
            .unwrap_or_else(Quaternion::identity),
    )
}

/// Replay a stroke file through the stroke state machine.
fn replay_stroke(
    system: &mut GestureCombinations,
    part: usize,
    records: &[StrokeRecord],
    record_as: Option<u32>,
) -> gk_core::Result<StrokeOutcome> {
    system.start_stroke(part, record_hmd(&records[0]), record_as)?;
    for record in records {
        let position = Vec3::from_array(record.p);
        match record.q {
            Some(q) => system.continue_stroke_with_rotation(
                part,
                position,
                Quaternion::from_array(q),
            )?,
            None => system.continue_stroke(part, position)?,
        }
        if record.hmd_p.is_some() || record.hmd_q.is_some() {
            system.update_head_position(record_hmd(record))?;
        }
    }
    Ok(system.end_stroke(part)?)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_create(cli: &Cli, name: &str, part: usize) -> Result<()> {
    let mut system = open_system(cli)?;
    let id = system.create_gesture(part, name)?;
    save_system(cli, &system)?;
    println!("created gesture {id} \"{name}\" on part {part}");
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let system = open_system(cli)?;
    for part in 0..system.part_count() {
        println!("part {part}:");
        for id in system.gesture_ids(part)? {
            let name = system.gesture_name(part, id)?;
            let samples = system.sample_count(part, id)?;
            let enabled = if system.gesture_enabled(part, id)? {
                ""
            } else {
                " (disabled)"
            };
            println!("  [{id}] {name} - {samples} samples{enabled}");
        }
    }
    for id in system.combination_ids() {
        println!("combination [{id}] {}", system.combination_name(id)?);
    }
    Ok(())
}

fn cmd_record(cli: &Cli, gesture: u32, stroke: &Path, part: usize) -> Result<()> {
    let mut system = open_system(cli)?;
    let records = read_stroke(stroke)?;
    replay_stroke(&mut system, part, &records, Some(gesture))?;
    let count = system.sample_count(part, gesture)?;
    save_system(cli, &system)?;
    println!("recorded sample {count} for gesture {gesture}");
    Ok(())
}

fn cmd_identify(cli: &Cli, stroke: &Path, part: usize) -> Result<()> {
    let mut system = open_system(cli)?;
    let records = read_stroke(stroke)?;
    match replay_stroke(&mut system, part, &records, None) {
        Ok(StrokeOutcome::Identified { result, .. }) => {
            let name = system.gesture_name(part, result.gesture_id)?;
            println!(
                "identified gesture {} \"{}\" (probability {:.3}, similarity {:.3})",
                result.gesture_id, name, result.probability, result.similarity
            );
            for candidate in &result.candidates {
                println!(
                    "  [{}] p={:.3} s={:.3}",
                    candidate.gesture_id, candidate.probability, candidate.similarity
                );
            }
            Ok(())
        }
        Ok(StrokeOutcome::Recorded { .. }) => unreachable!("identification mode"),
        Err(GestureError::NoMatch) => {
            println!("no match");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

struct PrintProgress;

impl TrainingObserver for PrintProgress {
    fn on_update(&self, score: f64) {
        tracing::info!("recognition score improved to {score:.3}");
    }
}

fn cmd_train(cli: &Cli, max_seconds: Option<u64>) -> Result<()> {
    let mut system = open_system(cli)?;
    if let Some(seconds) = max_seconds {
        system.set_max_training_time(seconds);
    }
    system.start_training(Arc::new(PrintProgress))?;
    while system.is_training() {
        std::thread::sleep(Duration::from_millis(50));
    }
    system.wait_for_training();
    save_system(cli, &system)?;
    for part in 0..system.part_count() {
        println!(
            "part {part}: recognition score {:.3}",
            system.gesture_recognition_score(part)?
        );
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let system = open_system(cli)?;
    println!("database:     {}", db_path(cli).display());
    println!("parts:        {}", system.part_count());
    println!("combinations: {}", system.combination_count());
    for part in 0..system.part_count() {
        let gesture_ids = system.gesture_ids(part)?;
        let samples: usize = gesture_ids
            .iter()
            .map(|id| system.sample_count(part, *id).unwrap_or(0))
            .sum();
        println!(
            "part {part}:       {} gestures, {} samples, score {:.3}",
            gesture_ids.len(),
            samples,
            system.gesture_recognition_score(part)?
        );
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    if path.exists() {
        return Err(GestureError::CannotOverwrite)
            .with_context(|| format!("{} already exists", path.display()));
    }
    let system = open_system(cli)?;
    let json = gk_core::export_json(&system)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path, merge: bool) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let system = if merge {
        let mut system = open_system(cli)?;
        gk_core::merge_json(&mut system, &json)?;
        system
    } else {
        gk_core::import_json(&json)?
    };
    save_system(cli, &system)?;
    println!("imported {}", path.display());
    Ok(())
}
