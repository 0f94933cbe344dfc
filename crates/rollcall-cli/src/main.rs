mod capture;
mod config;
mod ledger;
mod processor;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use ledger::AttendanceLedger;
use processor::{DetectionProcessor, RecognitionProcessor};
use rollcall_core::{build_reference_set, load_reference_images, DistanceMatcher, OnnxAnalyzer, ReferenceSet};
use rollcall_hw::{Camera, Window};
use std::path::PathBuf;

const ATTEND_WINDOW: &str = "rollcall — attendance";
const DETECT_WINDOW: &str = "rollcall — face detection";

#[derive(Parser)]
#[command(name = "rollcall", about = "Webcam face recognition attendance")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize faces from the webcam and log attendance
    Attend {
        /// Camera index
        #[arg(long)]
        camera: Option<i32>,
        /// Directory of reference images, one person per file
        #[arg(long)]
        references: Option<PathBuf>,
        /// Attendance CSV file
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Downscale factor applied before detection, in (0, 1]
        #[arg(long)]
        scale: Option<f32>,
        /// Closest match must be strictly below this distance
        #[arg(long)]
        face_score: Option<f32>,
    },
    /// Draw a box around every detected face, no recognition
    Detect {
        /// Camera index
        #[arg(long)]
        camera: Option<i32>,
        /// Downscale factor applied before detection, in (0, 1]
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Embed the reference images and list who is known
    List {
        /// Directory of reference images
        #[arg(long)]
        references: Option<PathBuf>,
    },
    /// Print attendance rows as JSON lines
    Report {
        /// Attendance CSV file
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Attend {
            camera,
            references,
            ledger,
            scale,
            face_score,
        } => {
            override_with(&mut config.camera_index, camera);
            override_with(&mut config.reference_dir, references);
            override_with(&mut config.ledger_path, ledger);
            override_with(&mut config.scale, scale);
            override_with(&mut config.face_score, face_score);
            config.validate()?;
            attend(&config)
        }
        Commands::Detect { camera, scale } => {
            override_with(&mut config.camera_index, camera);
            override_with(&mut config.scale, scale);
            config.validate()?;
            detect(&config)
        }
        Commands::List { references } => {
            override_with(&mut config.reference_dir, references);
            config.validate()?;
            list(&config)
        }
        Commands::Report { ledger } => {
            override_with(&mut config.ledger_path, ledger);
            report(&config)
        }
    }
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn load_references(config: &Config, analyzer: &mut OnnxAnalyzer) -> Result<ReferenceSet> {
    let images = load_reference_images(&config.reference_dir)
        .with_context(|| format!("loading reference images from {}", config.reference_dir.display()))?;
    build_reference_set(analyzer, &images).context("embedding reference images")
}

fn load_analyzer(config: &Config) -> Result<OnnxAnalyzer> {
    OnnxAnalyzer::load(
        &config.scrfd_model_path(),
        &config.arcface_model_path(),
        config.detection_threshold,
    )
    .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

fn attend(config: &Config) -> Result<()> {
    let mut analyzer = load_analyzer(config)?;
    let references = load_references(config, &mut analyzer)?;
    if references.is_empty() {
        tracing::warn!(dir = %config.reference_dir.display(), "no reference images; every face will be Unknown");
    }

    let ledger = AttendanceLedger::open(&config.ledger_path, config.debounce())
        .with_context(|| format!("opening ledger {}", config.ledger_path.display()))?;
    tracing::info!(path = %ledger.path().display(), "recording attendance");
    let matcher = DistanceMatcher {
        tolerance: config.match_tolerance,
        face_score: config.face_score,
    };
    let mut processor = RecognitionProcessor::new(analyzer, references, ledger, matcher, config.scale);

    let camera = Camera::open(config.camera_index)
        .with_context(|| format!("opening camera {}", config.camera_index))?;
    let window = Window::open(ATTEND_WINDOW)?;
    capture::run_camera(camera, window, &mut processor)?;
    Ok(())
}

fn detect(config: &Config) -> Result<()> {
    let analyzer = OnnxAnalyzer::detector_only(&config.scrfd_model_path(), config.detection_threshold)
        .with_context(|| format!("loading detection model from {}", config.model_dir.display()))?;
    let mut processor = DetectionProcessor::new(analyzer, config.scale);

    let camera = Camera::open(config.camera_index)
        .with_context(|| format!("opening camera {}", config.camera_index))?;
    let window = Window::open(DETECT_WINDOW)?;
    capture::run_camera(camera, window, &mut processor)?;
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let mut analyzer = load_analyzer(config)?;
    let references = load_references(config, &mut analyzer)?;

    if references.is_empty() {
        println!("No reference images in {}", config.reference_dir.display());
        return Ok(());
    }
    for entry in references.entries() {
        println!(
            "{:<24} {:>4}-d  {}",
            entry.label,
            entry.embedding.values.len(),
            entry.source.display()
        );
    }
    Ok(())
}

fn report(config: &Config) -> Result<()> {
    let records = ledger::read_records(&config.ledger_path)
        .with_context(|| format!("reading ledger {}", config.ledger_path.display()))?;
    for record in records {
        if let Err(e) = record.timestamp() {
            tracing::warn!(name = %record.name, error = %e, "row has a malformed timestamp");
        }
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
