use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facepos_core::{CheckSession, PositionValidator, PositionVerdict, ScrfdDetector, StillFile};
use facepos_hw::Camera;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::{Config, Overrides};
use engine::{CheckOutcome, EngineHandle};

/// Exit status when the face is not positioned correctly.
const EXIT_NOT_POSITIONED: u8 = 2;

#[derive(Parser)]
#[command(name = "facepos", about = "Check that your face is centered in the camera frame")]
struct Cli {
    /// Centering tolerance in pixels (overrides config)
    #[arg(long, global = true)]
    tolerance: Option<f32>,
    /// Visibility confidence threshold (overrides config)
    #[arg(long, global = true)]
    threshold: Option<f32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one photo and check the face position
    Check {
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture on demand, show the result, go back and retry
    Interactive,
    /// Check the face position in an image file
    Image {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a detector result given as JSON (no camera, no model)
    Evaluate {
        /// Width of the image the detection came from, in pixels
        #[arg(long)]
        width: u32,
        /// JSON file holding the detection; omit for "no face found"
        #[arg(long)]
        detection: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List video capture devices
    Devices,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(Overrides {
        center_tolerance_px: cli.tolerance,
        visibility_threshold: cli.threshold,
    })
    .context("failed to load configuration")?;
    let validator = PositionValidator::new(config.validator).context("invalid thresholds")?;

    match cli.command {
        Commands::Check { json } => {
            let handle = open_camera_engine(&config, validator)?;
            let outcome = handle.check().await.context("capture failed")?;
            report(&outcome, json)
        }
        Commands::Interactive => {
            let handle = open_camera_engine(&config, validator)?;
            run_interactive(&handle).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Image { path, json } => {
            let detector = load_detector(&config)?;
            let handle = engine::spawn_engine(StillFile::new(&path), detector, validator, 0)?;
            let outcome = handle
                .check()
                .await
                .with_context(|| format!("failed to check {}", path.display()))?;
            report(&outcome, json)
        }
        Commands::Evaluate {
            width,
            detection,
            json,
        } => evaluate_json(&validator, width, detection.as_deref(), json),
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_detector(config: &Config) -> Result<ScrfdDetector> {
    let path = config.detector_model_path();
    ScrfdDetector::load(&path).with_context(|| format!("failed to load detector {}", path.display()))
}

/// Open the camera and load the detector once, then hand both to the engine.
fn open_camera_engine(config: &Config, validator: PositionValidator) -> Result<EngineHandle> {
    let camera = Camera::open(
        &config.camera_device,
        config.capture_width,
        config.capture_height,
    )
    .with_context(|| format!("failed to open camera {}", config.camera_device))?;
    let detector = load_detector(config)?;
    Ok(engine::spawn_engine(
        camera,
        detector,
        validator,
        config.warmup_frames,
    )?)
}

async fn run_interactive(handle: &EngineHandle) -> Result<()> {
    let mut session = CheckSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if session.can_capture() {
            println!("Press Enter to capture a photo (q to quit)");
        } else {
            println!("Press Enter to go back (q to quit)");
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        if !session.can_capture() {
            session.reset();
            continue;
        }

        session.begin()?;
        println!("{}", session.message());
        match handle.check().await {
            Ok(outcome) => {
                session.complete(outcome.verdict)?;
                println!("{}", session.message());
                print_details(&outcome.verdict);
                if outcome.dark {
                    println!("  (the photo is very dark)");
                }
            }
            Err(err) => {
                session.abandon();
                eprintln!("capture failed: {err}");
            }
        }
    }

    Ok(())
}

fn evaluate_json(
    validator: &PositionValidator,
    width: u32,
    detection: Option<&Path>,
    json: bool,
) -> Result<ExitCode> {
    let detection = match detection {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            facepos_core::types::parse_detection(&text)
                .with_context(|| format!("invalid detection JSON in {}", path.display()))?
        }
        None => None,
    };

    let width = NonZeroU32::new(width).context("invalid image width: must be positive")?;
    let verdict = validator.evaluate_width(width, detection.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!("{}", verdict_message(&verdict));
        print_details(&verdict);
    }
    Ok(exit_code(&verdict))
}

fn report(outcome: &CheckOutcome, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", verdict_message(&outcome.verdict));
        print_details(&outcome.verdict);
    }
    Ok(exit_code(&outcome.verdict))
}

fn verdict_message(verdict: &PositionVerdict) -> &'static str {
    if verdict.positioned {
        facepos_core::session::MSG_SUCCESS
    } else {
        facepos_core::session::MSG_ADJUST
    }
}

fn print_details(verdict: &PositionVerdict) {
    match (verdict.offset_px, verdict.confidence) {
        (Some(offset), Some(confidence)) => println!(
            "  centered: {} (offset {offset:.1}px)  visible: {} (confidence {confidence:.2})",
            verdict.centered, verdict.visible
        ),
        _ => println!("  no face detected"),
    }
}

fn exit_code(verdict: &PositionVerdict) -> ExitCode {
    if verdict.positioned {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_POSITIONED)
    }
}
