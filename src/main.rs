use clap::Parser;
use facial_expressions_detection::camera::CameraManager;
use facial_expressions_detection::config::Config;
use facial_expressions_detection::detection::DetectionSession;
use facial_expressions_detection::detector::FaceExpressionNet;
use facial_expressions_detection::error::{ExpressionDetectorError, Result};
use facial_expressions_detection::ui::ExpressionDetectorApp;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Shows the dominant facial expression from your webcam as an emoji
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long, default_value = "facial_expressions.json")]
    config: PathBuf,

    /// Directory holding the face detector and expression models
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Camera index
    #[arg(long)]
    camera: Option<u32>,

    /// Detector input size in pixels
    #[arg(long)]
    input_size: Option<u32>,

    /// Minimum face detection score (0.0 - 1.0)
    #[arg(long)]
    score_threshold: Option<f32>,

    /// List available cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(index) = self.camera {
            config.camera_index = index;
        }
        if let Some(size) = self.input_size {
            config.input_size = size;
        }
        if let Some(threshold) = self.score_threshold {
            config.score_threshold = threshold;
        }
    }
}

/// Initializes the logging system (file only, no console output)
fn init_logging(log_file: &Path, verbose: bool) -> Result<()> {
    let log_file = std::fs::File::create(log_file).map_err(ExpressionDetectorError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_cameras {
        for device in CameraManager::list_devices()? {
            println!("{device}");
        }
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    args.apply_to(&mut config);
    config.validate()?;

    init_logging(&config.log_file, args.verbose)?;
    info!("Starting with {:?}", config);

    let camera_index = config.camera_index;
    let model_config = config.clone();
    let session = DetectionSession::start(
        move || CameraManager::open(camera_index),
        move || FaceExpressionNet::load(&model_config),
        config.max_consecutive_frame_errors,
    )?;

    let result = eframe::run_native(
        "Facial Expressions Detection",
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([480.0, 420.0])
                .with_title("Facial Expressions Detection"),
            ..Default::default()
        },
        Box::new(move |_cc| Ok(Box::new(ExpressionDetectorApp::new(session)))),
    );

    if let Err(e) = result {
        error!("Application error: {}", e);
    }

    info!("Shut down");
    Ok(())
}
