// VehicleDetect 🚀 AGPL-3.0 License

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    vehicle-detect train
    vehicle-detect train --data dataset/vehicles_dataset.yaml --epochs 20 --imgsz 640 --batch 16
    vehicle-detect train --model runs/detect/train/weights/best.bin --epochs 5
    vehicle-detect predict
    vehicle-detect predict --model runs/detect/train/weights/best.bin --source dataset/test/images --conf 0.5
    vehicle-detect predict --source image.jpg --save false"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the detector on a dataset manifest
    Train(TrainArgs),
    /// Run inference on an image or a directory of images
    Predict(PredictArgs),
}

/// Arguments for the train command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the dataset manifest
    #[arg(long, default_value = "dataset/vehicles_dataset.yaml")]
    pub data: String,

    /// Base weights: checkpoint path or architecture (vehicledet-n, vehicledet-s)
    #[arg(short, long, default_value = "vehicledet-n")]
    pub model: String,

    /// Number of training epochs
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    /// Square training image size
    #[arg(long, default_value_t = 640)]
    pub imgsz: usize,

    /// Batch size
    #[arg(long, default_value_t = 16)]
    pub batch: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Device to run on (cpu, cuda:0, or a bare index like 7)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Path to trained checkpoint weights
    #[arg(short, long, default_value = "runs/detect/train/weights/best.bin")]
    pub model: String,

    /// Input source (image, directory, or glob)
    #[arg(short, long, default_value = "dataset/test/images")]
    pub source: String,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Inference image size (defaults to the checkpoint's trained size)
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Maximum detections per image
    #[arg(long, default_value_t = 300)]
    pub max_det: usize,

    /// Save annotated images to runs/detect/predict
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub save: bool,

    /// Device to run on (cpu, cuda:0, or a bare index like 7)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
