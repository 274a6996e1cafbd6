// VehicleDetect 🚀 AGPL-3.0 License

use std::path::PathBuf;
use std::process;

use crate::cli::args::TrainArgs;
use crate::train::{TrainConfig, run_train};
use crate::{Device, VERSION, error, success, verbose};

/// Run a training job from CLI arguments.
pub fn run_training(args: &TrainArgs) {
    let device: Device = match args.device.parse() {
        Ok(d) => d,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let config = TrainConfig {
        data: PathBuf::from(&args.data),
        model: args.model.clone(),
        epochs: args.epochs,
        imgsz: args.imgsz,
        batch_size: args.batch,
        lr: args.lr,
        device,
        ..TrainConfig::default()
    };

    verbose!(
        "vehicle-detect {VERSION} train: data={} model={} epochs={} imgsz={} batch={} device={}",
        args.data,
        args.model,
        args.epochs,
        args.imgsz,
        args.batch,
        device
    );

    match run_train(&config) {
        Ok(report) => {
            success!(
                "{} epochs complete, best loss {:.4}",
                report.epochs,
                report.best_loss
            );
            verbose!("Weights saved to {}", report.best_weights.display());
            verbose!("Results saved to {}", report.run_dir.display());
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
