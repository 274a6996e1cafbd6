// VehicleDetect 🚀 AGPL-3.0 License

use std::path::PathBuf;
use std::process;

use crate::annotate::{annotate_image, find_next_run_dir};
use crate::cli::args::PredictArgs;
use crate::io::SaveResults;
use crate::utils::array_to_image;
use crate::{Device, InferenceConfig, Predictor, Source, VERSION, error, verbose, warn};

/// Run model inference from CLI arguments.
pub fn run_prediction(args: &PredictArgs) {
    let device: Device = match args.device.parse() {
        Ok(d) => d,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut config = InferenceConfig::new()
        .with_confidence(args.conf)
        .with_iou(args.iou)
        .with_max_detections(args.max_det)
        .with_device(device);
    if let Some(sz) = args.imgsz {
        config = config.with_imgsz(sz);
    }

    let predictor = match Predictor::load_with_config(&args.model, config) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let imgsz = predictor.imgsz();
    verbose!("vehicle-detect {VERSION} {} {}", predictor.metadata().arch, device);
    verbose!(
        "model: {} classes, imgsz=({}, {})",
        predictor.num_classes(),
        imgsz.0,
        imgsz.1
    );

    let saver = if args.save {
        let dir = find_next_run_dir("runs/detect", "predict");
        Some(SaveResults::new(PathBuf::from(dir)))
    } else {
        None
    };

    let source = Source::from(args.source.as_str());

    let mut total_preprocess = 0.0;
    let mut total_inference = 0.0;
    let mut total_postprocess = 0.0;

    let processed = predictor.predict_each(&source, |meta, result| {
        verbose!(
            "image {}/{} {}: {}x{} {}, {:.1}ms",
            meta.frame_idx + 1,
            meta.total_frames,
            meta.path,
            result.orig_shape.1,
            result.orig_shape.0,
            result.verbose(),
            result.speed.inference.unwrap_or(0.0)
        );

        if let Some(ref saver) = saver {
            let img = array_to_image(&result.orig_img)?;
            let annotated = annotate_image(&img, result);
            saver.save(meta, &annotated)?;
        }

        total_preprocess += result.speed.preprocess.unwrap_or(0.0);
        total_inference += result.speed.inference.unwrap_or(0.0);
        total_postprocess += result.speed.postprocess.unwrap_or(0.0);
        Ok(())
    });

    let processed = match processed {
        Ok(n) => n,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    if processed == 0 {
        warn!("no images found in {}", args.source);
    }

    #[allow(clippy::cast_precision_loss)]
    let per_image = processed.max(1) as f64;
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image at shape (1, 3, {}, {})",
        total_preprocess / per_image,
        total_inference / per_image,
        total_postprocess / per_image,
        imgsz.0,
        imgsz.1
    );

    if let Some(saver) = saver {
        verbose!("Results saved to {}", saver.save_dir().display());
    }
}
