// VehicleDetect 🚀 AGPL-3.0 License

use clap::Parser;

use vehicle_detect::cli::args::{Cli, Commands};
use vehicle_detect::cli::logging::set_verbose;
use vehicle_detect::cli::{predict, train};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            set_verbose(args.verbose);
            train::run_training(&args);
        }
        Commands::Predict(args) => {
            set_verbose(args.verbose);
            predict::run_prediction(&args);
        }
    }
}
