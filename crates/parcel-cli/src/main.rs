//! Parcel Check - parcel condition verification at arrival and handover
//!
//! Guided two-photo capture, marker-calibrated package measurement, human
//! damage confirmation and arrival-vs-handover change detection.

mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::Cli;
use parcel_app::FlowError;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = commands::execute(cli) {
        eprintln!("Error: {}", e);
        match e {
            FlowError::MissingArrival { .. } => {
                eprintln!("Record the arrival for this order first.")
            }
            ref err if err.is_retryable() => eprintln!("This step can be retried."),
            _ => {}
        }
        std::process::exit(1);
    }
}
