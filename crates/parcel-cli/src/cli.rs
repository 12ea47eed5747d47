//! CLI definition using clap

use clap::{Parser, Subcommand};
use parcel_types::{DamageTag, OutputFormat, OverallCondition, ReviewOutcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parcel-check")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Parcel condition verification: measured photos at arrival and handover")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Store directory override
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Staff id override
    #[arg(long, global = true)]
    pub staff: Option<String>,

    /// Warehouse id override
    #[arg(long, global = true)]
    pub warehouse: Option<String>,

    /// Estimate measurements instead of running the vision engine
    #[arg(long, global = true)]
    pub no_vision: bool,

    /// Verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Operator's damage judgment given on the command line
#[derive(clap::Args, Debug, Clone)]
pub struct DamageArgs {
    /// Overall condition (none, minor, major)
    #[arg(long)]
    pub condition: Option<OverallCondition>,

    /// Damage tag; repeat for several
    #[arg(long = "tag")]
    pub tags: Vec<DamageTag>,

    /// Free-text notes (kept when condition is not none)
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure a photo pair without saving anything
    Measure {
        /// Front photo containing the calibration marker
        front: PathBuf,

        /// Side photo
        side: PathBuf,
    },

    /// Record a package arriving at the warehouse
    Arrival {
        order_id: String,

        /// Front photo containing the calibration marker
        front: PathBuf,

        /// Side photo
        side: PathBuf,

        /// Weighed mass in kg
        #[arg(long, short = 'w')]
        weight: f64,

        #[command(flatten)]
        damage: DamageArgs,
    },

    /// Record a package handed over to a courier
    Handover {
        order_id: String,

        /// Front photo containing the calibration marker
        front: PathBuf,

        /// Side photo
        side: PathBuf,

        /// Courier; defaults to the order's assigned courier
        #[arg(long, short = 'c')]
        courier: Option<String>,

        #[command(flatten)]
        damage: DamageArgs,
    },

    /// Confirm damage on a saved record
    ConfirmDamage {
        record_id: String,

        #[command(flatten)]
        damage: DamageArgs,
    },

    /// Resolve a record flagged for review
    ResolveReview {
        record_id: String,

        /// Review outcome (cleared, escalated)
        #[arg(long)]
        outcome: ReviewOutcome,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Show condition records
    Show {
        /// Order to show; all records when omitted
        order_id: Option<String>,

        /// Only records flagged and not yet reviewed
        #[arg(long)]
        awaiting_review: bool,
    },

    /// Show store statistics
    Stats,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        #[arg(long)]
        set_staff: Option<String>,

        #[arg(long)]
        set_warehouse: Option<String>,

        #[arg(long)]
        set_store_dir: Option<PathBuf>,

        /// Order book (TOML)
        #[arg(long)]
        set_orders_file: Option<PathBuf>,

        /// Marker width in mm
        #[arg(long)]
        set_marker_width: Option<f64>,

        /// Marker height in mm
        #[arg(long)]
        set_marker_height: Option<f64>,

        /// Enable/disable the vision engine
        #[arg(long)]
        set_vision: Option<bool>,

        /// Vision readiness timeout in ms
        #[arg(long)]
        set_vision_timeout: Option<u64>,

        /// Handover change threshold (0.0-1.0)
        #[arg(long)]
        set_change_threshold: Option<f64>,

        /// Set default output format
        #[arg(long)]
        set_output: Option<OutputFormat>,

        /// Log filter, e.g. "info" or "parcel_vision=debug"
        #[arg(long)]
        set_log_level: Option<String>,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,
    },
}
