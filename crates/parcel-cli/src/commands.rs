//! Command handlers

use crate::cli::{Cli, Commands, DamageArgs};
use crate::output::{output_analysis, output_record, output_records};
use indicatif::{ProgressBar, ProgressStyle};
use parcel_app::capture::{
    Camera, CaptureBundle, CaptureDriver, CaptureState, FileCamera, PhotoAnalyzer, VisionAnalyzer,
};
use parcel_app::config::Config;
use parcel_app::flow::ConditionFlow;
use parcel_app::repository::{open_condition_repo, open_services};
use parcel_app::{damage_service, handover_service, readiness, telemetry, FlowError};
use parcel_domain::repository::ConditionRepository;
use parcel_domain::service::DamageConfirmation;
use parcel_types::{
    ConditionRecord, Error, EventType, OutputFormat, PhotoAnalysis, ReviewOutcome,
};
use parcel_vision::VisionCapability;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type CmdResult<T = ()> = std::result::Result<T, FlowError>;

/// Submit attempts before a retryable failure is reported
const MAX_SUBMIT_ATTEMPTS: u32 = 3;

pub fn execute(cli: Cli) -> CmdResult {
    // Load config
    let mut config = Config::load()?;

    // Override from CLI args
    if let Some(ref dir) = cli.store_dir {
        config.store_dir = Some(dir.clone());
    }
    if let Some(ref staff) = cli.staff {
        config.staff_id = Some(staff.clone());
    }
    if let Some(ref warehouse) = cli.warehouse {
        config.warehouse_id = Some(warehouse.clone());
    }
    if cli.no_vision {
        config.vision_enabled = false;
    }

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    if let Err(e) = telemetry::init(&log_level) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let output_format = cli.format.unwrap_or(config.output_format);

    match cli.command {
        Commands::Measure { front, side } => {
            runtime()?.block_on(cmd_measure(&config, front, side, output_format))
        }

        Commands::Arrival {
            order_id,
            front,
            side,
            weight,
            damage,
        } => runtime()?.block_on(cmd_arrival(
            &config,
            &order_id,
            front,
            side,
            weight,
            &damage,
            output_format,
        )),

        Commands::Handover {
            order_id,
            front,
            side,
            courier,
            damage,
        } => runtime()?.block_on(cmd_handover(
            &config,
            &order_id,
            front,
            side,
            courier,
            &damage,
            output_format,
        )),

        Commands::ConfirmDamage { record_id, damage } => {
            cmd_confirm_damage(&config, &record_id, &damage, output_format)
        }

        Commands::ResolveReview {
            record_id,
            outcome,
            notes,
        } => cmd_resolve_review(&config, &record_id, outcome, notes, output_format),

        Commands::Show {
            order_id,
            awaiting_review,
        } => cmd_show(&config, order_id, awaiting_review, output_format),

        Commands::Stats => cmd_stats(&config, output_format),

        Commands::Config {
            show,
            set_staff,
            set_warehouse,
            set_store_dir,
            set_orders_file,
            set_marker_width,
            set_marker_height,
            set_vision,
            set_vision_timeout,
            set_change_threshold,
            set_output,
            set_log_level,
            reset,
        } => cmd_config(ConfigUpdate {
            show,
            set_staff,
            set_warehouse,
            set_store_dir,
            set_orders_file,
            set_marker_width,
            set_marker_height,
            set_vision,
            set_vision_timeout,
            set_change_threshold,
            set_output,
            set_log_level,
            reset,
        }),
    }
}

fn runtime() -> CmdResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| FlowError::from(Error::Io(e)))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Walk a capture session over the two photo files up to analysis.
/// Ctrl-C cancels the session and releases the camera.
async fn capture_and_analyze(
    config: &Config,
    vision: VisionCapability,
    front: PathBuf,
    side: PathBuf,
) -> CmdResult<(CaptureDriver, PhotoAnalysis)> {
    let camera: Arc<dyn Camera> = Arc::new(FileCamera::new(front, side));
    let analyzer: Arc<dyn PhotoAnalyzer> = Arc::new(VisionAnalyzer::new(vision, config.marker()?));

    let mut driver = CaptureDriver::start(camera, analyzer).await;
    if driver.state() == CaptureState::Error {
        let reason = driver
            .camera_error()
            .unwrap_or("camera unavailable")
            .to_string();
        return Err(FlowError::Camera(reason));
    }

    let token = driver.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let pb = spinner("Analyzing photos...");
    let shots = match driver.shutter().await {
        Ok(_) => driver.shutter().await,
        Err(e) => Err(e),
    };
    pb.finish_and_clear();
    interrupt.abort();

    let state = shots?;
    debug!(%state, "capture finished shooting");
    if state == CaptureState::Error {
        let reason = driver.camera_error().unwrap_or("camera unavailable").to_string();
        return Err(FlowError::Camera(reason));
    }
    let analysis = driver
        .analysis()
        .cloned()
        .ok_or_else(|| FlowError::Vision(format!("no analysis available ({})", state)))?;
    Ok((driver, analysis))
}

/// Capture for a condition record: the quality gate must pass
async fn capture_bundle(
    config: &Config,
    vision: VisionCapability,
    front: PathBuf,
    side: PathBuf,
    output_format: OutputFormat,
) -> CmdResult<CaptureBundle> {
    let (mut driver, analysis) = capture_and_analyze(config, vision, front, side).await?;
    if !analysis.quality.quality_passed && output_format == OutputFormat::Table {
        output_analysis(output_format, &analysis)?;
    }
    match driver.confirm().await {
        Ok(bundle) => Ok(bundle),
        Err(e) => {
            if let Err(cancel_err) = driver.cancel().await {
                debug!(error = %cancel_err, "capture already closed");
            }
            Err(e.into())
        }
    }
}

async fn cmd_measure(
    config: &Config,
    front: PathBuf,
    side: PathBuf,
    output_format: OutputFormat,
) -> CmdResult {
    let vision = readiness::vision_for(config).await?;
    let (mut driver, analysis) = capture_and_analyze(config, vision, front, side).await?;
    driver.cancel().await?;
    output_analysis(output_format, &analysis)?;
    Ok(())
}

/// `--tag`/`--notes` only mean something together with `--condition`
fn check_damage_args(damage: &DamageArgs) -> CmdResult {
    if damage.condition.is_none() && (!damage.tags.is_empty() || damage.notes.is_some()) {
        return Err(FlowError::Invalid(
            "--tag and --notes need --condition".to_string(),
        ));
    }
    Ok(())
}

fn fill_damage_form(form: &mut DamageConfirmation, damage: &DamageArgs) {
    if let Some(condition) = damage.condition {
        form.select_condition(condition);
    }
    for tag in &damage.tags {
        if !form.tags().contains(tag) {
            form.toggle_tag(*tag);
        }
    }
    if let Some(ref notes) = damage.notes {
        form.set_notes(notes.as_str());
    }
}

/// Retry the save while the failure is transient. Uploaded photos and a
/// created record are kept by the flow across attempts.
async fn submit_with_retry(flow: &mut ConditionFlow) -> CmdResult {
    let pb = spinner("Saving condition record...");
    let mut attempt = 1;
    loop {
        let err = match flow.submit().await {
            Ok(_) => break,
            Err(e) => FlowError::from(e),
        };
        if !err.is_retryable() || attempt >= MAX_SUBMIT_ATTEMPTS {
            pb.finish_and_clear();
            return Err(err);
        }
        warn!(attempt, error = %err, "save failed; retrying");
        attempt += 1;
        tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
    }
    pb.finish_and_clear();
    Ok(())
}

/// Apply the operator's damage judgment if given, then print the record
fn finish_flow(
    mut flow: ConditionFlow,
    damage: &DamageArgs,
    output_format: OutputFormat,
) -> CmdResult {
    if damage.condition.is_some() {
        fill_damage_form(flow.damage_form()?, damage);
        flow.confirm_damage()?;
    }

    let record = flow
        .record()
        .ok_or_else(|| FlowError::Store("record missing after save".to_string()))?;
    output_record(output_format, record)?;

    if output_format == OutputFormat::Table && record.damage.is_none() {
        print_suggestions(record);
        println!(
            "\nConfirm damage with: parcel-check confirm-damage {} --condition <none|minor|major>",
            record.id
        );
    }
    Ok(())
}

fn print_suggestions(record: &ConditionRecord) {
    let suggestions = damage_service::suggestions_for(record);
    if suggestions.is_empty() {
        return;
    }
    println!("\nSuggested (advisory):");
    for s in &suggestions {
        println!("  {:<14} {:<20} {:.0}%", s.kind, s.area, s.confidence * 100.0);
    }
}

async fn cmd_arrival(
    config: &Config,
    order_id: &str,
    front: PathBuf,
    side: PathBuf,
    weight: f64,
    damage: &DamageArgs,
    output_format: OutputFormat,
) -> CmdResult {
    check_damage_args(damage)?;
    let session = config.staff_session()?;
    let (_, services) = open_services(config).await?;

    let mut flow = ConditionFlow::new(services.clone(), session, EventType::Arrival);
    flow.begin(order_id)?;
    if let Some(declared) = flow.order().and_then(|o| o.declared_weight_kg) {
        info!(order_id, declared_kg = declared, actual_kg = weight, "declared weight on file");
    }

    let bundle = capture_bundle(config, services.vision.clone(), front, side, output_format).await?;
    flow.attach_capture(bundle)?;
    flow.set_actual_weight(weight)?;
    submit_with_retry(&mut flow).await?;

    finish_flow(flow, damage, output_format)
}

async fn cmd_handover(
    config: &Config,
    order_id: &str,
    front: PathBuf,
    side: PathBuf,
    courier: Option<String>,
    damage: &DamageArgs,
    output_format: OutputFormat,
) -> CmdResult {
    check_damage_args(damage)?;
    let session = config.staff_session()?;
    let (_, services) = open_services(config).await?;

    // Fails before any photo is taken when the order never arrived
    let mut flow = ConditionFlow::new(services.clone(), session, EventType::Handover);
    flow.begin(order_id)?;
    if courier.is_none() && flow.courier().is_none() {
        return Err(FlowError::Invalid(format!(
            "order {} has no assigned courier; pass --courier",
            order_id
        )));
    }

    let bundle = capture_bundle(config, services.vision.clone(), front, side, output_format).await?;
    flow.attach_capture(bundle)?;
    if let Some(ref courier) = courier {
        flow.set_courier(courier)?;
    }
    submit_with_retry(&mut flow).await?;

    if let Some(record) = flow.record() {
        if record.awaiting_review() && output_format == OutputFormat::Table {
            eprintln!("⚠ Changes since arrival detected; this handover needs review.");
        }
    }

    finish_flow(flow, damage, output_format)
}

fn load_record(repo: &dyn ConditionRepository, record_id: &str) -> CmdResult<ConditionRecord> {
    repo.get(record_id)?.ok_or_else(|| {
        FlowError::Invalid(format!("condition record not found: {}", record_id))
    })
}

fn cmd_confirm_damage(
    config: &Config,
    record_id: &str,
    damage: &DamageArgs,
    output_format: OutputFormat,
) -> CmdResult {
    let session = config.staff_session()?;
    let repo = open_condition_repo(config)?;
    let record = load_record(&repo, record_id)?;
    if record.damage.is_some() {
        return Err(FlowError::Invalid(format!(
            "damage for {} is already confirmed",
            record_id
        )));
    }

    let mut form = damage_service::form_for(&record);
    fill_damage_form(&mut form, damage);
    damage_service::confirm(&repo, record_id, form, &session.staff_id)?;

    output_record(output_format, &load_record(&repo, record_id)?)?;
    Ok(())
}

fn cmd_resolve_review(
    config: &Config,
    record_id: &str,
    outcome: ReviewOutcome,
    notes: Option<String>,
    output_format: OutputFormat,
) -> CmdResult {
    let session = config.staff_session()?;
    let repo = open_condition_repo(config)?;
    let record =
        handover_service::resolve_review(&repo, record_id, outcome, notes, &session.staff_id)?;
    output_record(output_format, &record)?;
    Ok(())
}

fn cmd_show(
    config: &Config,
    order_id: Option<String>,
    awaiting_review: bool,
    output_format: OutputFormat,
) -> CmdResult {
    let repo = open_condition_repo(config)?;
    let records: Vec<ConditionRecord> = repo.with_store(|store| {
        let records = match order_id.as_deref() {
            Some(order_id) => store.find_by_order(order_id),
            None if awaiting_review => store.awaiting_review(),
            None => store.all_records(),
        };
        records
            .into_iter()
            .filter(|r| !awaiting_review || r.awaiting_review())
            .cloned()
            .collect()
    })?;

    if output_format == OutputFormat::Table {
        if let Some(ref order_id) = order_id {
            if records.is_empty() {
                println!("No records for order {}.", order_id);
            }
            for record in &records {
                output_record(output_format, record)?;
            }
            return Ok(());
        }
        println!("Condition Records");
        println!("=================");
        println!("Showing: {}", records.len());
        println!();
    }

    output_records(output_format, &records)?;
    Ok(())
}

fn cmd_stats(config: &Config, output_format: OutputFormat) -> CmdResult {
    let repo = open_condition_repo(config)?;
    let stats = repo.with_store(|store| store.stats())?;

    if output_format == OutputFormat::Json {
        let content = serde_json::to_string_pretty(&stats).map_err(Error::from)?;
        println!("{}", content);
    } else {
        println!("{}", stats.display());
    }
    Ok(())
}

struct ConfigUpdate {
    show: bool,
    set_staff: Option<String>,
    set_warehouse: Option<String>,
    set_store_dir: Option<PathBuf>,
    set_orders_file: Option<PathBuf>,
    set_marker_width: Option<f64>,
    set_marker_height: Option<f64>,
    set_vision: Option<bool>,
    set_vision_timeout: Option<u64>,
    set_change_threshold: Option<f64>,
    set_output: Option<OutputFormat>,
    set_log_level: Option<String>,
    reset: bool,
}

fn cmd_config(update: ConfigUpdate) -> CmdResult {
    if update.reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut modified = false;

    if let Some(staff) = update.set_staff {
        config.staff_id = Some(staff);
        modified = true;
    }

    if let Some(warehouse) = update.set_warehouse {
        config.warehouse_id = Some(warehouse);
        modified = true;
    }

    if let Some(dir) = update.set_store_dir {
        config.store_dir = Some(dir);
        modified = true;
    }

    if let Some(path) = update.set_orders_file {
        config.orders_file = Some(path);
        modified = true;
    }

    if let Some(width) = update.set_marker_width {
        config.marker_width_mm = width;
        modified = true;
    }

    if let Some(height) = update.set_marker_height {
        config.marker_height_mm = height;
        modified = true;
    }

    if let Some(enabled) = update.set_vision {
        config.vision_enabled = enabled;
        modified = true;
    }

    if let Some(timeout_ms) = update.set_vision_timeout {
        config.vision_ready_timeout_ms = timeout_ms;
        modified = true;
    }

    if let Some(threshold) = update.set_change_threshold {
        config.change_threshold = threshold;
        modified = true;
    }

    if let Some(output_format) = update.set_output {
        config.output_format = output_format;
        modified = true;
    }

    if let Some(level) = update.set_log_level {
        config.log_level = level;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration updated");
    }

    if update.show || !modified {
        println!("{}", config);
    }

    Ok(())
}
