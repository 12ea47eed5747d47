//! End-to-end checks of the parcel-check binary

use image::{GrayImage, ImageFormat, Luma};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_parcel-check"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("RUST_LOG", "warn")
            .output()
            .unwrap()
    }

    fn photo(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let img = GrayImage::from_fn(width, height, |x, y| {
            if (200..440).contains(&x) && (120..360).contains(&y) {
                Luma([60])
            } else {
                Luma([((x / 16 + y / 16) % 2 * 150 + 50) as u8])
            }
        });
        let path = self.path().join(name);
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }
}

fn as_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_measure_prints_json_analysis() {
    let sandbox = Sandbox::new();
    let front = sandbox.photo("front.png", 640, 480);
    let side = sandbox.photo("side.png", 640, 480);

    let output = sandbox.run(&[
        "measure",
        as_str(&front),
        as_str(&side),
        "--no-vision",
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let analysis: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(analysis["measurement"]["source"], "estimated");
    assert!(analysis["quality"]["qualityPassed"].is_boolean());
    assert!(analysis["measurement"]["lengthMm"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_measure_refuses_small_photo() {
    let sandbox = Sandbox::new();
    let front = sandbox.photo("front.png", 320, 240);
    let side = sandbox.photo("side.png", 640, 480);

    let output = sandbox.run(&["measure", as_str(&front), as_str(&side), "--no-vision"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("below the minimum"));
}

#[test]
fn test_handover_without_arrival_fails_before_capture() {
    let sandbox = Sandbox::new();
    let missing = sandbox.path().join("not-taken.png");

    let output = sandbox.run(&[
        "handover",
        "ORD-404",
        as_str(&missing),
        as_str(&missing),
        "--courier",
        "yamato",
        "--staff",
        "s-1",
        "--warehouse",
        "wh-1",
        "--no-vision",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no arrival record"), "stderr: {}", stderr);
    assert!(stderr.contains("Record the arrival for this order first."));
}

#[test]
fn test_arrival_needs_staff_identity() {
    let sandbox = Sandbox::new();
    let front = sandbox.photo("front.png", 640, 480);

    let output = sandbox.run(&[
        "arrival",
        "ORD-1",
        as_str(&front),
        as_str(&front),
        "--weight",
        "1.5",
        "--no-vision",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("staff_id and warehouse_id"));
}

#[test]
fn test_config_set_and_show() {
    let sandbox = Sandbox::new();

    let output = sandbox.run(&["config", "--set-staff", "s-9", "--set-warehouse", "wh-osaka"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration updated"));

    let output = sandbox.run(&["config", "--show"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("s-9"));
    assert!(stdout.contains("wh-osaka"));

    let output = sandbox.run(&["config", "--set-change-threshold", "1.5"]);
    assert!(!output.status.success());
}

#[test]
fn test_empty_store_listing() {
    let sandbox = Sandbox::new();

    let output = sandbox.run(&["show", "--format", "json"]);
    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.as_array().map(Vec::len), Some(0));

    let output = sandbox.run(&["stats", "--format", "json"]);
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["record_count"], 0);
}
