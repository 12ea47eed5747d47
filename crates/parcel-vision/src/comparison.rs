//! Arrival vs handover change detection
//!
//! Each view is aligned by a small translation search, then compared with
//! windowed SSIM. Regions of a 3x3 grid whose similarity falls below the
//! threshold are reported as changed areas.

use chrono::Utc;
use image::imageops::{self, FilterType};
use parcel_types::{
    AiSuggestedTag, ChangeType, ChangedArea, ComparisonResult, MeasurementSource, Result,
};
use tracing::debug;

/// Side of the square both photos are resampled to
pub const COMPARE_SIZE: u32 = 256;

/// Translation search radius in resampled pixels
pub const MAX_SHIFT: i32 = 8;

/// Region SSIM below this marks a change
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.55;

const WINDOW: usize = 8;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

const REGION_NAMES: [[&str; 3]; 3] = [
    ["top-left", "top-center", "top-right"],
    ["middle-left", "center", "middle-right"],
    ["bottom-left", "bottom-center", "bottom-right"],
];

/// Encoded front and side photos of one checkpoint
#[derive(Debug, Clone, Copy)]
pub struct ViewPair<'a> {
    pub front: &'a [u8],
    pub side: &'a [u8],
}

impl<'a> ViewPair<'a> {
    pub fn new(front: &'a [u8], side: &'a [u8]) -> Self {
        Self { front, side }
    }
}

struct Plane {
    data: Vec<f64>,
}

impl Plane {
    fn decode(bytes: &[u8]) -> Result<Self> {
        let gray = image::load_from_memory(bytes)?.to_luma8();
        let resized = imageops::resize(&gray, COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle);
        Ok(Self {
            data: resized.as_raw().iter().map(|&v| f64::from(v)).collect(),
        })
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * COMPARE_SIZE as usize + x]
    }
}

/// Overlap of the two planes for a handover offset of (dx, dy)
#[derive(Debug, Clone, Copy)]
struct Overlap {
    dx: i32,
    dy: i32,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Overlap {
    fn new(dx: i32, dy: i32) -> Self {
        let size = COMPARE_SIZE as i32;
        Self {
            dx,
            dy,
            x0: (-dx).max(0) as usize,
            y0: (-dy).max(0) as usize,
            x1: (size - dx).min(size) as usize,
            y1: (size - dy).min(size) as usize,
        }
    }

    fn shifted(&self, x: usize, y: usize) -> (usize, usize) {
        ((x as i32 + self.dx) as usize, (y as i32 + self.dy) as usize)
    }
}

fn ncc(a: &Plane, b: &Plane, overlap: &Overlap) -> f64 {
    let mut n = 0.0;
    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for y in overlap.y0..overlap.y1 {
        for x in overlap.x0..overlap.x1 {
            let (bx, by) = overlap.shifted(x, y);
            let va = a.at(x, y);
            let vb = b.at(bx, by);
            sa += va;
            sb += vb;
            saa += va * va;
            sbb += vb * vb;
            sab += va * vb;
            n += 1.0;
        }
    }
    if n == 0.0 {
        return 0.0;
    }
    let var_a = saa / n - (sa / n).powi(2);
    let var_b = sbb / n - (sb / n).powi(2);
    let cov = sab / n - (sa / n) * (sb / n);
    if var_a < 1e-9 || var_b < 1e-9 {
        // Flat content correlates only with equally flat content
        return if var_a < 1e-9 && var_b < 1e-9 && (sa - sb).abs() / n < 1.0 {
            1.0
        } else {
            0.0
        };
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

fn best_alignment(a: &Plane, b: &Plane) -> (Overlap, f64) {
    let mut best = (Overlap::new(0, 0), ncc(a, b, &Overlap::new(0, 0)));
    for dy in -MAX_SHIFT..=MAX_SHIFT {
        for dx in -MAX_SHIFT..=MAX_SHIFT {
            if dx == 0 && dy == 0 {
                continue;
            }
            let overlap = Overlap::new(dx, dy);
            let score = ncc(a, b, &overlap);
            if score > best.1 {
                best = (overlap, score);
            }
        }
    }
    best
}

#[derive(Debug, Clone, Copy, Default)]
struct RegionStats {
    ssim: f64,
    luminance: f64,
    structure: f64,
    windows: usize,
}

struct ViewComparison {
    alignment: f64,
    ssim: f64,
    regions: [[RegionStats; 3]; 3],
}

fn compare_planes(a: &Plane, b: &Plane) -> ViewComparison {
    let (overlap, correlation) = best_alignment(a, b);
    let mut regions = [[RegionStats::default(); 3]; 3];
    let mut total = 0.0;
    let mut windows = 0usize;

    let size = COMPARE_SIZE as usize;
    let mut wy = overlap.y0;
    while wy + WINDOW <= overlap.y1 {
        let mut wx = overlap.x0;
        while wx + WINDOW <= overlap.x1 {
            let (luminance, structure) = window_terms(a, b, &overlap, wx, wy);
            let ssim = luminance * structure;
            total += ssim;
            windows += 1;

            let row = ((wy + WINDOW / 2) * 3 / size).min(2);
            let col = ((wx + WINDOW / 2) * 3 / size).min(2);
            let region = &mut regions[row][col];
            region.ssim += ssim;
            region.luminance += luminance;
            region.structure += structure;
            region.windows += 1;

            wx += WINDOW;
        }
        wy += WINDOW;
    }

    for region in regions.iter_mut().flatten() {
        if region.windows > 0 {
            let n = region.windows as f64;
            region.ssim /= n;
            region.luminance /= n;
            region.structure /= n;
        }
    }

    ViewComparison {
        alignment: (correlation + 1.0) / 2.0,
        ssim: if windows > 0 { total / windows as f64 } else { 0.0 },
        regions,
    }
}

/// Luminance and contrast-structure SSIM terms of one window
fn window_terms(a: &Plane, b: &Plane, overlap: &Overlap, wx: usize, wy: usize) -> (f64, f64) {
    let n = (WINDOW * WINDOW) as f64;
    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for y in wy..wy + WINDOW {
        for x in wx..wx + WINDOW {
            let (bx, by) = overlap.shifted(x, y);
            let va = a.at(x, y);
            let vb = b.at(bx, by);
            sa += va;
            sb += vb;
            saa += va * va;
            sbb += vb * vb;
            sab += va * vb;
        }
    }
    let mu_a = sa / n;
    let mu_b = sb / n;
    let var_a = (saa / n - mu_a * mu_a).max(0.0);
    let var_b = (sbb / n - mu_b * mu_b).max(0.0);
    let cov = sab / n - mu_a * mu_b;

    let luminance = (2.0 * mu_a * mu_b + C1) / (mu_a * mu_a + mu_b * mu_b + C1);
    let structure = (2.0 * cov + C2) / (var_a + var_b + C2);
    (luminance, structure)
}

fn changed_areas(view: &str, comparison: &ViewComparison, threshold: f64) -> Vec<ChangedArea> {
    let mut areas = Vec::new();
    for (row, cols) in comparison.regions.iter().enumerate() {
        for (col, region) in cols.iter().enumerate() {
            if region.windows == 0 || region.ssim >= threshold {
                continue;
            }
            let luminance_loss = 1.0 - region.luminance;
            let structure_loss = 1.0 - region.structure;
            let change_type = if luminance_loss > structure_loss {
                ChangeType::Surface
            } else {
                ChangeType::Shape
            };
            areas.push(ChangedArea {
                area: format!("{}:{}", view, REGION_NAMES[row][col]),
                change_type,
                confidence: (1.0 - region.ssim).clamp(0.0, 1.0),
            });
        }
    }
    areas
}

/// Compare arrival and handover photos of the same package
pub fn compare(
    arrival_condition_id: &str,
    arrival: ViewPair<'_>,
    handover: ViewPair<'_>,
    change_threshold: f64,
) -> Result<ComparisonResult> {
    let mut alignment = 0.0;
    let mut ssim = 0.0;
    let mut areas = Vec::new();

    for (view, before, after) in [
        ("front", arrival.front, handover.front),
        ("side", arrival.side, handover.side),
    ] {
        let a = Plane::decode(before)?;
        let b = Plane::decode(after)?;
        let result = compare_planes(&a, &b);
        debug!(
            view,
            alignment = result.alignment,
            ssim = result.ssim,
            "view compared"
        );
        alignment += result.alignment;
        ssim += result.ssim;
        areas.extend(changed_areas(view, &result, change_threshold));
    }

    Ok(ComparisonResult {
        arrival_condition_id: arrival_condition_id.to_string(),
        alignment_score: alignment / 2.0,
        ssim_score: ssim / 2.0,
        change_detected: !areas.is_empty(),
        changed_areas: areas,
        source: MeasurementSource::Measured,
        computed_at: Utc::now(),
    })
}

/// Advisory damage suggestions derived from detected changes
pub fn suggest_tags(comparison: &ComparisonResult) -> Vec<AiSuggestedTag> {
    comparison
        .changed_areas
        .iter()
        .map(|area| AiSuggestedTag {
            kind: match area.change_type {
                ChangeType::Surface => "stains".to_string(),
                ChangeType::Shape => "dent".to_string(),
            },
            confidence: area.confidence,
            area: area.area.clone(),
        })
        .collect()
}
