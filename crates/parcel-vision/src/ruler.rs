//! Calibration marker detection
//!
//! Finds the printed reference card in the front photo and derives the
//! pixels-per-millimetre scale from it. Detection never fails: when no
//! candidate qualifies the default 96 dpi scale is returned at low
//! confidence.

use crate::contour::{self, BoundingBox, Component, Mask};
use crate::raster::{self, WorkingImage};
use parcel_types::{Error, Point, Result, RulerDetection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 96 dpi expressed in pixels per millimetre
pub const DEFAULT_PIXELS_PER_MM: f64 = 3.7795;

/// Confidence reported with the default scale
pub const DEFAULT_SCALE_CONFIDENCE: f64 = 0.3;

/// Detection confidence never exceeds this
pub const MAX_RULER_CONFIDENCE: f64 = 0.95;

const SMOOTHING_SIGMA: f32 = 1.4;
const MIN_AREA_FRACTION: f64 = 0.0005;
const MAX_AREA_FRACTION: f64 = 0.90;
const MIN_EXTENT: f64 = 0.7;
const ASPECT_TOLERANCE: f64 = 0.25;
const APPROX_EPSILON_FRACTION: f64 = 0.02;
/// Edge threshold floor on the normalised 0-255 magnitude scale
const MIN_EDGE_THRESHOLD: u8 = 24;

/// Physical size of the printed reference card
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSpec {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Default for MarkerSpec {
    /// 4 x 3 inch card
    fn default() -> Self {
        Self {
            width_mm: 101.6,
            height_mm: 76.2,
        }
    }
}

impl MarkerSpec {
    pub fn new(width_mm: f64, height_mm: f64) -> Result<Self> {
        let spec = Self {
            width_mm,
            height_mm,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(self.width_mm) || !valid(self.height_mm) {
            return Err(Error::Validation(format!(
                "marker size must be positive, got {} x {} mm",
                self.width_mm, self.height_mm
            )));
        }
        Ok(())
    }

    pub fn long_side(&self) -> f64 {
        self.width_mm.max(self.height_mm)
    }

    pub fn short_side(&self) -> f64 {
        self.width_mm.min(self.height_mm)
    }

    pub fn aspect(&self) -> f64 {
        self.long_side() / self.short_side()
    }
}

/// Ruler detection plus the marker's box in working coordinates
#[derive(Debug, Clone)]
pub struct Calibration {
    pub detection: RulerDetection,
    pub marker_box: Option<BoundingBox>,
}

impl Calibration {
    fn default_scale() -> Self {
        Self {
            detection: default_detection(),
            marker_box: None,
        }
    }
}

/// Detection used when no marker is found
pub fn default_detection() -> RulerDetection {
    RulerDetection {
        pixels_per_mm: DEFAULT_PIXELS_PER_MM,
        corners: Vec::new(),
        perspective_corrected: false,
        confidence: DEFAULT_SCALE_CONFIDENCE,
    }
}

struct Candidate {
    bbox: BoundingBox,
    corners: Vec<(f64, f64)>,
    filled_area: usize,
    extent: f64,
}

/// Binary edge map: smoothed Sobel magnitude above Otsu's threshold
fn edge_mask(image: &WorkingImage) -> Mask {
    let smoothed = raster::smooth(&image.gray, SMOOTHING_SIGMA);
    let magnitude = raster::sobel_magnitude(&smoothed);
    let (w, h) = (smoothed.width() as usize, smoothed.height() as usize);

    let max = magnitude.iter().copied().fold(0.0f32, f32::max);
    if max <= f32::EPSILON {
        return Mask::from_fn(w, h, |_, _| false);
    }
    let normalised: Vec<u8> = magnitude
        .iter()
        .map(|m| (m / max * 255.0).round() as u8)
        .collect();

    let hist = raster::histogram(normalised.iter().copied());
    let threshold = raster::otsu_threshold(&hist)
        .unwrap_or(MIN_EDGE_THRESHOLD)
        .max(MIN_EDGE_THRESHOLD);

    Mask {
        width: w,
        height: h,
        data: normalised.iter().map(|&v| v > threshold).collect(),
    }
}

fn quadrilateral(component: &Component, mask_width: usize) -> Option<Vec<(f64, f64)>> {
    let hull = contour::convex_hull(&component.row_extremes(mask_width));
    if hull.len() < 4 {
        return None;
    }
    let epsilon = APPROX_EPSILON_FRACTION * contour::perimeter(&hull);
    let approx = contour::approximate_closed(&hull, epsilon);
    (approx.len() == 4).then_some(approx)
}

fn aspect_matches(bbox: &BoundingBox, marker: &MarkerSpec) -> bool {
    let long = bbox.width().max(bbox.height()) as f64;
    let short = bbox.width().min(bbox.height()) as f64;
    let ratio = (long / short) / marker.aspect();
    (ratio - 1.0).abs() <= ASPECT_TOLERANCE
}

/// Locate the marker in a front image
pub fn calibrate(image: &WorkingImage, marker: &MarkerSpec) -> Calibration {
    let mask = edge_mask(image);
    let frame_area = mask.area() as f64;
    if frame_area == 0.0 {
        return Calibration::default_scale();
    }
    let min_area = MIN_AREA_FRACTION * frame_area;
    let max_area = MAX_AREA_FRACTION * frame_area;

    let mut best: Option<Candidate> = None;
    for component in contour::connected_components(&mask) {
        // Cheap reject before filling
        if (component.bbox.area() as f64) < min_area {
            continue;
        }
        let filled_area = component.filled_area(mask.width);
        let area = filled_area as f64;
        if area < min_area || area > max_area {
            continue;
        }
        let extent = area / component.bbox.area() as f64;
        if extent <= MIN_EXTENT || !aspect_matches(&component.bbox, marker) {
            continue;
        }
        let Some(corners) = quadrilateral(&component, mask.width) else {
            continue;
        };

        if best.as_ref().map_or(true, |b| filled_area > b.filled_area) {
            best = Some(Candidate {
                bbox: component.bbox,
                corners,
                filled_area,
                extent,
            });
        }
    }

    let Some(candidate) = best else {
        debug!("no marker candidate, using default scale");
        return Calibration::default_scale();
    };

    let box_w = image.to_original(candidate.bbox.width() as f64);
    let box_h = image.to_original(candidate.bbox.height() as f64);
    let (marker_w, marker_h) = if box_w >= box_h {
        (marker.long_side(), marker.short_side())
    } else {
        (marker.short_side(), marker.long_side())
    };
    let pixels_per_mm = (box_w / marker_w + box_h / marker_h) / 2.0;
    let confidence = candidate.extent.min(MAX_RULER_CONFIDENCE);

    debug!(
        pixels_per_mm,
        confidence,
        box_w,
        box_h,
        "marker detected"
    );

    let corners = candidate
        .corners
        .iter()
        .map(|&(x, y)| Point::new(image.to_original(x), image.to_original(y)))
        .collect();

    Calibration {
        detection: RulerDetection {
            pixels_per_mm,
            corners,
            perspective_corrected: false,
            confidence,
        },
        marker_box: Some(candidate.bbox),
    }
}

/// Locate the marker on an encoded front photo.
///
/// `None` when the photo cannot be decoded or carries no marker.
pub fn locate(bytes: &[u8], marker: &MarkerSpec) -> Option<RulerDetection> {
    let image = WorkingImage::decode(bytes).ok()?;
    let calibration = calibrate(&image, marker);
    calibration.marker_box.map(|_| calibration.detection)
}
