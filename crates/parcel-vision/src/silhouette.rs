//! Package silhouette extraction

use crate::contour::{self, BoundingBox, Mask};
use crate::raster::{self, WorkingImage};

/// Components covering this much of the frame are background, not a package
const MAX_FRAME_FRACTION: f64 = 0.90;

/// Components overlapping the marker this much are the marker itself
const MARKER_IOU: f64 = 0.8;

/// Largest foreground blob, in working pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silhouette {
    pub bbox: BoundingBox,
    pub pixel_count: usize,
}

/// Otsu foreground mask with polarity chosen so the frame border is background
pub fn foreground_mask(image: &WorkingImage) -> Option<Mask> {
    let gray = &image.gray;
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return None;
    }
    let threshold = raster::otsu_threshold(&raster::histogram(gray.as_raw().iter().copied()))?;

    let raw = gray.as_raw();
    let mut border_total = 0usize;
    let mut border_high = 0usize;
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                border_total += 1;
                if raw[y * w + x] > threshold {
                    border_high += 1;
                }
            }
        }
    }
    let bright_background = border_high * 2 >= border_total;

    Some(Mask {
        width: w,
        height: h,
        data: raw
            .iter()
            .map(|&v| (v > threshold) != bright_background)
            .collect(),
    })
}

/// Largest 8-connected foreground component, skipping the marker
pub fn extract(image: &WorkingImage, exclude: Option<&BoundingBox>) -> Option<Silhouette> {
    let mask = foreground_mask(image)?;
    let frame_area = mask.area() as f64;

    contour::connected_components(&mask)
        .into_iter()
        .filter(|c| (c.bbox.area() as f64) < MAX_FRAME_FRACTION * frame_area)
        .filter(|c| exclude.map_or(true, |marker| c.bbox.iou(marker) <= MARKER_IOU))
        .max_by_key(|c| c.pixel_count())
        .map(|c| Silhouette {
            bbox: c.bbox,
            pixel_count: c.pixel_count(),
        })
}
