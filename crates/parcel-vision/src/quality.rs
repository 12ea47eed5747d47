//! Photo sharpness/exposure scoring and marker presence

use crate::raster::{self, WorkingImage};
use parcel_types::{FrontQuality, PhotoQuality, Result, RulerDetection};

/// Laplacian variance at which the blur score reaches 50
const BLUR_HALF_POINT: f64 = 120.0;

const CLIP_LOW: u8 = 8;
const CLIP_HIGH: u8 = 247;

/// Sharpness score (0-100) from the Laplacian variance
pub fn blur_score(image: &WorkingImage) -> f64 {
    let variance = raster::laplacian_variance(&image.gray);
    100.0 * variance / (variance + BLUR_HALF_POINT)
}

/// Exposure score (0-100): penalises a mean far from mid-grey and clipped pixels
pub fn exposure_score(image: &WorkingImage) -> f64 {
    let raw = image.gray.as_raw();
    if raw.is_empty() {
        return 0.0;
    }
    let n = raw.len() as f64;
    let mean = raw.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let clipped = raw
        .iter()
        .filter(|&&v| v < CLIP_LOW || v > CLIP_HIGH)
        .count() as f64
        / n;

    let centred = 1.0 - (mean - 128.0).abs() / 128.0;
    (100.0 * centred * (1.0 - clipped)).clamp(0.0, 100.0)
}

pub fn score_image(image: &WorkingImage) -> PhotoQuality {
    PhotoQuality {
        blur_score: blur_score(image),
        exposure_score: exposure_score(image),
    }
}

/// Combine plain scores with a marker detection
pub fn front_quality(scores: PhotoQuality, ruler: &RulerDetection) -> FrontQuality {
    FrontQuality {
        blur_score: scores.blur_score,
        exposure_score: scores.exposure_score,
        has_scale_reference: ruler.is_detected(),
        ruler_confidence: ruler.confidence,
    }
}

/// Score a photo from its encoded bytes
pub fn score_photo(bytes: &[u8]) -> Result<PhotoQuality> {
    let image = WorkingImage::decode(bytes)?;
    Ok(score_image(&image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruler;
    use image::{GrayImage, Luma};

    #[test]
    fn test_flat_image_is_blurry() {
        let image = WorkingImage::from_gray(GrayImage::from_pixel(64, 64, Luma([128])));
        assert_eq!(blur_score(&image), 0.0);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        let gray = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 2 + y / 2) % 2 == 0 { 40 } else { 210 }])
        });
        let score = blur_score(&WorkingImage::from_gray(gray));
        assert!(score > 90.0, "score = {}", score);
        assert!(score <= 100.0);
    }

    #[test]
    fn test_exposure_mid_grey_is_best() {
        let mid = WorkingImage::from_gray(GrayImage::from_pixel(32, 32, Luma([128])));
        assert!((exposure_score(&mid) - 100.0).abs() < 1e-9);

        let dark = WorkingImage::from_gray(GrayImage::from_pixel(32, 32, Luma([20])));
        assert!(exposure_score(&dark) < 20.0);

        let black = WorkingImage::from_gray(GrayImage::from_pixel(32, 32, Luma([0])));
        assert_eq!(exposure_score(&black), 0.0);
    }

    #[test]
    fn test_front_quality_reflects_marker() {
        let scores = PhotoQuality {
            blur_score: 80.0,
            exposure_score: 70.0,
        };
        let none = ruler::default_detection();
        let q = front_quality(scores, &none);
        assert!(!q.has_scale_reference);
        assert!((q.ruler_confidence - 0.3).abs() < 1e-12);
        assert_eq!(q.photo(), scores);
    }
}
