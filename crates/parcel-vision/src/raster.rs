//! Raster helpers shared by the detectors

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader};
use parcel_types::{Error, Result};
use std::io::Cursor;

/// Minimum accepted photo size (long side x short side)
pub const MIN_LONG_SIDE: u32 = 640;
pub const MIN_SHORT_SIDE: u32 = 480;

/// Detectors run on images no larger than this on their long side
pub const MAX_WORKING_SIDE: u32 = 1024;

/// Read the pixel dimensions from the image header without decoding it
pub fn photo_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Reject photos below the minimum resolution
pub fn check_resolution(width: u32, height: u32) -> Result<()> {
    let (long, short) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };
    if long < MIN_LONG_SIDE || short < MIN_SHORT_SIDE {
        return Err(Error::InvalidImage(format!(
            "{}x{} is below the minimum {}x{}",
            width, height, MIN_LONG_SIDE, MIN_SHORT_SIDE
        )));
    }
    Ok(())
}

/// Header-only validation of a captured photo
pub fn validate_photo(bytes: &[u8]) -> Result<(u32, u32)> {
    let (width, height) = photo_dimensions(bytes)?;
    check_resolution(width, height)?;
    Ok((width, height))
}

/// Grayscale image at working resolution
#[derive(Debug, Clone)]
pub struct WorkingImage {
    pub gray: GrayImage,
    /// Working pixels per original pixel (<= 1.0)
    pub scale: f64,
    pub original_width: u32,
    pub original_height: u32,
}

impl WorkingImage {
    /// Decode encoded image bytes. The full-resolution buffer is dropped as
    /// soon as the grayscale copy exists.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        let gray = decoded.to_luma8();
        drop(decoded);
        Ok(Self::from_gray(gray))
    }

    /// Decode and enforce the minimum resolution
    pub fn decode_checked(bytes: &[u8]) -> Result<Self> {
        let image = Self::decode(bytes)?;
        check_resolution(image.original_width, image.original_height)?;
        Ok(image)
    }

    pub fn from_gray(gray: GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let long = width.max(height);
        if long <= MAX_WORKING_SIDE || long == 0 {
            return Self {
                gray,
                scale: 1.0,
                original_width: width,
                original_height: height,
            };
        }

        let scale = f64::from(MAX_WORKING_SIDE) / f64::from(long);
        let new_w = ((f64::from(width) * scale).round() as u32).max(1);
        let new_h = ((f64::from(height) * scale).round() as u32).max(1);
        let resized = imageops::resize(&gray, new_w, new_h, FilterType::Triangle);
        Self {
            gray: resized,
            scale,
            original_width: width,
            original_height: height,
        }
    }

    /// Convert a working-space length to original pixels
    pub fn to_original(&self, value: f64) -> f64 {
        value / self.scale
    }

    pub fn pixel_count(&self) -> usize {
        self.gray.width() as usize * self.gray.height() as usize
    }
}

/// Gaussian smoothing
pub fn smooth(gray: &GrayImage, sigma: f32) -> GrayImage {
    imageops::blur(gray, sigma)
}

/// Sobel gradient magnitude, row-major. Border pixels are zero.
pub fn sobel_magnitude(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    let raw = gray.as_raw();
    let px = |x: usize, y: usize| f32::from(raw[y * w + x]);

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            out[y * w + x] = (gx * gx + gy * gy).sqrt();
        }
    }
    out
}

/// Intensity histogram
pub fn histogram(values: impl Iterator<Item = u8>) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for v in values {
        hist[v as usize] += 1;
    }
    hist
}

/// Otsu's threshold: values `<= t` form the lower class.
/// Returns `None` when the histogram has a single populated bin.
pub fn otsu_threshold(hist: &[u64; 256]) -> Option<u8> {
    let total: u64 = hist.iter().sum();
    if total == 0 || hist.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }

    let total_f = total as f64;
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_low = 0.0;
    let mut sum_low = 0.0;
    let mut best_t = 0u8;
    let mut best_var = -1.0;

    for (t, &count) in hist.iter().enumerate() {
        weight_low += count as f64;
        if weight_low == 0.0 {
            continue;
        }
        let weight_high = total_f - weight_low;
        if weight_high == 0.0 {
            break;
        }
        sum_low += t as f64 * count as f64;
        let mean_low = sum_low / weight_low;
        let mean_high = (sum_all - sum_low) / weight_high;
        let between = weight_low * weight_high * (mean_low - mean_high).powi(2);
        if between > best_var {
            best_var = between;
            best_t = t as u8;
        }
    }

    Some(best_t)
}

/// Variance of the 4-neighbour Laplacian
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let raw = gray.as_raw();
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0.0f64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = f64::from(raw[y * w + x]);
            let lap = f64::from(raw[(y - 1) * w + x])
                + f64::from(raw[(y + 1) * w + x])
                + f64::from(raw[y * w + x - 1])
                + f64::from(raw[y * w + x + 1])
                - 4.0 * c;
            sum += lap;
            sum_sq += lap * lap;
            n += 1.0;
        }
    }

    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
