//! Dimension measurement from the front/side photo pair

use crate::raster::WorkingImage;
use crate::ruler::{self, MarkerSpec};
use crate::silhouette::{self, Silhouette};
use parcel_domain::service::dimensional_weight_kg;
use parcel_types::{DimensionMeasurement, MeasurementSource, Result, RulerDetection};
use tracing::{debug, info};

/// Calibration and measurement for one photo pair
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub ruler: RulerDetection,
    pub measurement: DimensionMeasurement,
}

/// Marker-calibrated dimension engine
#[derive(Debug, Clone)]
pub struct DimensionEngine {
    marker: MarkerSpec,
}

impl DimensionEngine {
    pub fn new(marker: MarkerSpec) -> Result<Self> {
        marker.validate()?;
        Ok(Self { marker })
    }

    pub fn marker(&self) -> &MarkerSpec {
        &self.marker
    }

    /// Decode both photos and measure. Decoded buffers are released before
    /// returning.
    pub fn measure(&self, front: &[u8], side: &[u8]) -> Result<EngineOutput> {
        let front = WorkingImage::decode_checked(front)?;
        let side = WorkingImage::decode_checked(side)?;
        Ok(self.measure_images(&front, &side))
    }

    pub fn measure_images(&self, front: &WorkingImage, side: &WorkingImage) -> EngineOutput {
        let calibration = ruler::calibrate(front, &self.marker);
        let ruler = calibration.detection;

        let front_shape = silhouette::extract(front, calibration.marker_box.as_ref());
        // The side shot carries no marker of its own
        let side_shape = silhouette::extract(side, None);

        let measurement = match (front_shape, side_shape) {
            (Some(f), Some(s)) => measure_silhouettes(&ruler, front, &f, side, &s),
            _ => {
                debug!("no package silhouette found");
                empty_measurement()
            }
        };

        info!(
            length_mm = measurement.length_mm,
            width_mm = measurement.width_mm,
            height_mm = measurement.height_mm,
            confidence = measurement.confidence,
            "package measured"
        );

        EngineOutput { ruler, measurement }
    }
}

fn empty_measurement() -> DimensionMeasurement {
    DimensionMeasurement {
        length_mm: 0.0,
        width_mm: 0.0,
        height_mm: 0.0,
        dim_weight_kg: 0.0,
        confidence: 0.0,
        area_consistency: 0.0,
        source: MeasurementSource::Measured,
    }
}

fn measure_silhouettes(
    ruler: &RulerDetection,
    front: &WorkingImage,
    front_shape: &Silhouette,
    side: &WorkingImage,
    side_shape: &Silhouette,
) -> DimensionMeasurement {
    let ppm = ruler.pixels_per_mm;
    let to_mm = |image: &WorkingImage, px: usize| image.to_original(px as f64) / ppm;

    let box_w = to_mm(front, front_shape.bbox.width());
    let box_h = to_mm(front, front_shape.bbox.height());
    let length_mm = box_w.max(box_h);
    let width_mm = box_w.min(box_h);
    let height_mm = to_mm(side, side_shape.bbox.height());

    let area_mm2 = |image: &WorkingImage, count: usize| {
        let per_px = 1.0 / (image.scale * image.scale * ppm * ppm);
        count as f64 * per_px
    };
    let front_area = area_mm2(front, front_shape.pixel_count);
    let side_area = area_mm2(side, side_shape.pixel_count);
    let area_consistency = if front_area > 0.0 && side_area > 0.0 {
        front_area.min(side_area) / front_area.max(side_area)
    } else {
        0.0
    };

    DimensionMeasurement {
        length_mm,
        width_mm,
        height_mm,
        dim_weight_kg: dimensional_weight_kg(length_mm, width_mm, height_mm),
        confidence: ruler.confidence.min(area_consistency).clamp(0.0, 1.0),
        area_consistency,
        source: MeasurementSource::Measured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn canvas() -> GrayImage {
        GrayImage::from_pixel(800, 600, Luma([200]))
    }

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, value: u8) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn pair() -> (WorkingImage, WorkingImage) {
        // 2 px/mm: marker 203 x 152 px, package 150 x 60 mm top, 40 mm tall
        let mut front = canvas();
        fill(&mut front, 40, 40, 203, 152, 40);
        fill(&mut front, 350, 350, 300, 120, 60);
        let mut side = canvas();
        fill(&mut side, 250, 260, 300, 80, 60);
        (WorkingImage::from_gray(front), WorkingImage::from_gray(side))
    }

    #[test]
    fn test_measures_synthetic_package() {
        let engine = DimensionEngine::new(MarkerSpec::default()).unwrap();
        let (front, side) = pair();
        let out = engine.measure_images(&front, &side);
        let m = &out.measurement;

        assert!(out.ruler.is_detected());
        assert!((m.length_mm - 150.0).abs() / 150.0 < 0.10, "length {}", m.length_mm);
        assert!((m.width_mm - 60.0).abs() / 60.0 < 0.10, "width {}", m.width_mm);
        assert!((m.height_mm - 40.0).abs() / 40.0 < 0.10, "height {}", m.height_mm);
        assert!((m.area_consistency - 24_000.0 / 36_000.0).abs() < 1e-9);
        assert_eq!(m.source, MeasurementSource::Measured);
    }

    #[test]
    fn test_confidence_bounded_by_ruler_and_consistency() {
        let engine = DimensionEngine::new(MarkerSpec::default()).unwrap();
        let (front, side) = pair();
        let out = engine.measure_images(&front, &side);
        let m = &out.measurement;
        assert!(m.confidence <= 1.0);
        assert!(m.confidence <= out.ruler.confidence);
        assert!(m.confidence <= m.area_consistency);
    }

    #[test]
    fn test_measurement_is_deterministic() {
        let engine = DimensionEngine::new(MarkerSpec::default()).unwrap();
        let (front, side) = pair();
        let a = engine.measure_images(&front, &side);
        let b = engine.measure_images(&front, &side);
        assert_eq!(a, b);
        assert!(a.measurement.dim_weight_kg >= 0.0);
    }

    #[test]
    fn test_blank_side_gives_zero_confidence() {
        let engine = DimensionEngine::new(MarkerSpec::default()).unwrap();
        let (front, _) = pair();
        let blank = WorkingImage::from_gray(canvas());
        let m = engine.measure_images(&front, &blank).measurement;
        assert_eq!(m.confidence, 0.0);
        assert_eq!(m.length_mm, 0.0);
        assert_eq!(m.dim_weight_kg, 0.0);
    }

    #[test]
    fn test_rejects_undersized_photo() {
        let engine = DimensionEngine::new(MarkerSpec::default()).unwrap();
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 240, Luma([10])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        assert!(engine.measure(&bytes, &bytes).is_err());
    }
}
