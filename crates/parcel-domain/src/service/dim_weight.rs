//! Dimensional weight calculation

/// Volumetric divisor in mm³ per kg. Kept exact for compatibility with
/// previously recorded measurements.
pub const DIM_WEIGHT_DIVISOR_MM3: f64 = 5_000_000.0;

/// Dimensional weight in kg from package dimensions in millimetres.
///
/// Negative or non-finite dimensions count as zero, so the result is never
/// negative.
pub fn dimensional_weight_kg(length_mm: f64, width_mm: f64, height_mm: f64) -> f64 {
    let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
    sanitize(length_mm) * sanitize(width_mm) * sanitize(height_mm) / DIM_WEIGHT_DIVISOR_MM3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_box() {
        // 200 x 150 x 80 mm = 2,400,000 mm3 -> 0.48 kg
        let weight = dimensional_weight_kg(200.0, 150.0, 80.0);
        assert!((weight - 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dimension() {
        assert_eq!(dimensional_weight_kg(0.0, 150.0, 80.0), 0.0);
    }

    #[test]
    fn test_negative_and_nan_are_clamped() {
        assert_eq!(dimensional_weight_kg(-10.0, 150.0, 80.0), 0.0);
        assert_eq!(dimensional_weight_kg(f64::NAN, 150.0, 80.0), 0.0);
        assert!(dimensional_weight_kg(f64::INFINITY, 1.0, 1.0) >= 0.0);
    }

    #[test]
    fn test_one_cubic_metre() {
        // 1000 mm cube -> 1e9 / 5e6 = 200 kg
        let weight = dimensional_weight_kg(1000.0, 1000.0, 1000.0);
        assert!((weight - 200.0).abs() < 1e-9);
    }
}
