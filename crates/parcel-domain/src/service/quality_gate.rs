//! Photo quality gate
//!
//! Decides whether a captured photo pair may be finalized. The gate never
//! blocks measurement itself; it only controls the confirm step.

use parcel_types::{Deficiency, FrontQuality, PhotoQuality, QualityReport};

/// Minimum blur (sharpness) score for either photo
pub const MIN_BLUR_SCORE: f64 = 60.0;

/// Exposure below this is reported, but does not block
pub const MIN_EXPOSURE_SCORE: f64 = 40.0;

/// Evaluate the front/side quality scores
pub fn evaluate(front: &FrontQuality, side: &PhotoQuality) -> QualityReport {
    let mut deficiencies = Vec::new();

    if !front.has_scale_reference {
        deficiencies.push(Deficiency::MissingScaleReference);
    }
    if front.blur_score < MIN_BLUR_SCORE {
        deficiencies.push(Deficiency::FrontBlurTooLow);
    }
    if side.blur_score < MIN_BLUR_SCORE {
        deficiencies.push(Deficiency::SideBlurTooLow);
    }
    if front.exposure_score < MIN_EXPOSURE_SCORE {
        deficiencies.push(Deficiency::FrontExposureTooLow);
    }
    if side.exposure_score < MIN_EXPOSURE_SCORE {
        deficiencies.push(Deficiency::SideExposureTooLow);
    }

    let quality_passed = !deficiencies.iter().any(|d| d.is_blocking());

    QualityReport {
        quality_passed,
        deficiencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front(blur: f64, exposure: f64, has_ref: bool) -> FrontQuality {
        FrontQuality {
            blur_score: blur,
            exposure_score: exposure,
            has_scale_reference: has_ref,
            ruler_confidence: if has_ref { 0.8 } else { 0.3 },
        }
    }

    fn side(blur: f64, exposure: f64) -> PhotoQuality {
        PhotoQuality {
            blur_score: blur,
            exposure_score: exposure,
        }
    }

    #[test]
    fn test_good_pair_passes() {
        let report = evaluate(&front(75.0, 80.0, true), &side(70.0, 80.0));
        assert!(report.quality_passed);
        assert!(report.deficiencies.is_empty());
    }

    #[test]
    fn test_missing_reference_fails_regardless_of_blur() {
        let report = evaluate(&front(100.0, 100.0, false), &side(100.0, 100.0));
        assert!(!report.quality_passed);
        assert!(report
            .deficiencies
            .contains(&Deficiency::MissingScaleReference));
    }

    #[test]
    fn test_blur_threshold_is_inclusive() {
        assert!(evaluate(&front(60.0, 80.0, true), &side(60.0, 80.0)).quality_passed);
        assert!(!evaluate(&front(59.99, 80.0, true), &side(60.0, 80.0)).quality_passed);
        assert!(!evaluate(&front(60.0, 80.0, true), &side(59.99, 80.0)).quality_passed);
    }

    #[test]
    fn test_exposure_reported_but_not_blocking() {
        let report = evaluate(&front(80.0, 5.0, true), &side(80.0, 10.0));
        assert!(report.quality_passed);
        assert_eq!(
            report.deficiencies,
            vec![Deficiency::FrontExposureTooLow, Deficiency::SideExposureTooLow]
        );
    }

    #[test]
    fn test_gate_matches_rule_over_score_domain() {
        let scores: Vec<f64> = (0..=100)
            .map(f64::from)
            .chain([59.5, 59.999, 60.001, 60.5])
            .collect();

        for &has_ref in &[true, false] {
            for &fb in &scores {
                for &sb in &scores {
                    for &exposure in &[0.0, 39.9, 40.0, 100.0] {
                        let report =
                            evaluate(&front(fb, exposure, has_ref), &side(sb, exposure));
                        let expected = has_ref && fb >= 60.0 && sb >= 60.0;
                        assert_eq!(
                            report.quality_passed, expected,
                            "has_ref={} front={} side={} exposure={}",
                            has_ref, fb, sb, exposure
                        );
                    }
                }
            }
        }
    }
}
