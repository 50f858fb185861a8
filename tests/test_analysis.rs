mod common;

use approx::assert_relative_eq;
use common::*;
use leeway::models::ImageShape;

#[test]
fn test_two_blob_image_yields_one_pair() -> anyhow::Result<()> {
    let analyzer = Analyzer::default();
    let img = two_tooth_radiograph();

    let enhanced = analyzer.enhance(&img);
    let candidates = analyzer.extract_candidates(&enhanced);
    assert_eq!(candidates.len(), 2);

    let shape = ImageShape::of(&enhanced);
    let teeth = analyzer.classify_candidates(&candidates, shape);
    let labels: Vec<ToothType> = teeth.iter().map(|t| t.label).collect();
    assert_eq!(
        labels.iter().filter(|l| **l == ToothType::PrimaryMolar).count(),
        1
    );
    assert_eq!(labels.iter().filter(|l| **l == ToothType::Premolar).count(), 1);

    let pairs = analyzer.validate_pairs(&teeth);
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].molar.candidate.area > pairs[0].premolar.candidate.area);

    let result = analyzer.analyze(&img, None)?;
    assert_eq!(result.detected_region_count, 2);
    assert_eq!(result.classified_tooth_count, 2);
    assert_eq!(result.validated_pair_count, 1);
    assert!(result.molar.width_mm > result.premolar.width_mm);
    assert_eq!(result.resolution, ImageShape::new(400, 300));
    assert_relative_eq!(result.calibration.mm_per_pixel, 0.1);
    Ok(())
}

#[test]
fn test_decoded_png_matches_in_memory_image() -> anyhow::Result<()> {
    let analyzer = Analyzer::default();
    let img = two_tooth_radiograph();
    let file = save_temp_png(&img);

    let decoded = image::ImageReader::open(file.path())?.decode()?;
    let from_disk = analyzer.analyze(&decoded, None)?;
    let in_memory = analyzer.analyze(&img, None)?;
    assert_eq!(from_disk.molar, in_memory.molar);
    assert_eq!(from_disk.premolar, in_memory.premolar);
    Ok(())
}

#[test]
fn test_known_rectangles_give_moderate_difference() -> anyhow::Result<()> {
    let analyzer = Analyzer::default();
    let calibration = Calibration::new(0.12).with_magnification(1.25);
    let candidates = vec![
        rectangle_candidate(600, 360, 100, 150),
        rectangle_candidate(540, 320, 80, 130),
    ];

    let result = analyzer.analyze_candidates(
        candidates,
        ImageShape::new(1000, 800),
        Some(calibration),
    )?;

    assert_eq!(result.molar.method, WidthMethod::PrincipalAxis);
    assert_relative_eq!(result.molar.width_mm, 9.6, epsilon = 1e-6);
    assert_relative_eq!(result.premolar.width_mm, 7.68, epsilon = 1e-6);
    assert_relative_eq!(result.difference.value_mm, 1.92, epsilon = 1e-6);
    assert_relative_eq!(result.difference.percentage, 25.0, epsilon = 1e-6);
    assert_eq!(result.difference.significance, Significance::Moderate);
    assert_eq!(result.recommendations.len(), 5);
    assert!(result.quality_warnings.is_empty());
    assert_relative_eq!(result.anatomical_score, 0.9, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_uniform_image_has_insufficient_regions() {
    let analyzer = Analyzer::default();
    let err = analyzer
        .analyze(&blank_radiograph(120, 90), None)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientRegions { detected: 0 }));
    assert_eq!(err.suggestions().len(), 3);
}

#[test]
fn test_single_candidate_has_insufficient_regions() {
    let analyzer = Analyzer::default();
    let err = analyzer
        .analyze_candidates(
            vec![rectangle_candidate(600, 360, 100, 150)],
            ImageShape::new(1000, 800),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientRegions { detected: 1 }));
}

#[test]
fn test_candidates_below_floor_have_no_valid_pairs() {
    let analyzer = Analyzer::default();
    let weak = |cx: i32| {
        let mut c = rectangle_candidate(cx, 240, 40, 100);
        c.compactness = 0.1;
        c.aspect_ratio = 2.5;
        c
    };

    let err = analyzer
        .analyze_candidates(vec![weak(190), weak(210)], ImageShape::new(1000, 800), None)
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::NoValidPairs {
            detected: 2,
            classified: 0
        }
    ));
}

#[test]
fn test_tiny_contour_falls_back_to_bounding_box() {
    let analyzer = Analyzer::default();
    let contour = Contour::new(vec![
        imageproc::point::Point::new(0, 0),
        imageproc::point::Point::new(12, 0),
        imageproc::point::Point::new(12, 20),
        imageproc::point::Point::new(0, 20),
    ]);
    let m = analyzer.measure_width(&contour, Calibration::new(0.5));
    assert_eq!(m.method, WidthMethod::BoundingBox);
    assert_relative_eq!(m.width_pixels, 12.0);
    assert_relative_eq!(m.width_mm, 6.0);
}

#[test]
fn test_classification_is_deterministic() {
    let analyzer = Analyzer::default();
    let candidates = vec![
        rectangle_candidate(600, 360, 100, 150),
        rectangle_candidate(540, 320, 80, 130),
    ];
    let shape = ImageShape::new(1000, 800);
    let first = analyzer.classify_candidates(&candidates, shape);
    let second = analyzer.classify_candidates(&candidates, shape);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence, b.confidence);
    }
}

#[test]
fn test_intraoral_profile_uses_its_pixel_size() -> anyhow::Result<()> {
    let config =
        AnalysisConfig::profile(leeway::ImageType::Intraoral, leeway::QualityMode::Standard);
    let analyzer = Analyzer::new(config)?;
    let result = analyzer.analyze_candidates(
        vec![
            rectangle_candidate(600, 360, 100, 150),
            rectangle_candidate(540, 320, 80, 130),
        ],
        ImageShape::new(1000, 800),
        None,
    )?;
    assert_relative_eq!(result.calibration.mm_per_pixel, 0.05);
    assert_relative_eq!(result.molar.width_mm, 5.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_result_serializes_to_json() -> anyhow::Result<()> {
    let analyzer = Analyzer::default();
    let result = analyzer.analyze_candidates(
        vec![
            rectangle_candidate(600, 360, 100, 150),
            rectangle_candidate(540, 320, 80, 130),
        ],
        ImageShape::new(1000, 800),
        Some(Calibration::new(0.12).with_magnification(1.25)),
    )?;
    let value = serde_json::to_value(&result)?;
    assert_eq!(value["difference"]["significance"], "Moderate");
    assert_eq!(value["molar"]["method"], "principal_axis");
    assert_eq!(value["validated_pair_count"], 1);
    Ok(())
}
