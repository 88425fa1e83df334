//! Tests for plateau detection, normalisation and the corrected length scale

#[cfg(test)]
mod tests {
    use crate::unit::{disc_image, tile_mosaic};
    use ndarray::{Array3, ArrayD, IxDyn, Zip};
    use representativity::AnalysisError;
    use representativity::analysis::characteristic::{
        Correction, apply_correction, cls_from_correlation, correction_needed,
        normalisation_coefficient, plateau_distance, plateau_level, ring_boundaries, tpc_to_cls,
    };
    use representativity::analysis::correlation::{radial_tpc, two_point_correlation};
    use representativity::io::configuration::ModelConfig;
    use representativity::math::probability::linspace;
    use representativity::spatial::image::BinaryImage;
    use representativity::spatial::offsets::OffsetGrid;

    // Correlation that sits above the plateau inside `radius` and on it beyond
    fn stepped_correlation(grid: &OffsetGrid, pf: f64, radius: f64) -> ArrayD<f64> {
        let plateau = pf * pf;
        let raised = 0.5f64.mul_add(pf - plateau, plateau);
        grid.distances()
            .mapv(|distance| if distance < radius { raised } else { plateau })
    }

    // Tests evenly spaced rings for small grids and fixed-width rings for large ones
    // Verified by always using fixed-width rings
    #[test]
    fn test_ring_boundaries() {
        let config = ModelConfig::default();

        let small = ring_boundaries(84.85, 2, &config);
        assert_eq!(small.len(), 100);
        let last = small.last().copied().unwrap_or(f64::NAN);
        assert!((last - 84.0).abs() < 1e-9, "got {last}");

        let large = ring_boundaries(362.0, 2, &config);
        assert_eq!(large, vec![0.0, 100.0, 200.0, 300.0]);

        // Volumes switch to fixed-width rings later
        assert_eq!(ring_boundaries(160.0, 3, &config).len(), 100);
        assert_eq!(ring_boundaries(160.0, 2, &config), vec![0.0, 100.0]);
    }

    // Tests the plateau starts at the first ring clear of raised cells
    // Verified by returning the outer radius of the ring
    #[test]
    fn test_plateau_distance_finds_first_quiet_ring() {
        let grid = OffsetGrid::new(60, &[200, 200]);
        let values = stepped_correlation(&grid, 0.4, 10.0);

        let distance = plateau_distance(
            &values,
            grid.distances(),
            0.4,
            grid.max_distance(),
            &ModelConfig::default(),
        )
        .expect("grid has rings");

        let expected = linspace(0.0, 84.0, 100).get(12).copied().unwrap_or(f64::NAN);
        assert!((distance - expected).abs() < 1e-12, "got {distance}, expected {expected}");
    }

    // Tests the second boundary is used when no ring settles
    // Verified by returning the last boundary
    #[test]
    fn test_plateau_distance_fallback() {
        let grid = OffsetGrid::new(60, &[200, 200]);
        let values = stepped_correlation(&grid, 0.4, 1000.0);

        let distance = plateau_distance(
            &values,
            grid.distances(),
            0.4,
            grid.max_distance(),
            &ModelConfig::default(),
        )
        .expect("grid has rings");

        assert!((distance - 84.0 / 99.0).abs() < 1e-12, "got {distance}");
    }

    // Tests correlations below the plateau never count as deviating
    // Verified by testing the absolute deviation
    #[test]
    fn test_plateau_distance_ignores_undershoot() {
        let grid = OffsetGrid::new(60, &[200, 200]);
        let values = grid.distances().mapv(|distance| if distance > 0.0 { 0.0 } else { 0.4 });

        let distance = plateau_distance(
            &values,
            grid.distances(),
            0.4,
            grid.max_distance(),
            &ModelConfig::default(),
        )
        .expect("grid has rings");

        assert!((distance - 84.0 / 99.0).abs() < 1e-12, "got {distance}");
    }

    // Tests a single ring boundary is reported as degenerate
    // Verified by indexing past the boundary list
    #[test]
    fn test_plateau_distance_needs_two_boundaries() {
        let grid = OffsetGrid::new(5, &[20, 20]);
        let values = stepped_correlation(&grid, 0.4, 2.0);
        let config = ModelConfig {
            small_image_ring_count: 1,
            ..ModelConfig::default()
        };

        let result = plateau_distance(&values, grid.distances(), 0.4, grid.max_distance(), &config);
        assert!(matches!(result, Err(AnalysisError::DegenerateInput { .. })));
    }

    // Tests the plateau level averages the band mean with pf²
    // Verified by returning the band mean alone
    #[test]
    fn test_plateau_level() {
        let grid = OffsetGrid::new(20, &[100, 100]);
        let values = ArrayD::from_elem(IxDyn(&[41, 41]), 0.2);
        let config = ModelConfig::default();

        let level = plateau_level(&values, grid.distances(), 0.4, 15.0, &config);
        assert!((level - 0.18).abs() < 1e-12, "got {level}");

        let narrow = ModelConfig {
            plateau_band_width: 0.2,
            ..ModelConfig::default()
        };
        let empty_band = plateau_level(&values, grid.distances(), 0.4, 0.5, &narrow);
        assert!((empty_band - 0.16).abs() < 1e-12, "got {empty_band}");
    }

    // Tests the coefficient without damping
    // Verified by swapping the overlap sum and the cell count
    #[test]
    fn test_normalisation_coefficient() {
        let grid = OffsetGrid::new(1, &[10, 10]);
        let config = ModelConfig::default();

        let centre_only =
            normalisation_coefficient(&grid, 1.0, 100.0, &config).expect("finite coefficient");
        assert!((centre_only - 100.0 / 99.0).abs() < 1e-12);

        let overlap_sum = 1.0 + 4.0 * 0.9 + 4.0 * 0.81;
        let first = 100.0 / (100.0 - overlap_sum);
        let second = (9.0 - overlap_sum) / 100.0;
        let expected = first / (1.0 - first * second);
        let whole_grid =
            normalisation_coefficient(&grid, 1.5, 100.0, &config).expect("finite coefficient");
        assert!((whole_grid - expected).abs() < 1e-12, "got {whole_grid}, expected {expected}");
    }

    // Tests an overlap sum reaching the volume is rejected
    // Verified by dividing by the unchecked remainder
    #[test]
    fn test_normalisation_coefficient_saturated() {
        let grid = OffsetGrid::new(1, &[2, 2]);
        let result = normalisation_coefficient(&grid, 1.5, 4.0, &ModelConfig::default());
        assert!(matches!(result, Err(AnalysisError::NumericalInstability { .. })));
    }

    // Tests damping of a product above one and its step budget
    // Verified by skipping the damping loop
    #[test]
    fn test_normalisation_coefficient_damping() {
        let grid = OffsetGrid::new(2, &[3, 3]);

        let damped = normalisation_coefficient(&grid, 2.5, 9.0, &ModelConfig::default())
            .expect("damping succeeds");
        assert!(damped.is_finite());
        assert!(damped > 20.0, "got {damped}");

        let impatient = ModelConfig {
            max_damping_steps: 10,
            ..ModelConfig::default()
        };
        let result = normalisation_coefficient(&grid, 2.5, 9.0, &impatient);
        assert!(matches!(result, Err(AnalysisError::NumericalInstability { .. })));
    }

    // Tests the length scale from the excess inside the plateau
    // Verified by summing cells beyond the plateau distance
    #[test]
    fn test_cls_from_correlation() {
        let grid = OffsetGrid::new(1, &[10, 10]);
        let mut values = ArrayD::from_elem(IxDyn(&[3, 3]), 0.25);
        if let Some(centre) = values.get_mut([1, 1]) {
            *centre = 0.35;
        }

        let cls = cls_from_correlation(&values, grid.distances(), 0.5, 0.25, 0.5, 1.0)
            .expect("finite estimate");
        assert!((cls - 0.4_f64.sqrt()).abs() < 1e-12, "got {cls}");

        let wider = cls_from_correlation(&values, grid.distances(), 0.5, 0.25, 0.5, 2.5)
            .expect("finite estimate");
        assert!((wider - 1.0).abs() < 1e-12, "got {wider}");
    }

    // Tests negative excess is returned unrooted and a level at pf is rejected
    // Verified by taking the root of a negative volume
    #[test]
    fn test_cls_from_correlation_edge_cases() {
        let grid = OffsetGrid::new(1, &[10, 10]);
        let values = ArrayD::from_elem(IxDyn(&[3, 3]), 0.2);

        let negative = cls_from_correlation(&values, grid.distances(), 0.5, 0.25, 0.5, 1.0)
            .expect("finite estimate");
        assert!(negative < 0.0);

        let degenerate = cls_from_correlation(&values, grid.distances(), 0.5, 0.5, 0.5, 1.0);
        assert!(matches!(degenerate, Err(AnalysisError::DegenerateInput { .. })));
    }

    // Tests correction decisions against the statistical estimate
    // Verified by comparing against the inverse ratio bound
    #[test]
    fn test_correction_needed() {
        let config = ModelConfig::default();

        assert_eq!(correction_needed(0.5, None, &config), Some(Correction::Raise));
        assert_eq!(correction_needed(5.0, None, &config), None);
        assert_eq!(correction_needed(5.0, Some(0.5), &config), None);
        assert_eq!(correction_needed(1.5, Some(10.0), &config), Some(Correction::Raise));
        assert_eq!(correction_needed(40.0, Some(10.0), &config), Some(Correction::Lower));
        assert_eq!(correction_needed(20.0, Some(10.0), &config), None);
    }

    // Tests only cells on the corrected side move towards the level
    // Verified by moving every cell
    #[test]
    fn test_apply_correction() {
        let original = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.1, 0.5, 0.9]).expect("shape");

        let mut raised = original.clone();
        apply_correction(&mut raised, 0.5, Correction::Raise, 0.1);
        let expected_raised = [0.14, 0.5, 0.9];
        assert!(raised.iter().zip(expected_raised).all(|(a, e)| (a - e).abs() < 1e-12));

        let mut lowered = original;
        apply_correction(&mut lowered, 0.5, Correction::Lower, 0.1);
        let expected_lowered = [0.1, 0.5, 0.86];
        assert!(lowered.iter().zip(expected_lowered).all(|(a, e)| (a - e).abs() < 1e-12));
    }

    // Tests the length scale of a centred disc
    // Verified by omitting the normalisation coefficient
    #[test]
    fn test_tpc_to_cls_disc() {
        let image = disc_image(200, 20.0);
        let tpc = radial_tpc(&image, true).expect("fits");
        let estimate = tpc_to_cls(&tpc, &image, &ModelConfig::default()).expect("estimate");

        assert!(
            estimate.value > 30.0 && estimate.value < 90.0,
            "got {}",
            estimate.value
        );
        assert_eq!(estimate.corrections, 0);
        assert!((estimate.plateau_distance - 100.0).abs() < f64::EPSILON);
        assert!(estimate.plateau_level < image.phase_fraction().powi(2));
    }

    // Tests a capped correction loop fails with the last estimate
    // Verified by returning the uncorrected estimate when the cap is hit
    #[test]
    fn test_tpc_to_cls_correction_cap() {
        let image = tile_mosaic(7, 512, 8);
        let tpc = radial_tpc(&image, true).expect("fits");
        let before = tpc.clone();
        let capped = ModelConfig {
            max_correction_iterations: 0,
            ..ModelConfig::default()
        };

        match tpc_to_cls(&tpc, &image, &capped) {
            Err(AnalysisError::CorrectionNonConvergence {
                iterations,
                last_cls,
            }) => {
                assert_eq!(iterations, 0);
                assert!(last_cls.is_finite() && last_cls > 0.0, "got {last_cls}");
            }
            other => unreachable!("Expected CorrectionNonConvergence, got {other:?}"),
        }

        let corrected = tpc_to_cls(&tpc, &image, &ModelConfig::default()).expect("estimate");
        assert!(corrected.corrections > 0);
        assert!(corrected.value.is_finite() && corrected.value > 0.0);
        assert_eq!(tpc, before);
    }

    // Tests grids that do not match the image are rejected
    // Verified by skipping the dimensionality check
    #[test]
    fn test_tpc_to_cls_dimension_mismatch() {
        let image = disc_image(40, 8.0);
        let tpc = radial_tpc(&image, true).expect("fits");
        let volume = Array3::<u8>::from_elem((12, 12, 12), 1);
        let other = BinaryImage::from_array(volume.view().into_dyn(), 10).expect("valid volume");

        let result = tpc_to_cls(&tpc, &other, &ModelConfig::default());
        assert!(matches!(result, Err(AnalysisError::Computation { .. })));
    }

    // Tests single-phase images have no length scale
    // Verified by dividing by a zero spread
    #[test]
    fn test_tpc_to_cls_single_phase() {
        let image = disc_image(40, 0.1);
        let tpc = two_point_correlation(&image, 10, true).expect("fits");
        let result = tpc_to_cls(&tpc, &image, &ModelConfig::default());
        assert!(matches!(result, Err(AnalysisError::DegenerateInput { .. })));
    }

    // Tests the stepped correlation leaves no excess beyond its radius
    // Verified by building the step on the wrong side of the radius
    #[test]
    fn test_stepped_fixture_shape() {
        let grid = OffsetGrid::new(10, &[40, 40]);
        let values = stepped_correlation(&grid, 0.4, 3.0);
        let beyond = Zip::from(&values)
            .and(grid.distances())
            .fold(0.0, |sum, &value, &distance| {
                if distance >= 3.0 { sum + (value - 0.16) } else { sum }
            });
        assert!(beyond.abs() < 1e-12);
    }
}
