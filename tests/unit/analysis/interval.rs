//! Tests for mixture confidence intervals and sample count solving

#[cfg(test)]
mod tests {
    use representativity::AnalysisError;
    use representativity::analysis::interval::{
        SampleCountSolution, bounds_from_cdf, closed_form_sample_count, length_along_first_axis,
        length_from_sample_count, predict_interval, solve_sample_count_for_target, std_model,
    };
    use representativity::io::configuration::{ModelConfig, STD_MODEL_2D, STD_MODEL_3D};
    use representativity::math::probability::{bernoulli_std, z_score};

    fn coarse_config() -> ModelConfig {
        ModelConfig {
            divisions: 101,
            ..ModelConfig::default()
        }
    }

    // Tests the fitted model error for planar and volumetric images
    // Verified by swapping the planar and volumetric fits
    #[test]
    fn test_std_model() {
        let config = ModelConfig::default();

        let planar = std_model(2, 40_000, &config);
        let expected = STD_MODEL_2D.0 / 40_000f64.powf(STD_MODEL_2D.1);
        assert!((planar - expected).abs() < 1e-12);

        let volumetric = std_model(3, 1_000_000, &config);
        let expected = STD_MODEL_3D.0 / 1_000_000f64.powf(STD_MODEL_3D.1);
        assert!((volumetric - expected).abs() < 1e-12);

        assert!(std_model(2, 160_000, &config) < planar);
    }

    // Tests bounds sit symmetrically about the phase fraction
    // Verified by centring the support on zero
    #[test]
    fn test_predict_interval_symmetry() {
        let config = ModelConfig::default();
        let (pf, std, model_error) = (0.3, 0.01, 0.2);
        let interval =
            predict_interval(pf, std, model_error, 0.95, &config).expect("valid interval");

        let spreads = (0.9 / model_error).min(config.max_std_spread);
        let step = 2.0 * spreads * std / (config.divisions - 1) as f64;
        let below = pf - interval.lower;
        let above = interval.upper - pf;

        assert!(below > 0.0 && above > 0.0);
        assert!((below - above).abs() <= 2.5 * step, "below {below}, above {above}");
        assert_eq!(interval.support.len(), config.divisions);
        assert_eq!(interval.cumulative.len(), config.divisions);
    }

    // Tests a negligible model error reduces to normal bounds
    // Verified by weighting candidates uniformly
    #[test]
    fn test_predict_interval_normal_limit() {
        let (pf, std) = (0.4, 0.02);
        let interval = predict_interval(pf, std, 1e-3, 0.95, &ModelConfig::default())
            .expect("valid interval");
        let z = z_score(0.95).expect("valid confidence");

        assert!((interval.lower - z.mul_add(-std, pf)).abs() < 0.15 * std);
        assert!((interval.upper - z.mul_add(std, pf)).abs() < 0.15 * std);
    }

    // Tests a larger model error widens the interval
    // Verified by ignoring the model error in the weights
    #[test]
    fn test_predict_interval_widens_with_model_error() {
        let config = ModelConfig::default();
        let narrow = predict_interval(0.3, 0.01, 1e-3, 0.95, &config).expect("valid interval");
        let wide = predict_interval(0.3, 0.01, 0.4, 0.95, &config).expect("valid interval");

        assert!(wide.upper - wide.lower > narrow.upper - narrow.lower);
    }

    // Tests bounds widen with confidence on one stored distribution
    // Verified by reading both tails from the same side
    #[test]
    fn test_bounds_widen_with_confidence() {
        let interval =
            predict_interval(0.3, 0.01, 0.2, 0.95, &ModelConfig::default()).expect("valid");

        let mut previous_width = 0.0;
        for confidence in [0.5, 0.8, 0.9, 0.95, 0.99] {
            let (lower, upper) = bounds_from_cdf(&interval.support, &interval.cumulative, confidence)
                .expect("tails reached");
            assert!(lower < upper);
            assert!(upper - lower >= previous_width);
            previous_width = upper - lower;
        }

        let (lower, upper) = bounds_from_cdf(&interval.support, &interval.cumulative, 0.95)
            .expect("tails reached");
        assert!((lower - interval.lower).abs() < f64::EPSILON);
        assert!((upper - interval.upper).abs() < f64::EPSILON);
    }

    // Tests bound lookup on a hand-made distribution
    // Verified by selecting the last point below the tail
    #[test]
    fn test_bounds_from_cdf_lookup() {
        let support = [0.0, 1.0, 2.0, 3.0, 4.0];
        let cumulative = [0.01, 0.2, 0.5, 0.8, 0.99];

        let (lower, upper) = bounds_from_cdf(&support, &cumulative, 0.9).expect("tails reached");
        assert!((lower - 1.0).abs() < f64::EPSILON);
        assert!((upper - 4.0).abs() < f64::EPSILON);

        assert!(matches!(
            bounds_from_cdf(&support, &[0.01, 0.2, 0.5, 0.8, 0.9], 0.95),
            Err(AnalysisError::NumericalInstability { .. })
        ));
        assert!(matches!(
            bounds_from_cdf(&support, &cumulative, 1.0),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    // Tests invalid interval inputs are rejected by name
    // Verified by accepting a zero standard deviation
    #[test]
    fn test_predict_interval_rejects_invalid_inputs() {
        let config = ModelConfig::default();
        let cases = [
            (0.0, 0.2, 0.95, "std"),
            (0.01, 0.0, 0.95, "model_error"),
            (0.01, f64::NAN, 0.95, "model_error"),
            (0.01, 0.2, 1.0, "confidence"),
        ];
        for (std, model_error, confidence, name) in cases {
            match predict_interval(0.3, std, model_error, confidence, &config) {
                Err(AnalysisError::InvalidParameter { parameter, .. }) => assert_eq!(parameter, name),
                other => unreachable!("Expected InvalidParameter for {name}, got {other:?}"),
            }
        }

        let too_coarse = ModelConfig {
            divisions: 2,
            ..ModelConfig::default()
        };
        assert!(matches!(
            predict_interval(0.3, 0.01, 0.2, 0.95, &too_coarse),
            Err(AnalysisError::InvalidParameter { parameter: "divisions", .. })
        ));
    }

    // Tests the solver lands where the interval half-width meets the target
    // Verified by solving against the upper bound
    #[test]
    fn test_solve_sample_count_matches_scaling() {
        let config = coarse_config();
        let (pf, model_error, target) = (0.3, 0.3, 0.01);

        // The half-width scales with the standard deviation for a fixed model error
        let reference_std = bernoulli_std(pf, 1000.0);
        let reference = predict_interval(pf, reference_std, model_error, 0.95, &config)
            .expect("valid interval");
        let quantile = (pf - reference.lower) / reference_std;
        let expected = pf * (1.0 - pf) * (quantile / target).powi(2);

        let solution = solve_sample_count_for_target(1000.0, pf, model_error, target, 0.95, &config)
            .expect("solver runs");

        assert!(
            (solution.samples - expected).abs() < 0.01 * expected,
            "got {}, expected {expected}",
            solution.samples
        );
        assert!(solution.residual < 1e-4);
    }

    // Tests tighter targets need more samples
    // Verified by minimising the signed gap
    #[test]
    fn test_solve_sample_count_monotone_in_target() {
        let config = coarse_config();
        let samples: Vec<f64> = [0.005, 0.01, 0.02]
            .into_iter()
            .map(|target| {
                solve_sample_count_for_target(500.0, 0.3, 0.3, target, 0.95, &config)
                    .expect("solver runs")
                    .samples
            })
            .collect();

        assert!(samples.windows(2).all(|pair| match pair {
            [tight, loose] => tight > loose,
            _ => true,
        }));
    }

    // Tests solver inputs are validated before searching
    // Verified by starting the search at zero samples
    #[test]
    fn test_solve_sample_count_rejects_invalid_inputs() {
        let config = coarse_config();
        let cases = [
            (1000.0, 0.3, 0.0, "target_abs_error"),
            (0.0, 0.3, 0.01, "initial_samples"),
            (1000.0, 1.0, 0.01, "phase_fraction"),
        ];
        for (start, pf, target, name) in cases {
            match solve_sample_count_for_target(start, pf, 0.3, target, 0.95, &config) {
                Err(AnalysisError::InvalidParameter { parameter, .. }) => assert_eq!(parameter, name),
                other => unreachable!("Expected InvalidParameter for {name}, got {other:?}"),
            }
        }
    }

    // Tests unconverged solutions surface as errors on request
    // Verified by ignoring the converged flag
    #[test]
    fn test_into_converged() {
        let converged = SampleCountSolution {
            samples: 120.0,
            residual: 0.0,
            iterations: 12,
            converged: true,
        };
        assert!(matches!(converged.into_converged(), Ok(samples) if (samples - 120.0).abs() < f64::EPSILON));

        let stalled = SampleCountSolution {
            converged: false,
            ..converged
        };
        match stalled.into_converged() {
            Err(AnalysisError::OptimizationNonConvergence {
                iterations,
                best_estimate,
            }) => {
                assert_eq!(iterations, 12);
                assert!((best_estimate - 120.0).abs() < f64::EPSILON);
            }
            other => unreachable!("Expected OptimizationNonConvergence, got {other:?}"),
        }
    }

    // Tests the closed form sample count without model error
    // Verified by dropping the square on the quantile ratio
    #[test]
    fn test_closed_form_sample_count() {
        let z = z_score(0.95).expect("valid confidence");
        let samples = closed_form_sample_count(0.5, 0.01, 0.95).expect("valid target");
        assert!((samples - 0.25 * (z / 0.01).powi(2)).abs() < 1e-6);

        assert!(closed_form_sample_count(0.5, 0.0, 0.95).is_err());
        assert!(closed_form_sample_count(0.5, 0.01, 0.0).is_err());
    }

    // Tests edge lengths of cubes and of slabs grown along one axis
    // Verified by ignoring the trailing cross-section
    #[test]
    fn test_lengths_from_sample_count() {
        assert!((length_from_sample_count(100.0, 2.0, 2) - 20.0).abs() < 1e-9);
        assert!((length_from_sample_count(1000.0, 2.0, 3) - 20.0).abs() < 1e-9);

        let slab = length_along_first_axis(100.0, 2.0, &[50, 40]).expect("two axes");
        assert!((slab - 10.0).abs() < 1e-12);
        let volume = length_along_first_axis(100.0, 2.0, &[10, 10, 8]).expect("three axes");
        assert!((volume - 10.0).abs() < 1e-12);

        assert!(length_along_first_axis(100.0, 2.0, &[]).is_err());
        assert!(length_along_first_axis(100.0, 2.0, &[5]).is_err());
        assert!(length_along_first_axis(100.0, 2.0, &[5, 0]).is_err());
    }
}
