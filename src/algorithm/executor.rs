use crate::algorithm::result::ResultRecord;
use crate::analysis::characteristic::tpc_to_cls;
use crate::analysis::correlation::radial_tpc;
use crate::analysis::interval::{predict_interval, std_model};
use crate::io::configuration::{DEFAULT_CONFIDENCE, DEFAULT_TARGET_ERROR, ModelConfig};
use crate::io::error::{Result, degenerate_input, invalid_parameter};
use crate::math::probability::{bernoulli_std, z_score};
use crate::spatial::image::BinaryImage;
use log::info;
use serde::{Deserialize, Serialize};

/// Prediction parameters chosen per request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionParams {
    /// Confidence level of the phase fraction interval
    pub confidence: f64,
    /// Target error relative to the phase fraction
    pub target_error: f64,
    /// Grow every axis equally when computing the required length
    pub equal_shape: bool,
    /// Fold the fitted model error into the interval
    pub model_error: bool,
    /// Treat the image as periodic when correlating
    pub periodic: bool,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            target_error: DEFAULT_TARGET_ERROR,
            equal_shape: true,
            model_error: true,
            periodic: true,
        }
    }
}

impl PredictionParams {
    /// Check the confidence and target error
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a confidence outside (0, 1) or a
    /// non-positive target error
    pub fn validate(&self) -> Result<()> {
        let valid_confidence = self.confidence > 0.0 && self.confidence < 1.0;
        if !valid_confidence {
            return Err(invalid_parameter(
                "confidence",
                &self.confidence,
                &"must lie in (0, 1)",
            ));
        }
        let valid_target = self.target_error.is_finite() && self.target_error > 0.0;
        if !valid_target {
            return Err(invalid_parameter(
                "target_error",
                &self.target_error,
                &"must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Phase of a single prediction, reported to progress observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Two-point correlation
    Correlation,
    /// Characteristic length scale extraction
    LengthScale,
    /// Confidence interval
    Interval,
    /// Sample count solve for the target error
    TargetLength,
}

impl Stage {
    /// Number of stages in a prediction
    pub const COUNT: usize = 4;

    /// One-based position of the stage
    pub const fn position(self) -> usize {
        match self {
            Self::Correlation => 1,
            Self::LengthScale => 2,
            Self::Interval => 3,
            Self::TargetLength => 4,
        }
    }

    /// Short label for progress displays
    pub const fn label(self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::LengthScale => "length scale",
            Self::Interval => "interval",
            Self::TargetLength => "target length",
        }
    }
}

/// Runs the full prediction pipeline with one model configuration
#[derive(Debug, Clone, Default)]
pub struct RepresentativityAnalyzer {
    config: ModelConfig,
}

impl RepresentativityAnalyzer {
    /// Create an analyzer after validating its configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the configuration is rejected
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Model configuration in use
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Predict the phase fraction interval and required length for an image
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parameters are invalid
    /// - The image holds a single phase
    /// - The correlation, length scale or interval computation fails
    pub fn analyze(&self, image: &BinaryImage, params: &PredictionParams) -> Result<ResultRecord> {
        self.analyze_with_observer(image, params, |_| {})
    }

    /// Same as [`Self::analyze`], calling `observer` as each stage begins
    ///
    /// # Errors
    ///
    /// Same as [`Self::analyze`]
    pub fn analyze_with_observer<F>(
        &self,
        image: &BinaryImage,
        params: &PredictionParams,
        mut observer: F,
    ) -> Result<ResultRecord>
    where
        F: FnMut(Stage),
    {
        params.validate()?;

        let phase_fraction = image.phase_fraction();
        if image.is_single_phase() {
            return Err(degenerate_input(&format!(
                "image holds a single phase (phase fraction {phase_fraction})"
            )));
        }
        let n_dims = image.ndim();

        observer(Stage::Correlation);
        let tpc = radial_tpc(image, params.periodic)?;

        observer(Stage::LengthScale);
        let estimate = tpc_to_cls(&tpc, image, &self.config)?;
        let integral_range = estimate.value;

        observer(Stage::Interval);
        let samples = image.len() as f64 / integral_range.powi(n_dims as i32);
        let std_bernoulli = bernoulli_std(phase_fraction, samples);
        let std_model = std_model(n_dims, image.len(), &self.config);

        let (abs_err, support, cumulative) = if params.model_error {
            let interval = predict_interval(
                phase_fraction,
                std_bernoulli,
                std_model,
                params.confidence,
                &self.config,
            )?;
            (
                phase_fraction - interval.lower,
                interval.support,
                interval.cumulative,
            )
        } else {
            (
                z_score(params.confidence)? * std_bernoulli,
                Vec::new(),
                Vec::new(),
            )
        };

        observer(Stage::TargetLength);
        let mut record = ResultRecord {
            phase_fraction,
            integral_range,
            std_model,
            std_bernoulli,
            percent_err: abs_err / phase_fraction,
            abs_err,
            l: 0.0,
            l_converged: false,
            shape: image.shape().to_vec(),
            confidence: params.confidence,
            target_error: params.target_error,
            model_error: params.model_error,
            equal_shape: params.equal_shape,
            support,
            cumulative,
        };
        let target = record.length_for_target(params.confidence, params.target_error, &self.config)?;
        record.l = target.length;
        record.l_converged = target.converged;

        info!(
            "pf {:.4}, length scale {:.2} px ({} corrections), error ±{:.2}% at {:.0}% confidence, {:.0} px for {:.1}%",
            phase_fraction,
            integral_range,
            estimate.corrections,
            100.0 * record.percent_err,
            100.0 * params.confidence,
            record.l,
            100.0 * params.target_error
        );

        Ok(record)
    }
}

/// Predict with the default model configuration
///
/// # Errors
///
/// Same as [`RepresentativityAnalyzer::analyze`]
pub fn make_error_prediction(image: &BinaryImage, params: &PredictionParams) -> Result<ResultRecord> {
    RepresentativityAnalyzer::default().analyze(image, params)
}
