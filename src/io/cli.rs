//! Command-line interface for batch representativity analysis of segmented PNGs

use crate::algorithm::executor::{PredictionParams, RepresentativityAnalyzer};
use crate::algorithm::result::ResultRecord;
use crate::io::configuration::{
    DEFAULT_CONFIDENCE, DEFAULT_PHASE_THRESHOLD, DEFAULT_TARGET_ERROR, ModelConfig,
};
use crate::io::error::{Result, invalid_parameter};
use crate::io::image::{PhaseSelector, is_png, load_png, load_png_stack, png_files_in};
use crate::io::progress::ProgressManager;
use crate::io::report::{report_path, stack_report_path, write_report};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "representativity")]
#[command(
    author,
    version,
    about = "Estimate phase fraction confidence and required image size for segmented microstructures"
)]
/// Command-line arguments for the representativity tool
// CLI tools commonly need multiple boolean flags for various features and user preferences
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input PNG file or directory to process
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Confidence level of the phase fraction interval
    #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f64,

    /// Target error relative to the phase fraction
    #[arg(short, long, default_value_t = DEFAULT_TARGET_ERROR)]
    pub target_error: f64,

    /// Ignore the fitted model error and trust the Bernoulli deviation
    #[arg(long)]
    pub no_model_error: bool,

    /// Treat images as non-periodic when correlating
    #[arg(long)]
    pub non_periodic: bool,

    /// Grow only the first axis when computing the required size
    #[arg(long)]
    pub unequal_shape: bool,

    /// Exact pixel value of the phase (default: luma at or above 128)
    #[arg(short, long, value_name = "0-255")]
    pub phase: Option<u8>,

    /// JSON file overriding model tunables
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Treat the PNGs of a directory as slices of one volume
    #[arg(long)]
    pub stack: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Process files even if output exists
    #[arg(short, long)]
    pub no_skip: bool,

    /// Log debug details of every stage
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Check if existing output files should be skipped
    pub const fn skip_existing(&self) -> bool {
        !self.no_skip
    }

    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Default log filter for the chosen verbosity
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }

    /// Prediction parameters selected by the flags
    pub const fn params(&self) -> PredictionParams {
        PredictionParams {
            confidence: self.confidence,
            target_error: self.target_error,
            equal_shape: !self.unequal_shape,
            model_error: !self.no_model_error,
            periodic: !self.non_periodic,
        }
    }

    /// Pixel rule selecting the phase of interest
    pub const fn phase_selector(&self) -> PhaseSelector {
        match self.phase {
            Some(value) => PhaseSelector::Value(value),
            None => PhaseSelector::Threshold(DEFAULT_PHASE_THRESHOLD),
        }
    }

    /// Model configuration from `--config`, or the defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigLoad` or `InvalidParameter` if the file is unusable
    pub fn model_config(&self) -> Result<ModelConfig> {
        self.config
            .as_deref()
            .map_or_else(|| Ok(ModelConfig::default()), ModelConfig::from_json_file)
    }
}

/// One unit of work: a planar image or a stack of slices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Single PNG file
    Image(PathBuf),
    /// Directory whose PNG slices form one volume
    Stack {
        /// Directory holding the slices
        dir: PathBuf,
        /// Slices in stacking order
        slices: Vec<PathBuf>,
    },
}

impl Job {
    /// Path shown in progress and summaries
    pub fn source(&self) -> &Path {
        match self {
            Self::Image(path) => path,
            Self::Stack { dir, .. } => dir,
        }
    }

    /// Where the JSON report is written
    pub fn output_path(&self) -> PathBuf {
        match self {
            Self::Image(path) => report_path(path),
            Self::Stack { dir, .. } => stack_report_path(dir),
        }
    }
}

/// Orchestrates batch processing of PNG files with progress tracking
pub struct FileProcessor {
    cli: Cli,
    analyzer: RepresentativityAnalyzer,
    progress_manager: Option<ProgressManager>,
}

impl FileProcessor {
    /// Create a new file processor with the given CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters or model configuration are invalid
    pub fn new(cli: Cli) -> Result<Self> {
        cli.params().validate()?;
        let analyzer = RepresentativityAnalyzer::new(cli.model_config()?)?;
        let progress_manager = cli.should_show_progress().then(ProgressManager::new);

        Ok(Self {
            cli,
            analyzer,
            progress_manager,
        })
    }

    /// Process files according to CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if target validation or file processing fails
    pub fn process(&mut self) -> Result<Vec<ResultRecord>> {
        let jobs = self.collect_jobs()?;

        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(ref mut pm) = self.progress_manager {
            pm.initialize(jobs.len());
        }

        let mut records = Vec::with_capacity(jobs.len());
        for (index, job) in jobs.iter().enumerate() {
            records.push(self.process_job(job, index)?);
        }

        if let Some(ref mut pm) = self.progress_manager {
            pm.finish();
        }

        Ok(records)
    }

    /// Work items selected by the target path and flags
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the target is neither a PNG file nor a
    /// directory, and `FileSystem` if the directory cannot be read
    pub fn collect_jobs(&self) -> Result<Vec<Job>> {
        let target = &self.cli.target;
        if target.is_file() {
            if !is_png(target) {
                return Err(invalid_parameter(
                    "target",
                    &target.display(),
                    &"target file must be a PNG image",
                ));
            }
            let job = Job::Image(target.clone());
            return Ok(self.should_process(&job).then_some(job).into_iter().collect());
        }
        if !target.is_dir() {
            return Err(invalid_parameter(
                "target",
                &target.display(),
                &"target must be a PNG file or directory",
            ));
        }

        let files = png_files_in(target)?;
        let jobs = if self.cli.stack {
            if files.is_empty() {
                Vec::new()
            } else {
                vec![Job::Stack {
                    dir: target.clone(),
                    slices: files,
                }]
            }
        } else {
            files.into_iter().map(Job::Image).collect()
        };

        Ok(jobs.into_iter().filter(|job| self.should_process(job)).collect())
    }

    fn should_process(&self, job: &Job) -> bool {
        if !self.cli.skip_existing() {
            return true;
        }

        if job.output_path().exists() {
            info!("Skipping {} (output exists)", job.source().display());
            false
        } else {
            true
        }
    }

    fn process_job(&mut self, job: &Job, index: usize) -> Result<ResultRecord> {
        if let Some(ref mut pm) = self.progress_manager {
            pm.start_file(index, job.source());
        }

        let selector = self.cli.phase_selector();
        let min_extent = self.analyzer.config().min_extent;
        let image = match job {
            Job::Image(path) => load_png(path, selector, min_extent)?,
            Job::Stack { slices, .. } => load_png_stack(slices, selector, min_extent)?,
        };

        let params = self.cli.params();
        let progress = &mut self.progress_manager;
        let record = self.analyzer.analyze_with_observer(&image, &params, |stage| {
            if let Some(pm) = progress.as_mut() {
                pm.update_stage(index, stage);
            }
        })?;

        write_report(&record, &job.output_path())?;

        if let Some(ref mut pm) = self.progress_manager {
            pm.complete_file(index);
        }
        self.print_summary(job, &record);

        Ok(record)
    }

    // Allow print for the per-image summary on stdout
    #[allow(clippy::print_stdout)]
    fn print_summary(&self, job: &Job, record: &ResultRecord) {
        let line = summary_line(job.source(), record);
        match self.progress_manager {
            Some(ref pm) => pm.println(&line),
            None => println!("{line}"),
        }
    }
}

/// One-line human readable summary of a result
pub fn summary_line(source: &Path, record: &ResultRecord) -> String {
    format!(
        "{}: pf {:.4} ± {:.2}% ({:.0}% confidence), length scale {:.2} px, {:.0} px for {:.1}%{}",
        source.display(),
        record.phase_fraction,
        100.0 * record.percent_err,
        100.0 * record.confidence,
        record.integral_range,
        record.l,
        100.0 * record.target_error,
        if record.l_converged { "" } else { " (unconverged)" }
    )
}
