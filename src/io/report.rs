//! JSON reports of prediction results

use crate::algorithm::result::ResultRecord;
use crate::io::configuration::OUTPUT_SUFFIX;
use crate::io::error::{AnalysisError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Report path for a single input image: `<stem>_representativity.json` beside it
pub fn report_path(input_path: &Path) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    let report_name = format!("{}{OUTPUT_SUFFIX}.json", stem.to_string_lossy());

    if let Some(parent) = input_path.parent() {
        parent.join(report_name)
    } else {
        PathBuf::from(report_name)
    }
}

/// Report path for a stack of slices: `<dir>/<dirname>_representativity.json`
pub fn stack_report_path(dir: &Path) -> PathBuf {
    let name = dir.file_name().unwrap_or_default();
    dir.join(format!("{}{OUTPUT_SUFFIX}.json", name.to_string_lossy()))
}

/// Write a result record as pretty JSON, creating parent directories
///
/// # Errors
///
/// Returns `ReportExport` if serialization fails and `FileSystem` if the
/// file or its directory cannot be written
pub fn write_report(record: &ResultRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AnalysisError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(record).map_err(|e| AnalysisError::ReportExport {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, json).map_err(|e| AnalysisError::FileSystem {
        path: path.to_path_buf(),
        operation: "write report",
        source: e,
    })
}

/// Read a result record back from JSON
///
/// # Errors
///
/// Returns `FileSystem` if the file cannot be read and `ReportExport` if it
/// does not hold a valid record
pub fn read_report(path: &Path) -> Result<ResultRecord> {
    let contents = fs::read_to_string(path).map_err(|e| AnalysisError::FileSystem {
        path: path.to_path_buf(),
        operation: "read report",
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| AnalysisError::ReportExport {
        path: path.to_path_buf(),
        source: e,
    })
}
