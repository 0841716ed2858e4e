use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::types::{ExitCriterion, Map, TrialId};

use super::Calibrator;

/// One recorded trial, taken the first time its identifier was observed
/// finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Identifier of the trial.
    pub id: TrialId,
    /// Parameter vector.
    pub parameters: Vec<f64>,
    /// Full simulator configuration the trial ran with.
    pub simulator_parameters: Map,
    /// Objective value. Non-finite objectives are stored as `null` and read
    /// back as NaN.
    #[serde(deserialize_with = "deserialize_objective")]
    pub objective: f64,
    /// State vector, if any.
    pub state: Option<Vec<f64>>,
    /// Annotations given at submission.
    pub annotations: Map,
    /// Recorded evaluations, this one included.
    pub evaluations: usize,
    /// Recorded cost, this trial included.
    pub total_cost: f64,
    /// Cost of this trial.
    pub cost: f64,
    /// Whether the trial was exploratory.
    pub transient: bool,
}

fn deserialize_objective<'de, D>(deserializer: D) -> core::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// A serializable snapshot of a calibration for offline analysis.
///
/// # Schema versioning
///
/// The `version` field enables future schema evolution without breaking
/// existing files. The current version is `1`.
///
/// Snapshots cannot resume a calibration; they only describe it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Recorded trials in completion order.
    pub history: Vec<HistoryEntry>,
    /// Reference state of the calibrated system.
    pub reference_state: Option<Vec<f64>>,
    /// Problem capabilities.
    pub problem: ProblemInfo,
    /// Free-form problem description.
    pub problem_metadata: Map,
    /// Free-form algorithm description.
    pub method_details: Map,
    /// Best objective so far.
    pub best_objective: Option<f64>,
    /// Parameters of the best objective.
    pub best_parameters: Option<Vec<f64>>,
    /// Why the calibration stopped, if it did.
    pub exit_criterion: Option<ExitCriterion>,
}

impl CalibrationSnapshot {
    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

impl<S: Scheduler> Calibrator<S> {
    /// Captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            version: 1,
            history: self.history.clone(),
            reference_state: self.reference_state.clone(),
            problem: self.scheduler.information().clone(),
            problem_metadata: self.problem_metadata.clone(),
            method_details: self.method_details.clone(),
            best_objective: self.best.as_ref().map(|b| b.objective),
            best_parameters: self.best.as_ref().map(|b| b.parameters.clone()),
            exit_criterion: self.exit_criterion,
        }
    }

    /// Save the snapshot to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Write to a sibling temp file and rename so readers never see a
        // partial snapshot.
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path).map_err(|e| Error::Storage(e.to_string()))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.snapshot())
            .map_err(|e| Error::Storage(e.to_string()))?;
        writer.flush().map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| Error::Storage(e.to_string()))
    }
}
