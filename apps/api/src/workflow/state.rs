use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::analysis::models::{AnalysisResult, Dimension};

/// Position in the analysis wizard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    #[default]
    Upload,
    Configure,
    JobDescription,
    Results,
}

/// Everything the wizard remembers for one session. Snapshots are this
/// struct serialized as JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub step: Step,
    pub resume_text: String,
    pub job_description: String,
    pub selected_dimensions: BTreeSet<Dimension>,
    pub result: Option<AnalysisResult>,
    pub result_is_from_cache: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            step: Step::Upload,
            resume_text: String::new(),
            job_description: String::new(),
            selected_dimensions: BTreeSet::from([Dimension::JobMatch]),
            result: None,
            result_is_from_cache: false,
        }
    }
}

impl WorkflowState {
    /// Job match needs a job description; without it the job description
    /// step is skipped and the cache is never consulted.
    pub fn needs_job_description(&self) -> bool {
        self.selected_dimensions.contains(&Dimension::JobMatch)
    }

    /// Selected dimensions minus the implicit core one, as sent to the gateway.
    pub fn optional_dimensions(&self) -> BTreeSet<Dimension> {
        self.selected_dimensions
            .iter()
            .copied()
            .filter(|d| !d.is_core())
            .collect()
    }

    /// Snapshots restored with an empty dimension set fall back to the default.
    pub(crate) fn repaired(mut self) -> Self {
        if self.selected_dimensions.is_empty() {
            self.selected_dimensions = WorkflowState::default().selected_dimensions;
        }
        if self.step == Step::Results && self.result.is_none() {
            self.step = Step::Upload;
        }
        self
    }
}
