//! Workflow controller: drives one session through
//! UPLOAD → CONFIGURE → (JOB_DESCRIPTION) → RESULTS.
//!
//! Every successful transition is written to the session snapshot store so a
//! reload resumes at the same step. Snapshot failures are logged, never
//! surfaced: the in-memory state stays authoritative.
//!
//! The last persisted state is also published on a `watch` channel, so a
//! `WorkflowMonitor` can render the session while an analysis holds the
//! controller.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::analysis::cache::{AnalysisCache, CACHED_SUMMARY};
use crate::analysis::gateway::{AnalysisGateway, GatewayError};
use crate::analysis::models::{AnalysisResult, Dimension, IssueSummary};
use crate::models::user::UserIdentity;
use crate::workflow::snapshot::{Snapshot, SnapshotStore};
use crate::workflow::state::{Step, WorkflowState};

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input refused; the state is unchanged and the user can be re-prompted.
    #[error("{0}")]
    Validation(String),

    #[error("Cannot {action} from step {step:?}")]
    InvalidTransition { action: &'static str, step: Step },

    #[error("An analysis is already in progress for this session")]
    AnalysisInProgress,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// A past analysis opened from the history view. Loads straight into RESULTS.
#[derive(Debug, Clone)]
pub struct Preload {
    pub result: AnalysisResult,
    pub resume_text: String,
    pub job_description: String,
}

/// Shared "analysis in flight" indicator. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ProgressFlag(Arc<AtomicBool>);

impl ProgressFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sets the flag until the returned guard drops, including when the
    /// awaiting future is abandoned.
    fn enter(&self) -> InFlight {
        self.0.store(true, Ordering::Release);
        InFlight(self.0.clone())
    }
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What presentation needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    #[serde(flatten)]
    pub state: WorkflowState,
    pub progress_percent: Option<u32>,
    pub issue_summary: Option<IssueSummary>,
    pub premium_eligible: bool,
    pub in_progress: bool,
}

impl WorkflowView {
    fn new(state: &WorkflowState, in_progress: bool) -> Self {
        let result = state.result.as_ref();
        Self {
            state: state.clone(),
            progress_percent: result.map(AnalysisResult::progress_percent),
            issue_summary: result.map(AnalysisResult::issue_summary),
            premium_eligible: premium_eligible(state),
            in_progress,
        }
    }
}

/// Paid generation needs a result to build on and the resume it came from.
fn premium_eligible(state: &WorkflowState) -> bool {
    state.step == Step::Results && state.result.is_some() && !state.resume_text.trim().is_empty()
}

/// Read-only handle on a controller that never waits for its lock.
#[derive(Clone)]
pub struct WorkflowMonitor {
    state: watch::Receiver<WorkflowState>,
    progress: ProgressFlag,
}

impl WorkflowMonitor {
    pub fn is_in_progress(&self) -> bool {
        self.progress.is_set()
    }

    /// The last persisted state, flagged when an analysis is running.
    pub fn view(&self) -> WorkflowView {
        WorkflowView::new(&self.state.borrow(), self.is_in_progress())
    }
}

pub struct WorkflowController {
    user: UserIdentity,
    state: WorkflowState,
    cache: AnalysisCache,
    gateway: Arc<dyn AnalysisGateway>,
    snapshots: Arc<dyn SnapshotStore>,
    progress: ProgressFlag,
    published: watch::Sender<WorkflowState>,
}

impl WorkflowController {
    /// Opens a session. A `preload` wins over any snapshot; otherwise the
    /// snapshot is restored when present, else the workflow starts fresh.
    pub async fn open(
        user: UserIdentity,
        cache: AnalysisCache,
        gateway: Arc<dyn AnalysisGateway>,
        snapshots: Arc<dyn SnapshotStore>,
        preload: Option<Preload>,
    ) -> Self {
        let mut controller = Self {
            user,
            state: WorkflowState::default(),
            cache,
            gateway,
            snapshots,
            progress: ProgressFlag::default(),
            published: watch::channel(WorkflowState::default()).0,
        };

        if let Some(preload) = preload {
            controller.state = WorkflowState {
                step: Step::Results,
                resume_text: preload.resume_text,
                job_description: preload.job_description,
                result: Some(preload.result),
                result_is_from_cache: true,
                ..Default::default()
            };
            controller.persist().await;
            return controller;
        }

        match controller.snapshots.load().await {
            Ok(Some(saved)) if saved.owner == controller.user.user_id => {
                controller.state = saved.state.repaired();
                controller.publish();
                info!(
                    "Resumed workflow for user {} at {:?}",
                    controller.user.user_id,
                    controller.step()
                );
            }
            Ok(Some(_)) => {
                // Left in place for its owner; this controller starts unsaved.
                warn!(
                    "Workflow snapshot belongs to another user, not restoring for {}",
                    controller.user.user_id
                );
            }
            Ok(None) => controller.start().await,
            Err(e) => {
                warn!("Failed to load workflow snapshot, starting fresh: {e}");
                controller.start().await;
            }
        }
        controller
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn is_in_progress(&self) -> bool {
        self.progress.is_set()
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView::new(&self.state, self.is_in_progress())
    }

    pub fn monitor(&self) -> WorkflowMonitor {
        WorkflowMonitor {
            state: self.published.subscribe(),
            progress: self.progress.clone(),
        }
    }

    pub fn is_premium_eligible(&self) -> bool {
        premium_eligible(&self.state)
    }

    /// Fresh state at UPLOAD with the default dimension set.
    pub async fn start(&mut self) {
        self.state = WorkflowState::default();
        self.persist().await;
    }

    pub async fn provide_source(&mut self, text: &str) -> Result<(), WorkflowError> {
        self.expect_step(Step::Upload, "provide resume text")?;
        if text.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "Please provide your resume text.".to_string(),
            ));
        }
        self.state.resume_text = text.to_string();
        self.persist().await;
        Ok(())
    }

    pub async fn set_dimensions(
        &mut self,
        dimensions: BTreeSet<Dimension>,
    ) -> Result<(), WorkflowError> {
        self.expect_step(Step::Configure, "select analysis types")?;
        if dimensions.is_empty() {
            return Err(WorkflowError::Validation(
                "Select at least one analysis type.".to_string(),
            ));
        }
        self.state.selected_dimensions = dimensions;
        self.persist().await;
        Ok(())
    }

    pub async fn provide_job_description(&mut self, text: &str) -> Result<(), WorkflowError> {
        self.expect_step(Step::JobDescription, "provide a job description")?;
        self.state.job_description = text.to_string();
        self.persist().await;
        Ok(())
    }

    /// Moves forward one step, running the analysis when the next step is
    /// RESULTS. On analysis failure the step is unchanged and the error is
    /// returned so the caller can retry.
    pub async fn advance(&mut self) -> Result<Step, WorkflowError> {
        match self.state.step {
            Step::Upload => {
                if self.state.resume_text.trim().is_empty() {
                    return Err(WorkflowError::Validation(
                        "Please provide your resume text.".to_string(),
                    ));
                }
                self.state.step = Step::Configure;
            }
            Step::Configure => {
                if self.state.needs_job_description() {
                    self.state.step = Step::JobDescription;
                } else {
                    self.run_analysis().await?;
                }
            }
            Step::JobDescription => {
                if self.state.job_description.trim().is_empty() {
                    return Err(WorkflowError::Validation(
                        "Please provide the job description for job match analysis.".to_string(),
                    ));
                }
                self.run_analysis().await?;
            }
            Step::Results => {
                return Err(WorkflowError::InvalidTransition {
                    action: "advance",
                    step: Step::Results,
                });
            }
        }
        self.persist().await;
        Ok(self.step())
    }

    pub async fn back(&mut self) -> Result<Step, WorkflowError> {
        let previous = match self.state.step {
            Step::Configure => Step::Upload,
            Step::JobDescription => Step::Configure,
            step @ (Step::Upload | Step::Results) => {
                return Err(WorkflowError::InvalidTransition {
                    action: "go back",
                    step,
                });
            }
        };
        self.state.step = previous;
        self.persist().await;
        Ok(previous)
    }

    /// Clears everything and returns to UPLOAD, dropping the snapshot.
    pub async fn reset(&mut self) {
        self.state = WorkflowState::default();
        self.publish();
        if let Err(e) = self.snapshots.clear().await {
            warn!("Failed to clear workflow snapshot: {e}");
        }
        info!("Workflow reset for user {}", self.user.user_id);
    }

    async fn run_analysis(&mut self) -> Result<(), WorkflowError> {
        let _in_flight = self.progress.enter();
        let user_id = self.user.user_id;
        let needs_jd = self.state.needs_job_description();
        let resume_text = self.state.resume_text.clone();
        let job_description = if needs_jd {
            self.state.job_description.clone()
        } else {
            String::new()
        };

        if needs_jd {
            let resume_fp = self.cache.fingerprint(&resume_text);
            let jd_fp = self.cache.fingerprint(&job_description);
            if let Some(record) = self.cache.lookup(user_id, &resume_fp, &jd_fp).await {
                self.state.result = Some(record.to_result(CACHED_SUMMARY));
                self.state.result_is_from_cache = true;
                self.state.step = Step::Results;
                return Ok(());
            }
        }

        let dimensions = self.state.optional_dimensions();
        let result = match self
            .gateway
            .analyze(&resume_text, &job_description, &dimensions)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis failed for user {user_id}: {e}");
                return Err(e.into());
            }
        };

        info!(
            "Analysis complete for user {user_id}: score {}",
            result.numeric_score()
        );

        if needs_jd {
            self.cache
                .store(user_id, &resume_text, &job_description, &result)
                .await;
        }

        self.state.result = Some(result);
        self.state.result_is_from_cache = false;
        self.state.step = Step::Results;
        Ok(())
    }

    fn expect_step(&self, expected: Step, action: &'static str) -> Result<(), WorkflowError> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                action,
                step: self.state.step,
            })
        }
    }

    async fn persist(&self) {
        self.publish();
        let snapshot = Snapshot {
            owner: self.user.user_id,
            state: self.state.clone(),
        };
        if let Err(e) = self.snapshots.save(&snapshot).await {
            warn!("Failed to save workflow snapshot: {e}");
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }
}
