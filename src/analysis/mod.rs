//! The submission pipelines.
//!
//! Each submission runs one synchronous chain: validate, transcribe, build the
//! prompt, generate, extract, persist. Every submission gets a `submission_id`
//! attached to its log lines, and each stage's elapsed time is logged and
//! returned with the result.

mod cold_call;
mod dashboard;
mod meeting;

pub use cold_call::{ColdCallAnalysis, ColdCallAnalyzer, ColdCallRequest, ScoredStage};
pub use dashboard::{build_dashboard, DashboardReport, DashboardRequest};
pub use meeting::{MeetingAnalysis, MeetingAnalyzer, MeetingRequest};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::{AppResult, StorageError};
use crate::openai::{TextGenerator, Transcriber};
use crate::storage::{Bdr, Storage};

/// Dependencies shared by the pipelines.
#[derive(Clone)]
pub struct PipelineCore {
    storage: Arc<dyn Storage>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn TextGenerator>,
    upload: UploadConfig,
}

impl PipelineCore {
    /// Create a new pipeline core.
    pub fn new(
        storage: Arc<dyn Storage>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn TextGenerator>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            storage,
            transcriber,
            generator,
            upload,
        }
    }

    #[inline]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    #[inline]
    pub fn transcriber(&self) -> &dyn Transcriber {
        self.transcriber.as_ref()
    }

    #[inline]
    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    #[inline]
    pub fn upload_limits(&self) -> &UploadConfig {
        &self.upload
    }

    /// Fetch the owning BDR or fail with `BdrNotFound`.
    pub(crate) async fn require_bdr(&self, bdr_id: i64) -> AppResult<Bdr> {
        self.storage
            .get_bdr(bdr_id)
            .await?
            .ok_or_else(|| StorageError::BdrNotFound { bdr_id }.into())
    }
}

/// One step of a submission chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validate,
    Transcribe,
    Prompt,
    Generate,
    Extract,
    Persist,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Validate => write!(f, "validate"),
            PipelineStage::Transcribe => write!(f, "transcribe"),
            PipelineStage::Prompt => write!(f, "prompt"),
            PipelineStage::Generate => write!(f, "generate"),
            PipelineStage::Extract => write!(f, "extract"),
            PipelineStage::Persist => write!(f, "persist"),
        }
    }
}

/// Elapsed wall time of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: u64,
}

/// Tracks the stages of one submission.
pub(crate) struct SubmissionTimer {
    submission_id: Uuid,
    started: Instant,
    stage_started: Instant,
    timings: Vec<StageTiming>,
}

impl SubmissionTimer {
    pub(crate) fn start() -> Self {
        let now = Instant::now();
        Self {
            submission_id: Uuid::new_v4(),
            started: now,
            stage_started: now,
            timings: Vec::with_capacity(6),
        }
    }

    pub(crate) fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    /// Close the current stage and start timing the next one.
    pub(crate) fn finish(&mut self, stage: PipelineStage) {
        let elapsed_ms = self.stage_started.elapsed().as_millis() as u64;
        info!(stage = %stage, elapsed_ms = elapsed_ms, "Pipeline stage completed");
        self.timings.push(StageTiming { stage, elapsed_ms });
        self.stage_started = Instant::now();
    }

    pub(crate) fn total_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub(crate) fn into_timings(self) -> Vec<StageTiming> {
        self.timings
    }
}
