use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use super::{PipelineCore, PipelineStage, StageTiming, SubmissionTimer};
use crate::error::{AppResult, ValidationError};
use crate::extraction::{extract, FallbackField};
use crate::prompts::{build_cold_call_prompt, CallMetadata};
use crate::rubric::{Language, Stage, StageBand};
use crate::storage::{ColdCallRecord, NewColdCall};
use crate::validation::{
    sanitize_text, validate_audio, validate_optional_text, validate_text, AudioUpload,
    MAX_INSIGHT_LEN, MAX_PROSPECT_FIELD_LEN,
};

/// Input parameters for a cold-call analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdCallRequest {
    /// Owning BDR
    pub bdr_id: i64,
    pub prospect_name: String,
    pub prospect_company: String,
    /// Insight the BDR was meant to deliver, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_insight: Option<String>,
    /// Language of the call; selects the prompt and section headers
    #[serde(default)]
    pub language: Language,
}

impl ColdCallRequest {
    /// Create a request without a commercial insight
    pub fn new(
        bdr_id: i64,
        prospect_name: impl Into<String>,
        prospect_company: impl Into<String>,
    ) -> Self {
        Self {
            bdr_id,
            prospect_name: prospect_name.into(),
            prospect_company: prospect_company.into(),
            commercial_insight: None,
            language: Language::default(),
        }
    }

    /// Set the commercial insight
    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.commercial_insight = Some(insight.into());
        self
    }

    /// Set the call language
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    fn validate(&self) -> AppResult<()> {
        validate_text(&self.prospect_name, "prospect_name", MAX_PROSPECT_FIELD_LEN)?;
        validate_text(&self.prospect_company, "prospect_company", MAX_PROSPECT_FIELD_LEN)?;
        validate_optional_text(
            self.commercial_insight.as_deref(),
            "commercial_insight",
            MAX_INSIGHT_LEN,
        )?;
        Ok(())
    }
}

/// One stage score with its display band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoredStage {
    pub stage: Stage,
    pub label: &'static str,
    pub score: u8,
    pub band: StageBand,
    /// Whether the score is the fallback rather than a parsed value
    pub fallback: bool,
}

/// Result of a cold-call analysis
#[derive(Debug, Clone, Serialize)]
pub struct ColdCallAnalysis {
    pub submission_id: String,
    pub bdr_name: String,
    pub record: ColdCallRecord,
    pub stages: Vec<ScoredStage>,
    /// Fields that were substituted during extraction
    pub fallbacks: Vec<FallbackField>,
    pub transcript: String,
    pub timings: Vec<StageTiming>,
    pub total_ms: u64,
}

/// Cold-call analysis pipeline
#[derive(Clone)]
pub struct ColdCallAnalyzer {
    core: PipelineCore,
}

impl ColdCallAnalyzer {
    /// Create a new cold-call analyzer
    pub fn new(core: PipelineCore) -> Self {
        Self { core }
    }

    /// Analyze one recorded cold call and store the result.
    ///
    /// Nothing is persisted when validation or either external service fails.
    pub async fn analyze(
        &self,
        request: ColdCallRequest,
        audio: Option<AudioUpload>,
    ) -> AppResult<ColdCallAnalysis> {
        let timer = SubmissionTimer::start();
        let span = tracing::info_span!(
            "cold_call",
            submission_id = %timer.submission_id(),
            bdr_id = request.bdr_id,
            language = %request.language
        );

        self.run(timer, request, audio).instrument(span).await
    }

    async fn run(
        &self,
        mut timer: SubmissionTimer,
        request: ColdCallRequest,
        audio: Option<AudioUpload>,
    ) -> AppResult<ColdCallAnalysis> {
        info!("Cold call analysis started");

        request.validate()?;
        validate_audio(audio.as_ref(), self.core.upload_limits())?;
        let bdr = self.core.require_bdr(request.bdr_id).await?;
        timer.finish(PipelineStage::Validate);

        let Some(upload) = audio else {
            return Err(ValidationError::MissingFile.into());
        };
        let transcript = self.core.transcriber().transcribe(&upload).await?;
        debug!(transcript_chars = transcript.len(), "Transcript received");
        timer.finish(PipelineStage::Transcribe);

        let metadata = CallMetadata {
            bdr_name: bdr.name.clone(),
            prospect_name: request.prospect_name.clone(),
            prospect_company: request.prospect_company.clone(),
            commercial_insight: request.commercial_insight.clone(),
        };
        let prompt = build_cold_call_prompt(request.language, &metadata, &transcript);
        debug!(prompt_chars = prompt.len(), "Prompt built");
        timer.finish(PipelineStage::Prompt);

        let narrative = self.core.generator().generate(&prompt).await?;
        debug!(narrative_chars = narrative.len(), "Narrative received");
        timer.finish(PipelineStage::Generate);

        let extracted = extract(&narrative, request.language);
        let fallback_stages = extracted.fallback_stages();
        if extracted.fallback_applied() {
            warn!(
                fallback_count = extracted.fallbacks.len(),
                "Storing cold call with fallback values"
            );
        }
        timer.finish(PipelineStage::Extract);

        let mut new_call = NewColdCall::new(
            bdr.id,
            sanitize_text(&request.prospect_name),
            sanitize_text(&request.prospect_company),
            extracted.scores,
        )
        .with_analysis(
            extracted.full_analysis.clone(),
            extracted.attention_points.clone(),
            extracted.recommendations.clone(),
        )
        .with_fallback_stages(fallback_stages.clone());

        if let Some(insight) = request
            .commercial_insight
            .as_deref()
            .map(sanitize_text)
            .filter(|s| !s.is_empty())
        {
            new_call = new_call.with_commercial_insight(insight);
        }

        let record = self.core.storage().create_cold_call(&new_call).await?;
        timer.finish(PipelineStage::Persist);

        let stages = record
            .scores
            .iter()
            .map(|(stage, score)| ScoredStage {
                stage,
                label: stage.label(),
                score,
                band: StageBand::for_score(score),
                fallback: fallback_stages.contains(&stage),
            })
            .collect();

        let total_ms = timer.total_ms();
        info!(
            cold_call_id = record.id,
            total_ms = total_ms,
            "Cold call analysis completed"
        );

        Ok(ColdCallAnalysis {
            submission_id: timer.submission_id().to_string(),
            bdr_name: bdr.name,
            record,
            stages,
            fallbacks: extracted.fallbacks,
            transcript,
            timings: timer.into_timings(),
            total_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::error::{AppError, ServiceError, StorageError};
    use crate::openai::{MockTextGenerator, MockTranscriber};
    use crate::storage::{SqliteStorage, Storage};
    use std::sync::Arc;

    const NARRATIVE: &str = "### HYBRID CONVERSATION SCORES\n\
        **Warmer:** 8/10\n**Reframe:** 6/10\n**Rational Drowning:** 4/10\n\
        **Emotional Impact:** 7/10\n**New Way:** 9/10\n**Your Solution:** 3/10\n\
        ### ATTENTION POINTS\nNo <b>numbers</b> were used.\n\
        ### RECOMMENDATIONS\nBring one data point; ask why.";

    async fn storage_with_bdr() -> (Arc<SqliteStorage>, i64) {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let bdr = storage.create_bdr("Ana").await.unwrap();
        (storage, bdr.id)
    }

    fn analyzer(
        storage: Arc<SqliteStorage>,
        transcriber: MockTranscriber,
        generator: MockTextGenerator,
    ) -> ColdCallAnalyzer {
        ColdCallAnalyzer::new(PipelineCore::new(
            storage,
            Arc::new(transcriber),
            Arc::new(generator),
            UploadConfig::default(),
        ))
    }

    fn wav() -> Option<AudioUpload> {
        Some(AudioUpload::new("call.wav", vec![0u8; 2048]))
    }

    #[tokio::test]
    async fn test_analyze_persists_extracted_record() {
        let (storage, bdr_id) = storage_with_bdr().await;

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok("Hello, this is Ana from Acme.".to_string()));

        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| prompt.contains("Hello, this is Ana from Acme.") && prompt.contains("Globex"))
            .times(1)
            .returning(|_| Ok(NARRATIVE.to_string()));

        let analyzer = analyzer(storage.clone(), transcriber, generator);
        let request = ColdCallRequest::new(bdr_id, "Bruno Lima", "Globex")
            .with_insight("Churn grew twelve percent this year");

        let result = analyzer.analyze(request, wav()).await.unwrap();

        assert_eq!(result.bdr_name, "Ana");
        assert_eq!(result.record.scores.to_array(), [8, 6, 4, 7, 9, 3]);
        assert_eq!(result.record.attention_points, "No bnumbers/b were used.");
        assert_eq!(result.record.recommendations, "Bring one data point ask why.");
        assert_eq!(result.record.full_analysis, NARRATIVE);
        assert!(result.fallbacks.is_empty());
        assert_eq!(result.timings.len(), 6);
        assert_eq!(result.stages[0].band, StageBand::Strong);
        assert_eq!(result.stages[1].band, StageBand::Attention);
        assert_eq!(result.stages[5].band, StageBand::Weak);

        let stored = storage.get_cold_call(result.record.id).await.unwrap().unwrap();
        assert_eq!(stored, result.record);
        assert_eq!(
            stored.commercial_insight.as_deref(),
            Some("Churn grew twelve percent this year")
        );
    }

    #[tokio::test]
    async fn test_fallback_stages_are_recorded() {
        let (storage, bdr_id) = storage_with_bdr().await;

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_| Ok("transcript".to_string()));
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("Warmer: 8/10\nReframe: 6/10".to_string()));

        let analyzer = analyzer(storage.clone(), transcriber, generator);
        let result = analyzer
            .analyze(ColdCallRequest::new(bdr_id, "Bruno", "Globex"), wav())
            .await
            .unwrap();

        assert_eq!(
            result.record.fallback_stages,
            vec![
                Stage::RationalDrowning,
                Stage::EmotionalImpact,
                Stage::NewWay,
                Stage::YourSolution
            ]
        );
        assert_eq!(result.record.attention_points, "See full analysis");
        assert!(result.stages[2].fallback);
        assert!(!result.stages[0].fallback);
    }

    #[tokio::test]
    async fn test_invalid_text_stops_before_services() {
        let (storage, bdr_id) = storage_with_bdr().await;

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().never();
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();

        let analyzer = analyzer(storage.clone(), transcriber, generator);
        let err = analyzer
            .analyze(ColdCallRequest::new(bdr_id, "Robert'); DROP TABLE", "Globex"), wav())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::ForbiddenToken { .. })
        ));
        assert_eq!(storage.stats().await.unwrap().cold_calls, 0);
    }

    #[tokio::test]
    async fn test_missing_audio_is_rejected() {
        let (storage, bdr_id) = storage_with_bdr().await;
        let analyzer = analyzer(storage, MockTranscriber::new(), MockTextGenerator::new());

        let err = analyzer
            .analyze(ColdCallRequest::new(bdr_id, "Bruno", "Globex"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::MissingFile)
        ));
    }

    #[tokio::test]
    async fn test_unknown_bdr_is_not_found() {
        let (storage, _) = storage_with_bdr().await;
        let analyzer = analyzer(storage, MockTranscriber::new(), MockTextGenerator::new());

        let err = analyzer
            .analyze(ColdCallRequest::new(999, "Bruno", "Globex"), wav())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Storage(StorageError::BdrNotFound { bdr_id: 999 })
        ));
    }

    #[tokio::test]
    async fn test_transcription_failure_persists_nothing() {
        let (storage, bdr_id) = storage_with_bdr().await;

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().returning(|_| {
            Err(ServiceError::Transcription {
                message: "unsupported format".to_string(),
            })
        });
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();

        let analyzer = analyzer(storage.clone(), transcriber, generator);
        let err = analyzer
            .analyze(ColdCallRequest::new(bdr_id, "Bruno", "Globex"), wav())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Service(ServiceError::Transcription { .. })
        ));
        assert_eq!(storage.stats().await.unwrap().cold_calls, 0);
    }

    #[tokio::test]
    async fn test_generation_failure_persists_nothing() {
        let (storage, bdr_id) = storage_with_bdr().await;

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_| Ok("transcript".to_string()));
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().returning(|_| {
            Err(ServiceError::Generation {
                message: "rate limited".to_string(),
            })
        });

        let analyzer = analyzer(storage.clone(), transcriber, generator);
        let err = analyzer
            .analyze(ColdCallRequest::new(bdr_id, "Bruno", "Globex"), wav())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Service(ServiceError::Generation { .. })
        ));
        assert_eq!(storage.stats().await.unwrap().cold_calls, 0);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: ColdCallRequest = serde_json::from_value(serde_json::json!({
            "bdr_id": 1,
            "prospect_name": "Bruno",
            "prospect_company": "Globex"
        }))
        .unwrap();
        assert_eq!(request.language, Language::English);
        assert!(request.commercial_insight.is_none());
    }
}
