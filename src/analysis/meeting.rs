use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Instrument};

use super::{PipelineCore, PipelineStage, StageTiming, SubmissionTimer};
use crate::error::{AppResult, ValidationError};
use crate::extraction::{extract_meeting, FallbackField};
use crate::prompts::build_meeting_prompt;
use crate::rubric::Language;
use crate::storage::{MeetingRecord, NewMeeting};
use crate::validation::{validate_audio, AudioUpload};

/// Input parameters for a 1:1 meeting analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub bdr_id: i64,
    #[serde(default)]
    pub language: Language,
    /// When the meeting took place; defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_at: Option<DateTime<Utc>>,
}

impl MeetingRequest {
    pub fn new(bdr_id: i64) -> Self {
        Self {
            bdr_id,
            language: Language::default(),
            held_at: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn held_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.held_at = Some(timestamp);
        self
    }
}

/// Result of a 1:1 meeting analysis
#[derive(Debug, Clone, Serialize)]
pub struct MeetingAnalysis {
    pub submission_id: String,
    pub bdr_name: String,
    pub record: MeetingRecord,
    /// The BDR's most recent meeting before this one
    pub previous: Option<MeetingRecord>,
    pub fallbacks: Vec<FallbackField>,
    /// Unmodified narrative
    pub full_analysis: String,
    pub transcript: String,
    pub timings: Vec<StageTiming>,
    pub total_ms: u64,
}

/// 1:1 meeting analysis pipeline
#[derive(Clone)]
pub struct MeetingAnalyzer {
    core: PipelineCore,
}

impl MeetingAnalyzer {
    pub fn new(core: PipelineCore) -> Self {
        Self { core }
    }

    /// Analyze one recorded meeting and store its summary and goals.
    pub async fn analyze(
        &self,
        request: MeetingRequest,
        audio: Option<AudioUpload>,
    ) -> AppResult<MeetingAnalysis> {
        let timer = SubmissionTimer::start();
        let span = tracing::info_span!(
            "meeting",
            submission_id = %timer.submission_id(),
            bdr_id = request.bdr_id,
            language = %request.language
        );

        self.run(timer, request, audio).instrument(span).await
    }

    async fn run(
        &self,
        mut timer: SubmissionTimer,
        request: MeetingRequest,
        audio: Option<AudioUpload>,
    ) -> AppResult<MeetingAnalysis> {
        info!("Meeting analysis started");

        validate_audio(audio.as_ref(), self.core.upload_limits())?;
        let bdr = self.core.require_bdr(request.bdr_id).await?;
        let previous = self.core.storage().latest_meeting(bdr.id).await?;
        timer.finish(PipelineStage::Validate);

        let Some(upload) = audio else {
            return Err(ValidationError::MissingFile.into());
        };
        let transcript = self.core.transcriber().transcribe(&upload).await?;
        debug!(transcript_chars = transcript.len(), "Transcript received");
        timer.finish(PipelineStage::Transcribe);

        let prompt = build_meeting_prompt(request.language, &bdr.name, &transcript);
        timer.finish(PipelineStage::Prompt);

        let narrative = self.core.generator().generate(&prompt).await?;
        debug!(narrative_chars = narrative.len(), "Narrative received");
        timer.finish(PipelineStage::Generate);

        let extracted = extract_meeting(&narrative, request.language);
        timer.finish(PipelineStage::Extract);

        let mut new_meeting =
            NewMeeting::new(bdr.id, extracted.summary.clone(), extracted.goals.clone());
        if let Some(held_at) = request.held_at {
            new_meeting = new_meeting.with_timestamp(held_at);
        }

        let record = self.core.storage().create_meeting(&new_meeting).await?;
        timer.finish(PipelineStage::Persist);

        let total_ms = timer.total_ms();
        info!(
            meeting_id = record.id,
            total_ms = total_ms,
            "Meeting analysis completed"
        );

        Ok(MeetingAnalysis {
            submission_id: timer.submission_id().to_string(),
            bdr_name: bdr.name,
            record,
            previous,
            fallbacks: extracted.fallbacks,
            full_analysis: narrative,
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
    use crate::error::{AppError, ServiceError};
    use crate::openai::{MockTextGenerator, MockTranscriber};
    use crate::storage::{SqliteStorage, Storage};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn analyzer(
        storage: Arc<SqliteStorage>,
        transcriber: MockTranscriber,
        generator: MockTextGenerator,
    ) -> MeetingAnalyzer {
        MeetingAnalyzer::new(PipelineCore::new(
            storage,
            Arc::new(transcriber),
            Arc::new(generator),
            UploadConfig::default(),
        ))
    }

    fn mp3() -> Option<AudioUpload> {
        Some(AudioUpload::new("weekly.mp3", vec![1u8; 512]))
    }

    #[tokio::test]
    async fn test_meeting_is_extracted_and_stored() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let bdr = storage.create_bdr("Carla").await.unwrap();
        let earlier = NewMeeting::new(bdr.id, "old summary", "old goals")
            .with_timestamp(Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap());
        storage.create_meeting(&earlier).await.unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_| Ok("Vamos falar da semana.".to_string()));
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| prompt.contains("Carla") && prompt.contains("RESUMO DA REUNIÃO"))
            .returning(|_| {
                Ok("### RESUMO DA REUNIÃO\nBoa semana.\n### METAS E PRÓXIMOS PASSOS\n- 40 ligações".to_string())
            });

        let held_at = Utc.with_ymd_and_hms(2025, 1, 13, 10, 0, 0).unwrap();
        let result = analyzer(storage.clone(), transcriber, generator)
            .analyze(
                MeetingRequest::new(bdr.id)
                    .with_language(Language::Portuguese)
                    .held_at(held_at),
                mp3(),
            )
            .await
            .unwrap();

        assert_eq!(result.record.summary, "Boa semana.");
        assert_eq!(result.record.goals, "- 40 ligações");
        assert_eq!(result.record.timestamp, held_at);
        assert!(result.fallbacks.is_empty());
        assert_eq!(result.previous.unwrap().summary, "old summary");

        let latest = storage.latest_meeting(bdr.id).await.unwrap().unwrap();
        assert_eq!(latest.id, result.record.id);
    }

    #[tokio::test]
    async fn test_unstructured_narrative_keeps_everything_in_goals() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let bdr = storage.create_bdr("Carla").await.unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_| Ok("transcript".to_string()));
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("Good week overall.".to_string()));

        let result = analyzer(storage, transcriber, generator)
            .analyze(MeetingRequest::new(bdr.id), mp3())
            .await
            .unwrap();

        assert_eq!(result.record.summary, "Could not extract the summary.");
        assert_eq!(result.record.goals, "Good week overall.");
        assert_eq!(
            result.fallbacks,
            vec![FallbackField::Summary, FallbackField::Goals]
        );
        assert!(result.previous.is_none());
    }

    #[tokio::test]
    async fn test_service_failure_persists_nothing() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let bdr = storage.create_bdr("Carla").await.unwrap();

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().returning(|_| {
            Err(ServiceError::Transcription {
                message: "timeout".to_string(),
            })
        });

        let err = analyzer(storage.clone(), transcriber, MockTextGenerator::new())
            .analyze(MeetingRequest::new(bdr.id), mp3())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Service(_)));
        assert_eq!(storage.stats().await.unwrap().meetings, 0);
    }

    #[tokio::test]
    async fn test_bad_extension_is_rejected() {
        let storage = Arc::new(SqliteStorage::new_in_memory().await.unwrap());
        let bdr = storage.create_bdr("Carla").await.unwrap();

        let err = analyzer(storage, MockTranscriber::new(), MockTextGenerator::new())
            .analyze(
                MeetingRequest::new(bdr.id),
                Some(AudioUpload::new("notes.txt", vec![1])),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::UnsupportedExtension { .. })
        ));
    }
}
