//! End-to-end pipeline tests
//!
//! Drives the MCP tool layer against a file-backed SQLite database and a
//! mocked transcription / chat completion service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use bdr_coach::config::{
    Config, DatabaseConfig, LogFormat, LoggingConfig, OpenAiConfig, RequestConfig, UploadConfig,
};
use bdr_coach::error::McpError;
use bdr_coach::openai::OpenAiClient;
use bdr_coach::server::{handle_tool_call, AppState, SharedState};
use bdr_coach::storage::{SqliteStorage, Storage};

const COLD_CALL_NARRATIVE: &str = "### HYBRID CONVERSATION SCORES\n\
    **Warmer:** 9/10\n**Reframe:** 7/10\n**Rational Drowning:** 5/10\n\
    **Emotional Impact:** 6/10\n**New Way:** 8/10\n**Your Solution:** 4/10\n\
    ### ATTENTION POINTS\nThe solution was pitched too early.\n\
    ### RECOMMENDATIONS\nStay in the problem for one more question.";

const MEETING_NARRATIVE: &str = "### MEETING SUMMARY\nStrong week, pipeline grew.\n\
    ### GOALS AND NEXT STEPS\n- Book 6 demos\n- Review two calls";

struct TestEnv {
    state: SharedState,
    server: MockServer,
    dir: TempDir,
}

impl TestEnv {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let config = Config {
            openai: OpenAiConfig {
                api_key: "test-api-key".to_string(),
                base_url: server.uri(),
                transcription_model: "whisper-1".to_string(),
                chat_model: "gpt-4-turbo".to_string(),
            },
            database: DatabaseConfig {
                path: dir.path().join("data").join("coach.db"),
                max_connections: 2,
            },
            logging: LoggingConfig {
                level: "warn".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig {
                timeout_ms: 5000,
                max_retries: 0,
                retry_delay_ms: 10,
            },
            upload: UploadConfig::default(),
        };

        let storage = SqliteStorage::new(&config.database)
            .await
            .expect("Failed to open database");
        let client = OpenAiClient::new(&config.openai, config.request.clone())
            .expect("Failed to create client");
        let state = Arc::new(AppState::new(config, storage, client));

        Self { state, server, dir }
    }

    fn recording(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, vec![0x49, 0x44, 0x33, 0x03, 0x00, 0x00]).unwrap();
        path
    }

    async fn mock_services(&self, transcript: &str, narrative: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": transcript })))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "model": "gpt-4-turbo",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": narrative },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&self.server)
            .await;
    }

    async fn call(&self, tool: &str, arguments: Value) -> Result<Value, McpError> {
        handle_tool_call(&self.state, tool, Some(arguments)).await
    }

    async fn create_bdr(&self, name: &str) -> i64 {
        let bdr = self.call("bdr_create", json!({ "name": name })).await.unwrap();
        bdr["id"].as_i64().unwrap()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod cold_call_pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_cold_call_end_to_end() {
        let env = TestEnv::start().await;
        env.mock_services("Hi, this is Ana calling from Acme.", COLD_CALL_NARRATIVE)
            .await;
        let bdr_id = env.create_bdr("Ana").await;
        let audio = env.recording("call.mp3");

        let result = env
            .call(
                "cold_call_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "prospect_name": "Bruno",
                    "prospect_company": "Globex",
                    "audio_path": path_arg(&audio)
                }),
            )
            .await
            .unwrap();

        assert_eq!(result["bdr_name"], "Ana");
        assert_eq!(result["transcript"], "Hi, this is Ana calling from Acme.");
        assert_eq!(result["record"]["scores"]["warmer"], 9);
        assert_eq!(result["record"]["scores"]["your_solution"], 4);
        assert_eq!(
            result["record"]["recommendations"],
            "Stay in the problem for one more question."
        );
        assert_eq!(result["fallbacks"], json!([]));

        let cold_call_id = result["record"]["id"].as_i64().unwrap();
        let stored = env
            .state
            .storage
            .get_cold_call(cold_call_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.scores.to_array(), [9, 7, 5, 6, 8, 4]);
        assert_eq!(stored.full_analysis, COLD_CALL_NARRATIVE);

        let chart = env
            .call("cold_call_chart", json!({ "cold_call_id": cold_call_id }))
            .await
            .unwrap();
        assert!(chart["svg"].as_str().unwrap().starts_with("<svg"));
    }

    #[tokio::test]
    async fn test_section_emptied_by_sanitizing_stores_placeholder() {
        let env = TestEnv::start().await;
        let narrative = COLD_CALL_NARRATIVE.replace(
            "The solution was pitched too early.",
            "'';",
        );
        env.mock_services("transcript", &narrative).await;
        let bdr_id = env.create_bdr("Ana").await;
        let audio = env.recording("call.mp3");

        let result = env
            .call(
                "cold_call_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "prospect_name": "Bruno",
                    "prospect_company": "Globex",
                    "audio_path": path_arg(&audio)
                }),
            )
            .await
            .unwrap();

        assert_eq!(result["record"]["attention_points"], "See full analysis");
        assert_eq!(
            result["fallbacks"],
            json!([{ "field": "attention_points" }])
        );

        let cold_call_id = result["record"]["id"].as_i64().unwrap();
        let stored = env
            .state
            .storage
            .get_cold_call(cold_call_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attention_points, "See full analysis");
        assert_eq!(
            stored.recommendations,
            "Stay in the problem for one more question."
        );
    }

    #[tokio::test]
    async fn test_service_failure_stores_nothing() {
        let env = TestEnv::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("transcriber down"))
            .mount(&env.server)
            .await;
        let bdr_id = env.create_bdr("Ana").await;
        let audio = env.recording("call.wav");

        let err = env
            .call(
                "cold_call_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "prospect_name": "Bruno",
                    "prospect_company": "Globex",
                    "audio_path": path_arg(&audio)
                }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("transcriber down"));
        assert_eq!(env.state.storage.stats().await.unwrap().cold_calls, 0);
    }

    #[tokio::test]
    async fn test_dashboard_reflects_stored_calls() {
        let env = TestEnv::start().await;
        env.mock_services("transcript", COLD_CALL_NARRATIVE).await;
        let bdr_id = env.create_bdr("Ana").await;

        for name in ["first.mp3", "second.mp3"] {
            let audio = env.recording(name);
            env.call(
                "cold_call_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "prospect_name": "Bruno",
                    "prospect_company": "Globex",
                    "audio_path": path_arg(&audio)
                }),
            )
            .await
            .unwrap();
        }

        let report = env
            .call("dashboard", json!({ "bdr_id": bdr_id, "period": "7d" }))
            .await
            .unwrap();

        assert_eq!(report["aggregate"]["count"], 2);
        assert_eq!(report["aggregate"]["averages"]["warmer"], 9.0);
        assert_eq!(report["aggregate"]["averages"]["your_solution"], 4.0);
        assert!(report["summary_text"].is_string());
        assert!(report["chart"]["svg"].is_string());
    }
}

#[cfg(test)]
mod meeting_pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_meeting_end_to_end_returns_previous() {
        let env = TestEnv::start().await;
        env.mock_services("Let's review the week.", MEETING_NARRATIVE)
            .await;
        let bdr_id = env.create_bdr("Carla").await;

        let first = env
            .call(
                "meeting_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "held_at": "2025-01-06T10:00:00Z",
                    "audio_path": path_arg(&env.recording("week1.m4a"))
                }),
            )
            .await
            .unwrap();
        assert!(first["previous"].is_null());
        assert_eq!(first["record"]["summary"], "Strong week, pipeline grew.");

        let second = env
            .call(
                "meeting_analyze",
                json!({
                    "bdr_id": bdr_id,
                    "held_at": "2025-01-13T10:00:00Z",
                    "audio_path": path_arg(&env.recording("week2.m4a"))
                }),
            )
            .await
            .unwrap();
        assert_eq!(second["previous"]["id"], first["record"]["id"]);
        assert_eq!(second["record"]["goals"], "- Book 6 demos\n- Review two calls");

        let latest = env
            .call("meeting_latest", json!({ "bdr_id": bdr_id }))
            .await
            .unwrap();
        assert_eq!(latest["id"], second["record"]["id"]);
    }

    #[tokio::test]
    async fn test_deleting_bdr_removes_history() {
        let env = TestEnv::start().await;
        env.mock_services("transcript", MEETING_NARRATIVE).await;
        let bdr_id = env.create_bdr("Carla").await;

        env.call(
            "meeting_analyze",
            json!({
                "bdr_id": bdr_id,
                "audio_path": path_arg(&env.recording("week.mp3"))
            }),
        )
        .await
        .unwrap();

        let removed = env
            .call("bdr_delete", json!({ "bdr_id": bdr_id }))
            .await
            .unwrap();
        assert_eq!(removed["meetings"], 1);
        assert_eq!(removed["cold_calls"], 0);

        let stats = env.call("stats", json!({})).await.unwrap();
        assert_eq!(stats, json!({ "bdrs": 0, "meetings": 0, "cold_calls": 0 }));
    }
}
