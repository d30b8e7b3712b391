pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::analysis::handlers as history;
use crate::premium::handlers as premium;
use crate::state::AppState;
use crate::workflow::handlers as workflow;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis wizard
        .route("/api/v1/workflows", post(workflow::handle_open_workflow))
        .route("/api/v1/workflows/:id", get(workflow::handle_get_workflow))
        .route(
            "/api/v1/workflows/:id/source",
            put(workflow::handle_provide_source),
        )
        .route(
            "/api/v1/workflows/:id/dimensions",
            put(workflow::handle_set_dimensions),
        )
        .route(
            "/api/v1/workflows/:id/job-description",
            put(workflow::handle_provide_job_description),
        )
        .route(
            "/api/v1/workflows/:id/advance",
            post(workflow::handle_advance),
        )
        .route("/api/v1/workflows/:id/back", post(workflow::handle_back))
        .route("/api/v1/workflows/:id/reset", post(workflow::handle_reset))
        // History
        .route("/api/v1/history", get(history::handle_history))
        // Paid tier
        .route("/api/v1/premium/fulfil", post(premium::handle_fulfil))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::analysis::cache::{AnalysisCache, HISTORY_SUMMARY};
    use crate::analysis::fingerprint::Fingerprinter;
    use crate::analysis::gateway::tests::{GatedGateway, ScriptedGateway};
    use crate::analysis::gateway::{AnalysisGateway, GatewayError};
    use crate::analysis::store::{AnalysisStore, InMemoryAnalysisStore};
    use crate::models::analysis::NewAnalysisRecord;
    use crate::premium::generator::tests::{ScriptedWriter, StaticVerifier};
    use crate::premium::generator::PremiumService;
    use crate::workflow::sessions::{SessionRegistry, WorkflowDeps};
    use crate::workflow::snapshot::InMemorySnapshotBackend;

    struct TestApp {
        router: Router,
        gateway: Arc<ScriptedGateway>,
        store: Arc<InMemoryAnalysisStore>,
        user_id: Uuid,
    }

    fn test_app(with_premium: bool) -> TestApp {
        let gateway = Arc::new(ScriptedGateway::new());
        test_app_with(gateway.clone(), gateway, with_premium)
    }

    /// `analyzer` serves the requests; `gateway` is what the test inspects.
    fn test_app_with(
        analyzer: Arc<dyn AnalysisGateway>,
        gateway: Arc<ScriptedGateway>,
        with_premium: bool,
    ) -> TestApp {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let cache = AnalysisCache::new(store.clone(), Fingerprinter::default());
        let premium = with_premium.then(|| {
            Arc::new(PremiumService::new(
                Arc::new(StaticVerifier { accept: true }),
                analyzer.clone(),
                Arc::new(ScriptedWriter::default()),
                cache.clone(),
            ))
        });
        let state = AppState {
            workflows: WorkflowDeps {
                cache,
                gateway: analyzer,
                snapshots: Arc::new(InMemorySnapshotBackend::new()),
            },
            sessions: Arc::new(SessionRegistry::new(Duration::from_secs(600))),
            premium,
        };
        TestApp {
            router: build_router(state),
            gateway,
            store,
            user_id: Uuid::new_v4(),
        }
    }

    async fn call(
        router: Router,
        method: &'static str,
        uri: String,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    impl TestApp {
        async fn send(
            &self,
            method: &'static str,
            uri: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            call(self.router.clone(), method, uri.to_string(), body).await
        }

        async fn open(&self) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/v1/workflows",
                    Some(json!({ "user_id": self.user_id, "email": "a@example.com" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["step"], "UPLOAD");
            body["session_id"].as_str().unwrap().to_string()
        }

        fn uri(&self, session: &str, action: &str) -> String {
            format!("/api/v1/workflows/{session}{action}?user_id={}", self.user_id)
        }

        async fn to_job_description(&self, session: &str) {
            let (status, _) = self
                .send(
                    "PUT",
                    &self.uri(session, "/source"),
                    Some(json!({ "resume_text": "Rust engineer, 8 years." })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            let (_, body) = self.send("POST", &self.uri(session, "/advance"), None).await;
            assert_eq!(body["step"], "CONFIGURE");
            let (_, body) = self.send("POST", &self.uri(session, "/advance"), None).await;
            assert_eq!(body["step"], "JOB_DESCRIPTION");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(false);
        let (status, body) = app.send("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "tailor-api");
    }

    #[tokio::test]
    async fn test_full_wizard_then_premium() {
        let app = test_app(true);
        let session = app.open().await;

        let (status, body) = app
            .send(
                "PUT",
                &app.uri(&session, "/source"),
                Some(json!({ "resume_text": "Rust engineer, 8 years." })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "UPLOAD");

        app.send("POST", &app.uri(&session, "/advance"), None).await;
        let (status, body) = app
            .send(
                "PUT",
                &app.uri(&session, "/dimensions"),
                Some(json!({ "dimensions": ["job_match_analysis", "ats_compatibility"] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected_dimensions"].as_array().unwrap().len(), 2);

        let (_, body) = app.send("POST", &app.uri(&session, "/advance"), None).await;
        assert_eq!(body["step"], "JOB_DESCRIPTION");

        let (status, body) = app.send("POST", &app.uri(&session, "/advance"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        app.send(
            "PUT",
            &app.uri(&session, "/job-description"),
            Some(json!({ "job_description": "Senior Rust engineer" })),
        )
        .await;
        let (status, body) = app.send("POST", &app.uri(&session, "/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "RESULTS");
        assert_eq!(body["progress_percent"], 72);
        assert_eq!(body["premium_eligible"], true);
        assert_eq!(body["result_is_from_cache"], false);

        let history_uri = format!("/api/v1/history?user_id={}", app.user_id);
        let (_, history) = app.send("GET", &history_uri, None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["is_premium"], false);

        let (status, docs) = app
            .send(
                "POST",
                "/api/v1/premium/fulfil",
                Some(json!({
                    "user_id": app.user_id,
                    "session_id": session,
                    "payment_reference": "T1234567890"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(docs["payment_reference"], "T1234567890");
        assert!(docs["cover_letter"].is_string());

        let (_, history) = app.send("GET", &history_uri, None).await;
        assert_eq!(history.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_retryable_and_keeps_step() {
        let app = test_app(false);
        app.gateway
            .push(Err(GatewayError::Unavailable("timeout".to_string())));
        let session = app.open().await;
        app.to_job_description(&session).await;
        app.send(
            "PUT",
            &app.uri(&session, "/job-description"),
            Some(json!({ "job_description": "Platform role" })),
        )
        .await;

        let (status, body) = app.send("POST", &app.uri(&session, "/advance"), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["retryable"], true);

        let (_, body) = app.send("GET", &app.uri(&session, ""), None).await;
        assert_eq!(body["step"], "JOB_DESCRIPTION");

        let (status, body) = app.send("POST", &app.uri(&session, "/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "RESULTS");
    }

    #[tokio::test]
    async fn test_back_from_upload_is_a_conflict() {
        let app = test_app(false);
        let session = app.open().await;
        let (status, body) = app.send("POST", &app.uri(&session, "/back"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_reset_returns_to_upload() {
        let app = test_app(false);
        let session = app.open().await;
        app.to_job_description(&session).await;

        let (status, body) = app.send("POST", &app.uri(&session, "/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "UPLOAD");
        assert_eq!(body["resume_text"], "");
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_sessions() {
        let app = test_app(false);
        let (status, _) = app
            .send("GET", &app.uri(&Uuid::new_v4().to_string(), ""), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let session = app.open().await;
        let foreign = format!("/api/v1/workflows/{session}?user_id={}", Uuid::new_v4());
        let (status, _) = app.send("GET", &foreign, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_history_preload_opens_at_results() {
        let app = test_app(false);
        let session = app.open().await;
        app.to_job_description(&session).await;
        app.send(
            "PUT",
            &app.uri(&session, "/job-description"),
            Some(json!({ "job_description": "Platform role" })),
        )
        .await;
        app.send("POST", &app.uri(&session, "/advance"), None).await;

        let history_uri = format!("/api/v1/history?user_id={}", app.user_id);
        let (_, history) = app.send("GET", &history_uri, None).await;
        let record_id = history[0]["id"].clone();

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/workflows",
                Some(json!({
                    "user_id": app.user_id,
                    "email": "a@example.com",
                    "history_record_id": record_id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["step"], "RESULTS");
        assert_eq!(body["result_is_from_cache"], true);
        assert_eq!(body["job_description"], "Platform role");
        assert_eq!(app.gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_premium_requires_results_and_configuration() {
        let app = test_app(false);
        let session = app.open().await;
        let request = json!({
            "user_id": app.user_id,
            "session_id": session,
            "payment_reference": "T1"
        });
        let (status, body) = app
            .send("POST", "/api/v1/premium/fulfil", Some(request))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "PREMIUM_UNAVAILABLE");

        let app = test_app(true);
        let session = app.open().await;
        let (status, _) = app
            .send(
                "POST",
                "/api/v1/premium/fulfil",
                Some(json!({
                    "user_id": app.user_id,
                    "session_id": session,
                    "payment_reference": "T1"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_during_analysis_reports_progress() {
        let gated = Arc::new(GatedGateway::default());
        let app = test_app_with(gated.clone(), Arc::new(ScriptedGateway::new()), false);
        let session = app.open().await;
        app.to_job_description(&session).await;
        app.send(
            "PUT",
            &app.uri(&session, "/job-description"),
            Some(json!({ "job_description": "Platform role" })),
        )
        .await;

        let advance = tokio::spawn(call(
            app.router.clone(),
            "POST",
            app.uri(&session, "/advance"),
            None,
        ));
        gated.entered.notified().await;

        let (status, body) = app.send("GET", &app.uri(&session, ""), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["in_progress"], true);
        assert_eq!(body["step"], "JOB_DESCRIPTION");
        assert_eq!(body["job_description"], "Platform role");

        let (status, body) = app.send("POST", &app.uri(&session, "/back"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ANALYSIS_IN_PROGRESS");

        gated.release.notify_one();
        let (status, body) = advance.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "RESULTS");
        assert_eq!(body["in_progress"], false);
    }

    #[tokio::test]
    async fn test_summary_only_history_record_uses_history_wording() {
        let app = test_app(false);
        let record = app
            .store
            .insert(NewAnalysisRecord {
                user_id: app.user_id,
                compatibility_score: 61,
                keyword_matches: vec!["Rust".to_string()],
                original_resume_text: Some("Rust engineer".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let (status, body) = app
            .send(
                "POST",
                "/api/v1/workflows",
                Some(json!({
                    "user_id": app.user_id,
                    "email": "a@example.com",
                    "history_record_id": record.id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["result"]["match_summary"], HISTORY_SUMMARY);
        assert_eq!(body["result"]["match_score"], "61/100");
        assert_eq!(body["progress_percent"], 61);
    }

    #[tokio::test]
    async fn test_payment_reference_cannot_be_reused() {
        let app = test_app(true);
        let session = app.open().await;
        app.to_job_description(&session).await;
        app.send(
            "PUT",
            &app.uri(&session, "/job-description"),
            Some(json!({ "job_description": "Platform role" })),
        )
        .await;
        app.send("POST", &app.uri(&session, "/advance"), None).await;

        let request = json!({
            "user_id": app.user_id,
            "session_id": session,
            "payment_reference": "ref_once"
        });
        let (status, _) = app
            .send("POST", "/api/v1/premium/fulfil", Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send("POST", "/api/v1/premium/fulfil", Some(request))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "PAYMENT_ALREADY_USED");
        assert_eq!(app.store.len().await, 2);
    }
}
