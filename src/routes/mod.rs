pub mod health;
pub mod submissions;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::AppState;

/// API routes without the outer layers, so tests can drive it directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/tests", get(tests::list_tests))
        .route("/api/tests/from-bank", post(tests::create_from_bank))
        .route(
            "/api/tests/from-bank/random",
            post(tests::create_from_bank_random),
        )
        .route("/api/tests/manual", post(tests::create_manual))
        .route("/api/tests/:id", get(tests::get_test))
        .route("/api/tests/:id/paper", get(tests::get_paper))
        .route("/api/tests/:id/from-bank", put(tests::update_from_bank))
        .route("/api/tests/:id/manual", put(tests::update_manual))
        .route("/api/tests/:id/clone", post(tests::clone_test))
        .route("/api/tests/:id/status", patch(tests::change_status))
        .route("/api/tests/:id/versions", get(tests::list_versions))
        .route(
            "/api/tests/:id/submissions",
            post(submissions::submit_answers),
        )
        .route("/api/results/:id", get(submissions::get_result))
        .route(
            "/api/users/:user_id/results",
            get(submissions::user_history),
        )
        .with_state(state)
}

#[cfg(test)]
mod route_tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value as JsonValue};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::database::test_store::TestStore;
    use crate::models::test::TestStatus;
    use crate::services::assembly_service::TestAssembler;
    use crate::services::attempt_service::AttemptService;
    use crate::services::score_service::ToeicScoreTable;
    use crate::services::test_service::TestService;
    use crate::test_support::{
        bank_question, seed_test, FakeBank, FakeParts, FakeResultStore, FakeTestStore,
        RecordingMediaStore,
    };

    struct Harness {
        store: Arc<FakeTestStore>,
        app: Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(FakeTestStore::default());
        let parts = Arc::new(FakeParts::standard());
        let bank = FakeBank::default()
            .with_question(bank_question(1, 5, 4))
            .with_question(bank_question(2, 5, 4));
        let test_service = TestService::new(
            store.clone(),
            TestAssembler::new(Arc::new(bank), parts.clone()),
            parts.clone(),
            Arc::new(RecordingMediaStore::default()),
        );
        let attempt_service = AttemptService::new(
            store.clone(),
            Arc::new(FakeResultStore::default()),
            parts,
            Arc::new(ToeicScoreTable),
        );
        Harness {
            store,
            app: router(AppState::from_services(test_service, attempt_service)),
        }
    }

    fn json_request(method: &str, uri: &str, body: JsonValue) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn from_bank_body(title: &str) -> JsonValue {
        json!({
            "title": title,
            "skill": "listening_reading",
            "test_type": "practice",
            "duration_minutes": 45,
            "question_ids": [1, 2]
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness();
        let response = h
            .app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn create_then_read_detail() {
        let h = harness();
        let response = h
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tests/from-bank",
                from_bank_body("Reading drill"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "draft");
        assert_eq!(created["total_questions"], 2);

        let id = created["id"].as_str().unwrap();
        let response = h
            .app
            .oneshot(
                Request::get(format!("/api/tests/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["parts"][0]["part_id"], 5);
        assert_eq!(detail["parts"][0]["questions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_is_a_bad_request() {
        let h = harness();
        let response = h
            .app
            .oneshot(json_request("POST", "/api/tests/from-bank", from_bank_body("")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rule_violations_are_unprocessable() {
        let h = harness();
        let draft = seed_test(&h.store, TestStatus::Draft, 1).await;
        let response = h
            .app
            .oneshot(json_request(
                "POST",
                &format!("/api/tests/{}/submissions", draft.id),
                json!({ "user_id": Uuid::new_v4(), "answers": [] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "test_not_open");
    }

    #[tokio::test]
    async fn unknown_result_is_not_found() {
        let h = harness();
        let response = h
            .app
            .oneshot(
                Request::get(format!("/api/results/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn publish_then_list_active() {
        let h = harness();
        let draft = seed_test(&h.store, TestStatus::Draft, 2).await;
        let response = h
            .app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/api/tests/{}/status", draft.id),
                json!({ "status": "active" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .app
            .oneshot(
                Request::get("/api/tests?status=active&per_page=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let page = body_json(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["per_page"], 5);
        assert_eq!(page["items"][0]["id"], draft.id.to_string());
    }

    #[tokio::test]
    async fn oversized_page_is_a_bad_request() {
        let h = harness();
        seed_test(&h.store, TestStatus::Draft, 1).await;
        let response = h
            .app
            .oneshot(
                Request::get("/api/tests?page=100000000000000000&per_page=100")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn paper_of_published_test_has_no_answer_key() {
        let h = harness();
        let draft = seed_test(&h.store, TestStatus::Draft, 2).await;
        let uri = format!("/api/tests/{}/paper", draft.id);

        let response = h
            .app
            .clone()
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "test_not_published");

        h.store.force_status(draft.id, TestStatus::Active);
        let response = h
            .app
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let paper = body_json(response).await;
        let options = &paper["parts"][0]["questions"][0]["content"]["options"];
        assert_eq!(options.as_array().unwrap().len(), 4);
        assert!(options[0].get("is_correct").is_none());
        assert!(!paper.to_string().contains("is_correct"));
    }

    #[tokio::test]
    async fn user_history_pages_results() {
        let h = harness();
        let test = seed_test(&h.store, TestStatus::Active, 1).await;
        let learner = Uuid::new_v4();
        let slot = h.store.list_questions(test.id).await.unwrap()[0].id;

        for _ in 0..2 {
            let response = h
                .app
                .clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/tests/{}/submissions", test.id),
                    json!({
                        "user_id": learner,
                        "answers": [{ "test_question_id": slot, "chosen_label": "A" }]
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = h
            .app
            .oneshot(
                Request::get(format!("/api/users/{}/results?per_page=1", learner))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["total"], 2);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["items"][0]["correct_count"], 1);
    }

    #[tokio::test]
    async fn manual_form_without_payload_is_rejected() {
        let h = harness();
        let boundary = "exam-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
            b = boundary
        );
        let response = h
            .app
            .oneshot(
                Request::post("/api/tests/manual")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
