use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::test_result::{TestResult, UserAnswer};
use crate::services::grading_service::SubmittedAnswer;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    pub user_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_seconds: i32,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultResponse {
    #[serde(flatten)]
    pub result: TestResult,
    pub answers: Vec<UserAnswer>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResults {
    #[serde(rename = "items")]
    pub results: Vec<TestResult>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}
