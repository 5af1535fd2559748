use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::test::TestType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestResult {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub test_type: TestType,
    pub duration_seconds: i32,
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub skip_count: i32,
    pub ungraded_count: i32,
    pub listening_correct: i32,
    pub listening_total: i32,
    pub reading_correct: i32,
    pub reading_total: i32,
    pub listening_score: Option<i32>,
    pub reading_score: Option<i32>,
    pub total_score: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAnswer {
    pub id: i64,
    pub result_id: Uuid,
    pub test_question_id: i64,
    pub sub_question_index: Option<i32>,
    pub chosen_label: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTestResult {
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub test_type: TestType,
    pub duration_seconds: i32,
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub skip_count: i32,
    pub ungraded_count: i32,
    pub listening_correct: i32,
    pub listening_total: i32,
    pub reading_correct: i32,
    pub reading_total: i32,
    pub listening_score: Option<i32>,
    pub reading_score: Option<i32>,
    pub total_score: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserAnswer {
    pub test_question_id: i64,
    pub sub_question_index: Option<i32>,
    pub chosen_label: Option<String>,
    pub is_correct: bool,
}
