use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::snapshot::OptionSnapshot;

/// Live question bank row. Editors may change or delete these at any time;
/// tests only ever keep snapshots of them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankQuestion {
    pub id: i64,
    pub part_id: i32,
    pub question_type_id: Option<i32>,
    pub group_id: Option<i64>,
    pub content: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    #[sqlx(skip)]
    pub options: Vec<BankOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankOption {
    pub id: i64,
    pub question_id: i64,
    pub label: String,
    pub content: String,
    pub is_correct: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankQuestionGroup {
    pub id: i64,
    pub part_id: i32,
    pub passage: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    #[sqlx(skip)]
    pub questions: Vec<BankQuestion>,
}

/// Question written directly into a manual test, media already resolved to URLs.
#[derive(Debug, Clone, Default)]
pub struct AuthoredQuestion {
    pub content: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    pub options: Vec<OptionSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthoredGroup {
    pub passage: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub questions: Vec<AuthoredQuestion>,
}

/// One part of a manual test: its groups come before its standalone questions.
#[derive(Debug, Clone, Default)]
pub struct AuthoredPart {
    pub part_id: i32,
    pub groups: Vec<AuthoredGroup>,
    pub questions: Vec<AuthoredQuestion>,
}
