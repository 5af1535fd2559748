use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

/// Business-rule violations. These are expected outcomes of a bad request
/// and are reported to the caller with a readable reason; they never abort
/// the process or get retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("Must provide single question id or group question id")]
    NothingSelected,

    #[error("Must provide at least one question range")]
    NoQuotas,

    #[error("Not enough questions in bank for part {part_id}. Requested: {requested}, Available: {available}")]
    InsufficientQuestions {
        part_id: i32,
        requested: usize,
        available: usize,
    },

    #[error("Not enough question groups in bank for part {part_id}. Requested: {requested}, Available: {available}")]
    InsufficientGroups {
        part_id: i32,
        requested: usize,
        available: usize,
    },

    #[error("Part {0} not found")]
    PartNotFound(i32),

    #[error("Part {part_id} ({part_name}) does not belong to a {test_skill} test")]
    PartSkillMismatch {
        part_id: i32,
        part_name: String,
        test_skill: String,
    },

    #[error("Question {0} not found in bank")]
    QuestionNotFound(i64),

    #[error("Question group {0} not found in bank")]
    GroupNotFound(i64),

    #[error("No questions to save for this test")]
    NoQuestions,

    #[error("{skill} test must have {expected} questions, currently {actual}")]
    WrongTotal {
        skill: String,
        expected: usize,
        actual: usize,
    },

    #[error("Listening & Reading test requires an audio file")]
    MissingTestAudio,

    #[error("Part {part_id} question requires an image")]
    MissingImage { part_id: i32 },

    #[error("Part {part_id} must have exactly {expected} options, got {actual}")]
    OptionCount {
        part_id: i32,
        expected: usize,
        actual: usize,
    },

    #[error("Part {part_id} question must have exactly one correct option, got {actual}")]
    CorrectOptionCount { part_id: i32, actual: usize },

    #[error("Part {part_id} question has an empty or duplicated option label")]
    OptionLabels { part_id: i32 },

    #[error("Group in part {part_id} must have 2-5 questions, got {actual}")]
    GroupSize { part_id: i32, actual: usize },

    #[error("Cannot publish a test through an edit; use the status endpoint")]
    PublishThroughEdit,

    #[error("Test is a draft; edit it in place instead of cloning")]
    CloneOfDraft,

    #[error("Cannot change status from {from} to {to}")]
    StatusTransition { from: String, to: String },

    #[error("Unsupported {kind} file type: {extension}")]
    UnsupportedMedia { kind: String, extension: String },

    #[error("Uploaded file '{0}' is referenced but was not sent")]
    MissingUpload(String),

    #[error("No answers provided.")]
    NoAnswers,

    #[error("Test is not open for submissions")]
    TestNotOpen,

    #[error("Test is not published")]
    TestNotPublished,

    #[error("{0} tests cannot be graded automatically")]
    NotAutoGradable(String),
}

impl RuleViolation {
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::NothingSelected => "nothing_selected",
            RuleViolation::NoQuotas => "no_quotas",
            RuleViolation::InsufficientQuestions { .. } => "insufficient_pool",
            RuleViolation::InsufficientGroups { .. } => "insufficient_pool",
            RuleViolation::PartNotFound(_) => "part_not_found",
            RuleViolation::PartSkillMismatch { .. } => "part_skill_mismatch",
            RuleViolation::QuestionNotFound(_) => "question_not_found",
            RuleViolation::GroupNotFound(_) => "group_not_found",
            RuleViolation::NoQuestions => "no_questions",
            RuleViolation::WrongTotal { .. } => "wrong_total",
            RuleViolation::MissingTestAudio => "missing_media",
            RuleViolation::MissingImage { .. } => "missing_media",
            RuleViolation::OptionCount { .. } => "option_count",
            RuleViolation::CorrectOptionCount { .. } => "correct_option_count",
            RuleViolation::OptionLabels { .. } => "option_labels",
            RuleViolation::GroupSize { .. } => "group_size",
            RuleViolation::PublishThroughEdit => "publish_through_edit",
            RuleViolation::CloneOfDraft => "clone_of_draft",
            RuleViolation::StatusTransition { .. } => "status_transition",
            RuleViolation::UnsupportedMedia { .. } => "unsupported_media",
            RuleViolation::MissingUpload(_) => "missing_upload",
            RuleViolation::NoAnswers => "no_answers",
            RuleViolation::TestNotOpen => "test_not_open",
            RuleViolation::TestNotPublished => "test_not_published",
            RuleViolation::NotAutoGradable(_) => "not_auto_gradable",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        if let Error::Rule(violation) = &self {
            let body = Json(json!({
                "error": violation.to_string(),
                "code": violation.code(),
            }));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }

        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed with an unexpected error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Conflict("Resource was modified concurrently, retry the request".to_string())
            }
            other => Error::Database(other),
        }
    }
}
