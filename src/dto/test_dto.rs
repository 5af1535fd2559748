use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::snapshot::{OptionSnapshot, Snapshot};
use crate::models::test::{Test, TestFilter, TestSkill, TestStatus, TestType};
use crate::models::test_question::SourceType;
use crate::services::assembly_service::{ExplicitSelection, RandomQuota};

/// Attributes shared by every create/update request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestMetaRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub skill: TestSkill,
    pub test_type: TestType,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    /// Only checked to refuse publishing through an edit.
    pub status: Option<TestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FromBankRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub meta: TestMetaRequest,
    pub audio_url: Option<String>,
    #[serde(default)]
    pub question_ids: Vec<i64>,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

impl FromBankRequest {
    pub fn selection(&self) -> ExplicitSelection {
        ExplicitSelection {
            question_ids: self.question_ids.clone(),
            group_ids: self.group_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuotaRequest {
    pub part_id: i32,
    pub question_type_id: Option<i32>,
    #[serde(default)]
    #[validate(range(max = 200))]
    pub question_count: usize,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub group_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RandomFromBankRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub meta: TestMetaRequest,
    pub audio_url: Option<String>,
    #[validate(nested)]
    pub quotas: Vec<QuotaRequest>,
}

impl RandomFromBankRequest {
    pub fn quotas(&self) -> Vec<RandomQuota> {
        self.quotas
            .iter()
            .map(|q| RandomQuota {
                part_id: q.part_id,
                question_type_id: q.question_type_id,
                question_count: q.question_count,
                group_count: q.group_count,
            })
            .collect()
    }
}

/// Media field of a manual test: an existing URL or the name of a multipart
/// file field sent with the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaRef {
    Url { url: String },
    Upload { upload: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionRequest {
    pub label: String,
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl From<&OptionRequest> for OptionSnapshot {
    fn from(o: &OptionRequest) -> Self {
        OptionSnapshot {
            label: o.label.clone(),
            content: o.content.clone(),
            is_correct: o.is_correct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManualQuestionRequest {
    #[validate(length(min = 1))]
    pub content: String,
    pub audio: Option<MediaRef>,
    pub image: Option<MediaRef>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManualGroupRequest {
    #[serde(default)]
    pub passage: String,
    pub audio: Option<MediaRef>,
    pub image: Option<MediaRef>,
    #[validate(nested)]
    pub questions: Vec<ManualQuestionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManualPartRequest {
    pub part_id: i32,
    #[serde(default)]
    #[validate(nested)]
    pub groups: Vec<ManualGroupRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<ManualQuestionRequest>,
}

/// JSON carried in the `payload` field of a manual create/update request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ManualTestRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub meta: TestMetaRequest,
    pub audio: Option<MediaRef>,
    #[serde(default)]
    #[validate(nested)]
    pub parts: Vec<ManualPartRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: TestStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListTestsQuery {
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<i64>,
    pub skill: Option<TestSkill>,
    pub test_type: Option<TestType>,
    pub status: Option<TestStatus>,
    pub search: Option<String>,
}

impl ListTestsQuery {
    pub fn filter(&self) -> TestFilter {
        TestFilter {
            skill: self.skill,
            test_type: self.test_type,
            status: self.status,
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedTests {
    #[serde(rename = "items")]
    pub tests: Vec<Test>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestQuestionView {
    pub id: i64,
    pub order_in_test: i32,
    pub is_group: bool,
    pub source_type: SourceType,
    pub source_question_id: Option<i64>,
    pub source_group_id: Option<i64>,
    /// `None` when the stored snapshot could not be decoded.
    pub snapshot: Option<Snapshot>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub snapshot_error: bool,
}

/// Slots of one part, in test order.
#[derive(Debug, Clone, Serialize)]
pub struct PartSection<Q = TestQuestionView> {
    pub part_id: i32,
    pub part_name: Option<String>,
    pub questions: Vec<Q>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDetailResponse {
    #[serde(flatten)]
    pub test: Test,
    pub family_id: Uuid,
    pub parts: Vec<PartSection>,
}
