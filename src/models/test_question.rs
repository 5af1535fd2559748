use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::snapshot::Snapshot;
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    FromBank,
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::FromBank => "from_bank",
            SourceType::Manual => "manual",
        }
    }
}

impl TryFrom<String> for SourceType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "from_bank" => Ok(SourceType::FromBank),
            "manual" => Ok(SourceType::Manual),
            _ => Err(UnknownVariant::new("source type", value)),
        }
    }
}

/// Slot of a test. Written once together with its test and never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestQuestion {
    pub id: i64,
    pub test_id: Uuid,
    pub part_id: i32,
    pub order_in_test: i32,
    pub is_group: bool,
    #[sqlx(try_from = "String")]
    pub source_type: SourceType,
    pub source_question_id: Option<i64>,
    pub source_group_id: Option<i64>,
    pub snapshot_json: String,
    pub created_at: DateTime<Utc>,
}

impl TestQuestion {
    pub fn snapshot(&self) -> serde_json::Result<Snapshot> {
        Snapshot::decode(self.is_group, &self.snapshot_json)
    }

    /// Same slot, ready to be attached to another test version.
    pub fn to_new(&self) -> NewTestQuestion {
        NewTestQuestion {
            part_id: self.part_id,
            order_in_test: self.order_in_test,
            is_group: self.is_group,
            source_type: self.source_type,
            source_question_id: self.source_question_id,
            source_group_id: self.source_group_id,
            snapshot_json: self.snapshot_json.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTestQuestion {
    pub part_id: i32,
    pub order_in_test: i32,
    pub is_group: bool,
    pub source_type: SourceType,
    pub source_question_id: Option<i64>,
    pub source_group_id: Option<i64>,
    pub snapshot_json: String,
}
