use serde::Serialize;
use uuid::Uuid;

use crate::dto::test_dto::PartSection;
use crate::models::snapshot::{QuestionSnapshot, Snapshot};
use crate::models::test::{Test, TestSkill, TestType};

/// Option as shown to a test taker.
#[derive(Debug, Clone, Serialize)]
pub struct PaperOption {
    pub label: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperQuestion {
    pub content: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub options: Vec<PaperOption>,
}

impl From<&QuestionSnapshot> for PaperQuestion {
    fn from(q: &QuestionSnapshot) -> Self {
        Self {
            content: q.content.clone(),
            audio_url: q.audio_url.clone(),
            image_url: q.image_url.clone(),
            options: q
                .options
                .iter()
                .map(|o| PaperOption {
                    label: o.label.clone(),
                    content: o.content.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperGroup {
    pub passage: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub questions: Vec<PaperQuestion>,
}

/// Slot content with the answer key and explanations left out.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaperContent {
    Single(PaperQuestion),
    Group(PaperGroup),
}

impl From<&Snapshot> for PaperContent {
    fn from(snapshot: &Snapshot) -> Self {
        match snapshot {
            Snapshot::Single(q) => PaperContent::Single(q.into()),
            Snapshot::Group(g) => PaperContent::Group(PaperGroup {
                passage: g.passage.clone(),
                audio_url: g.audio_url.clone(),
                image_url: g.image_url.clone(),
                questions: g.questions.iter().map(Into::into).collect(),
            }),
        }
    }
}

/// `id` is the test question id answers refer to.
#[derive(Debug, Clone, Serialize)]
pub struct PaperSlot {
    pub id: i64,
    pub order_in_test: i32,
    pub is_group: bool,
    pub content: PaperContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestPaperResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub skill: TestSkill,
    pub test_type: TestType,
    pub duration_minutes: i32,
    pub total_questions: i32,
    pub audio_url: Option<String>,
    pub parts: Vec<PartSection<PaperSlot>>,
}

impl TestPaperResponse {
    pub fn new(test: Test, parts: Vec<PartSection<PaperSlot>>) -> Self {
        Self {
            id: test.id,
            title: test.title,
            description: test.description,
            skill: test.skill,
            test_type: test.test_type,
            duration_minutes: test.duration_minutes,
            total_questions: test.total_questions,
            audio_url: test.audio_url,
            parts,
        }
    }
}
