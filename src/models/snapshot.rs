use serde::{Deserialize, Serialize};

/// Frozen copy of an answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub label: String,
    pub content: String,
    pub is_correct: bool,
}

/// Frozen copy of a standalone question, or of one member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_question_id: Option<i64>,
    pub part_id: i32,
    pub content: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSnapshot>,
}

impl QuestionSnapshot {
    /// Option whose label matches `label` after trimming, ignoring case.
    pub fn find_option(&self, label: &str) -> Option<&OptionSnapshot> {
        let wanted = label.trim();
        self.options
            .iter()
            .find(|o| o.label.trim().eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGroupSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group_id: Option<i64>,
    pub part_id: i32,
    pub passage: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub questions: Vec<QuestionSnapshot>,
}

/// Content of a test slot. Which variant a stored row holds is decided by the
/// row's `is_group` flag, so the JSON itself carries no tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Single(QuestionSnapshot),
    Group(QuestionGroupSnapshot),
}

impl Snapshot {
    pub fn decode(is_group: bool, raw: &str) -> serde_json::Result<Self> {
        if is_group {
            serde_json::from_str(raw).map(Snapshot::Group)
        } else {
            serde_json::from_str(raw).map(Snapshot::Single)
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        match self {
            Snapshot::Single(q) => serde_json::to_string(q),
            Snapshot::Group(g) => serde_json::to_string(g),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Snapshot::Group(_))
    }

    pub fn part_id(&self) -> i32 {
        match self {
            Snapshot::Single(q) => q.part_id,
            Snapshot::Group(g) => g.part_id,
        }
    }

    /// Number of answerable questions in this slot.
    pub fn leaf_count(&self) -> usize {
        match self {
            Snapshot::Single(_) => 1,
            Snapshot::Group(g) => g.questions.len(),
        }
    }

    /// Answerable questions paired with their sub-question index. Standalone
    /// questions report index 0.
    pub fn leaves(&self) -> Vec<(i32, &QuestionSnapshot)> {
        match self {
            Snapshot::Single(q) => vec![(0, q)],
            Snapshot::Group(g) => g
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| (i as i32, q))
                .collect(),
        }
    }
}
