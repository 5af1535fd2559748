use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{test::TestSkill, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Listening,
    Reading,
    Speaking,
    Writing,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Listening => "listening",
            Skill::Reading => "reading",
            Skill::Speaking => "speaking",
            Skill::Writing => "writing",
        }
    }

    /// Whether questions of this skill are multiple-choice and auto-graded.
    pub fn is_choice_based(&self) -> bool {
        matches!(self, Skill::Listening | Skill::Reading)
    }

    pub fn fits(&self, test_skill: TestSkill) -> bool {
        match test_skill {
            TestSkill::ListeningReading => self.is_choice_based(),
            TestSkill::Speaking => *self == Skill::Speaking,
            TestSkill::Writing => *self == Skill::Writing,
        }
    }
}

impl TryFrom<String> for Skill {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "listening" => Ok(Skill::Listening),
            "reading" => Ok(Skill::Reading),
            "speaking" => Ok(Skill::Speaking),
            "writing" => Ok(Skill::Writing),
            _ => Err(UnknownVariant::new("skill", value)),
        }
    }
}

/// Fixed structural section of an exam skill.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Part {
    pub id: i32,
    /// Part number within its skill (Listening part 1, Reading part 5, ...).
    pub number: i32,
    #[sqlx(try_from = "String")]
    pub skill: Skill,
    pub name: String,
}

impl Part {
    pub fn rules(&self) -> PartRules {
        if !self.skill.is_choice_based() {
            return PartRules {
                option_count: None,
                image_required: false,
            };
        }
        let question_response = self.skill == Skill::Listening && self.number == 2;
        let photographs = self.skill == Skill::Listening && self.number == 1;
        PartRules {
            option_count: Some(if question_response { 3 } else { 4 }),
            image_required: photographs,
        }
    }
}

/// Structural constraints every frozen question of a part must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRules {
    /// `None` for open-answer parts (speaking, writing).
    pub option_count: Option<usize>,
    pub image_required: bool,
}

pub const MIN_GROUP_QUESTIONS: usize = 2;
pub const MAX_GROUP_QUESTIONS: usize = 5;
