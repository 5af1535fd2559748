use std::collections::HashSet;

use crate::error::RuleViolation;
use crate::models::part::{Part, MAX_GROUP_QUESTIONS, MIN_GROUP_QUESTIONS};
use crate::models::question::{AuthoredGroup, AuthoredQuestion, BankQuestion, BankQuestionGroup};
use crate::models::snapshot::{OptionSnapshot, QuestionGroupSnapshot, QuestionSnapshot};

/// Freezes bank or hand-written content into owned snapshot values and
/// enforces the structural rules of the target part. Never touches storage.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn from_bank_question(
        part: &Part,
        question: &BankQuestion,
    ) -> Result<QuestionSnapshot, RuleViolation> {
        let snapshot = freeze_bank_question(part, question);
        check_question(part, &snapshot, false)?;
        Ok(snapshot)
    }

    pub fn from_bank_group(
        part: &Part,
        group: &BankQuestionGroup,
    ) -> Result<QuestionGroupSnapshot, RuleViolation> {
        let snapshot = QuestionGroupSnapshot {
            source_group_id: Some(group.id),
            part_id: part.id,
            passage: group.passage.clone(),
            audio_url: group.audio_url.clone(),
            image_url: group.image_url.clone(),
            questions: group
                .questions
                .iter()
                .map(|q| freeze_bank_question(part, q))
                .collect(),
        };
        check_group(part, &snapshot)?;
        Ok(snapshot)
    }

    pub fn from_authored_question(
        part: &Part,
        question: &AuthoredQuestion,
    ) -> Result<QuestionSnapshot, RuleViolation> {
        let snapshot = freeze_authored_question(part, question);
        check_question(part, &snapshot, false)?;
        Ok(snapshot)
    }

    pub fn from_authored_group(
        part: &Part,
        group: &AuthoredGroup,
    ) -> Result<QuestionGroupSnapshot, RuleViolation> {
        let snapshot = QuestionGroupSnapshot {
            source_group_id: None,
            part_id: part.id,
            passage: group.passage.clone(),
            audio_url: group.audio_url.clone(),
            image_url: group.image_url.clone(),
            questions: group
                .questions
                .iter()
                .map(|q| freeze_authored_question(part, q))
                .collect(),
        };
        check_group(part, &snapshot)?;
        Ok(snapshot)
    }
}

fn freeze_bank_question(part: &Part, question: &BankQuestion) -> QuestionSnapshot {
    QuestionSnapshot {
        source_question_id: Some(question.id),
        part_id: part.id,
        content: question.content.clone(),
        audio_url: question.audio_url.clone(),
        image_url: question.image_url.clone(),
        explanation: question.explanation.clone(),
        options: question
            .options
            .iter()
            .map(|o| OptionSnapshot {
                label: o.label.clone(),
                content: o.content.clone(),
                is_correct: o.is_correct,
            })
            .collect(),
    }
}

fn freeze_authored_question(part: &Part, question: &AuthoredQuestion) -> QuestionSnapshot {
    QuestionSnapshot {
        source_question_id: None,
        part_id: part.id,
        content: question.content.clone(),
        audio_url: question.audio_url.clone(),
        image_url: question.image_url.clone(),
        explanation: question.explanation.clone(),
        options: question.options.clone(),
    }
}

fn has_url(url: &Option<String>) -> bool {
    url.as_deref().map(|u| !u.trim().is_empty()).unwrap_or(false)
}

fn check_group(part: &Part, group: &QuestionGroupSnapshot) -> Result<(), RuleViolation> {
    let size = group.questions.len();
    if !(MIN_GROUP_QUESTIONS..=MAX_GROUP_QUESTIONS).contains(&size) {
        return Err(RuleViolation::GroupSize {
            part_id: part.id,
            actual: size,
        });
    }
    let group_has_image = has_url(&group.image_url);
    for question in &group.questions {
        check_question(part, question, group_has_image)?;
    }
    Ok(())
}

fn check_question(
    part: &Part,
    question: &QuestionSnapshot,
    inherited_image: bool,
) -> Result<(), RuleViolation> {
    let rules = part.rules();

    if rules.image_required && !inherited_image && !has_url(&question.image_url) {
        return Err(RuleViolation::MissingImage { part_id: part.id });
    }

    let Some(expected) = rules.option_count else {
        return Ok(());
    };

    if question.options.len() != expected {
        return Err(RuleViolation::OptionCount {
            part_id: part.id,
            expected,
            actual: question.options.len(),
        });
    }

    let correct = question.options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(RuleViolation::CorrectOptionCount {
            part_id: part.id,
            actual: correct,
        });
    }

    let mut seen = HashSet::new();
    for option in &question.options {
        let label = option.label.trim().to_lowercase();
        if label.is_empty() || !seen.insert(label) {
            return Err(RuleViolation::OptionLabels { part_id: part.id });
        }
    }
    Ok(())
}
