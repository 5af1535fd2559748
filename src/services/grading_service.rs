use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::part::Skill;
use crate::models::test_question::TestQuestion;
use crate::models::test_result::NewUserAnswer;

/// One entry of a submission. A missing label is an explicit skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub test_question_id: i64,
    #[serde(default)]
    pub sub_question_index: Option<i32>,
    #[serde(default)]
    pub chosen_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeOutcome {
    pub answers: Vec<NewUserAnswer>,
    pub correct: usize,
    pub incorrect: usize,
    pub skipped: usize,
    /// Leaves that could not be scored: corrupt snapshots or open-answer parts.
    pub ungraded: usize,
    pub listening_correct: usize,
    pub listening_total: usize,
    pub reading_correct: usize,
    pub reading_total: usize,
}

impl GradeOutcome {
    pub fn graded_leaves(&self) -> usize {
        self.correct + self.incorrect + self.skipped
    }
}

pub struct GradingService;

impl GradingService {
    /// Reconciles a submission against the frozen snapshots of a test.
    ///
    /// `expected_leaves` is the leaf count recorded on the test. A corrupt
    /// group cannot report its own size, so any leaves not accounted for by
    /// the pass are reported as ungraded.
    pub fn grade(
        questions: &[TestQuestion],
        submitted: &[SubmittedAnswer],
        skills: &HashMap<i32, Skill>,
        expected_leaves: usize,
    ) -> GradeOutcome {
        let known: HashSet<i64> = questions.iter().map(|q| q.id).collect();
        let mut lookup: HashMap<(i64, i32), Option<&str>> = HashMap::new();
        for entry in submitted {
            if !known.contains(&entry.test_question_id) {
                tracing::warn!(
                    test_question_id = entry.test_question_id,
                    "Ignoring answer for a question that is not part of this test"
                );
                continue;
            }
            let key = (entry.test_question_id, entry.sub_question_index.unwrap_or(0));
            lookup.insert(key, entry.chosen_label.as_deref());
        }

        let mut outcome = GradeOutcome::default();

        for question in questions {
            let snapshot = match question.snapshot() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!(
                        test_question_id = question.id,
                        error = %e,
                        "Frozen snapshot could not be decoded; question left ungraded"
                    );
                    if !question.is_group {
                        outcome.ungraded += 1;
                    }
                    continue;
                }
            };

            let skill = skills.get(&question.part_id).copied();
            let leaves = snapshot.leaves();
            if !skill.map(|s| s.is_choice_based()).unwrap_or(false) {
                outcome.ungraded += leaves.len();
                continue;
            }

            for (index, leaf) in leaves {
                let is_listening = skill == Some(Skill::Listening);
                if is_listening {
                    outcome.listening_total += 1;
                } else {
                    outcome.reading_total += 1;
                }

                let sub_question_index = question.is_group.then_some(index);
                let label = match lookup.get(&(question.id, index)) {
                    None => {
                        outcome.skipped += 1;
                        continue;
                    }
                    Some(None) => {
                        outcome.skipped += 1;
                        outcome.answers.push(NewUserAnswer {
                            test_question_id: question.id,
                            sub_question_index,
                            chosen_label: None,
                            is_correct: false,
                        });
                        continue;
                    }
                    Some(Some(label)) => *label,
                };

                let is_correct = leaf.find_option(label).map(|o| o.is_correct).unwrap_or(false);
                if is_correct {
                    outcome.correct += 1;
                    if is_listening {
                        outcome.listening_correct += 1;
                    } else {
                        outcome.reading_correct += 1;
                    }
                } else {
                    outcome.incorrect += 1;
                }
                outcome.answers.push(NewUserAnswer {
                    test_question_id: question.id,
                    sub_question_index,
                    chosen_label: Some(label.trim().to_string()),
                    is_correct,
                });
            }
        }

        let accounted = outcome.graded_leaves() + outcome.ungraded;
        if expected_leaves > accounted {
            outcome.ungraded += expected_leaves - accounted;
        }
        outcome
    }
}
