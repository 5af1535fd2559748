use std::sync::Arc;

use uuid::Uuid;

use crate::database::parts::PartCatalog;
use crate::database::result_store::ResultStore;
use crate::database::test_store::TestStore;
use crate::dto::submission_dto::{PaginatedResults, ResultResponse, SubmitAnswersRequest};
use crate::dto::{page_offset, total_pages};
use crate::error::{Error, Result, RuleViolation};
use crate::models::test::{TestSkill, TestStatus};
use crate::models::test_result::{NewTestResult, TestResult};
use crate::services::grading_service::GradingService;
use crate::services::score_service::{scale, ScoreTable};

/// Takes a submission for a published test, grades it against the frozen
/// snapshots and stores the result.
#[derive(Clone)]
pub struct AttemptService {
    tests: Arc<dyn TestStore>,
    results: Arc<dyn ResultStore>,
    parts: Arc<dyn PartCatalog>,
    scores: Arc<dyn ScoreTable>,
}

impl AttemptService {
    pub fn new(
        tests: Arc<dyn TestStore>,
        results: Arc<dyn ResultStore>,
        parts: Arc<dyn PartCatalog>,
        scores: Arc<dyn ScoreTable>,
    ) -> Self {
        Self {
            tests,
            results,
            parts,
            scores,
        }
    }

    pub async fn submit(&self, test_id: Uuid, request: SubmitAnswersRequest) -> Result<TestResult> {
        let test = self
            .tests
            .find_test(test_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        if test.status != TestStatus::Active {
            return Err(RuleViolation::TestNotOpen.into());
        }
        if test.skill != TestSkill::ListeningReading {
            return Err(RuleViolation::NotAutoGradable(test.skill.label().to_string()).into());
        }
        if request.answers.is_empty() {
            return Err(RuleViolation::NoAnswers.into());
        }

        let questions = self.tests.list_questions(test.id).await?;
        let mut part_ids: Vec<i32> = questions.iter().map(|q| q.part_id).collect();
        part_ids.sort_unstable();
        part_ids.dedup();
        let skills = self.parts.skill_map(&part_ids).await?;

        let outcome = GradingService::grade(
            &questions,
            &request.answers,
            &skills,
            test.total_questions.max(0) as usize,
        );
        let scaled = scale(
            self.scores.as_ref(),
            test.test_type,
            outcome.listening_correct,
            outcome.reading_correct,
        );

        let new_result = NewTestResult {
            test_id: test.id,
            user_id: request.user_id,
            test_type: test.test_type,
            duration_seconds: request.duration_seconds,
            total_questions: test.total_questions,
            correct_count: outcome.correct as i32,
            incorrect_count: outcome.incorrect as i32,
            skip_count: outcome.skipped as i32,
            ungraded_count: outcome.ungraded as i32,
            listening_correct: outcome.listening_correct as i32,
            listening_total: outcome.listening_total as i32,
            reading_correct: outcome.reading_correct as i32,
            reading_total: outcome.reading_total as i32,
            listening_score: scaled.listening,
            reading_score: scaled.reading,
            total_score: scaled.total,
        };

        let stored = self.results.insert_result(new_result, outcome.answers).await?;
        if outcome.ungraded > 0 {
            tracing::warn!(
                result_id = %stored.id,
                ungraded = outcome.ungraded,
                "Submission graded with ungraded questions"
            );
        }
        tracing::info!(
            result_id = %stored.id,
            test_id = %test.id,
            user_id = %request.user_id,
            correct = stored.correct_count,
            total_score = ?stored.total_score,
            "Submission graded"
        );
        Ok(stored)
    }

    pub async fn get_result(&self, id: Uuid) -> Result<ResultResponse> {
        let result = self
            .results
            .find_result(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Result {} not found", id)))?;
        let answers = self.results.list_answers(id).await?;
        Ok(ResultResponse { result, answers })
    }

    /// A user's submitted results, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        page: i64,
        per_page: i64,
    ) -> Result<PaginatedResults> {
        let offset = page_offset(page, per_page)?;
        let (results, total) = self.results.list_by_user(user_id, per_page, offset).await?;
        Ok(PaginatedResults {
            results,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        })
    }
}
