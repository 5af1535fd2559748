use std::collections::HashMap;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::question::{BankOption, BankQuestion, BankQuestionGroup};

/// Read access to the live question bank.
///
/// Random lookups sample without replacement and return fewer rows than
/// requested when the pool is short; deciding whether that is acceptable is
/// up to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Standalone questions by id, in no particular order. Unknown ids are skipped.
    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<BankQuestion>>;

    async fn random_questions(
        &self,
        part_id: i32,
        question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestion>>;

    /// Groups by id with their members loaded. Unknown ids are skipped.
    async fn get_groups(&self, ids: &[i64]) -> Result<Vec<BankQuestionGroup>>;

    async fn random_groups(
        &self,
        part_id: i32,
        question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestionGroup>>;
}

#[derive(Clone)]
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_options(&self, questions: &mut [BankQuestion]) -> Result<()> {
        if questions.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, BankOption>(
            r#"
            SELECT id, question_id, label, content, is_correct, position
            FROM bank_options
            WHERE question_id = ANY($1)
            ORDER BY question_id, position, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<BankOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }
        for question in questions.iter_mut() {
            question.options = by_question.remove(&question.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn attach_members(&self, groups: &mut [BankQuestionGroup]) -> Result<()> {
        if groups.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = groups.iter().map(|g| g.id).collect();
        let mut members = sqlx::query_as::<_, BankQuestion>(
            r#"
            SELECT id, part_id, question_type_id, group_id, content, audio_url, image_url, explanation
            FROM bank_questions
            WHERE group_id = ANY($1)
            ORDER BY group_id, position, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        self.attach_options(&mut members).await?;

        let mut by_group: HashMap<i64, Vec<BankQuestion>> = HashMap::new();
        for member in members {
            if let Some(group_id) = member.group_id {
                by_group.entry(group_id).or_default().push(member);
            }
        }
        for group in groups.iter_mut() {
            group.questions = by_group.remove(&group.id).unwrap_or_default();
        }
        Ok(())
    }
}

/// Picks up to `count` ids. The rng is dropped before returning so callers
/// can keep awaiting.
fn sample_ids(candidates: &[i64], count: usize) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count)
        .copied()
        .collect()
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<BankQuestion>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut questions = sqlx::query_as::<_, BankQuestion>(
            r#"
            SELECT id, part_id, question_type_id, group_id, content, audio_url, image_url, explanation
            FROM bank_questions
            WHERE id = ANY($1) AND group_id IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        self.attach_options(&mut questions).await?;
        Ok(questions)
    }

    async fn random_questions(
        &self,
        part_id: i32,
        question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestion>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let candidates: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM bank_questions
            WHERE part_id = $1
              AND group_id IS NULL
              AND ($2::INT IS NULL OR question_type_id = $2)
              AND NOT (id = ANY($3))
            "#,
        )
        .bind(part_id)
        .bind(question_type_id)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        let picked = sample_ids(&candidates, count);
        let mut questions = self.get_questions(&picked).await?;
        // Keep the sampled order rather than whatever the IN lookup returned.
        questions.sort_by_key(|q| picked.iter().position(|id| *id == q.id));
        Ok(questions)
    }

    async fn get_groups(&self, ids: &[i64]) -> Result<Vec<BankQuestionGroup>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut groups = sqlx::query_as::<_, BankQuestionGroup>(
            r#"
            SELECT id, part_id, passage, audio_url, image_url
            FROM bank_question_groups
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        self.attach_members(&mut groups).await?;
        Ok(groups)
    }

    async fn random_groups(
        &self,
        part_id: i32,
        question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestionGroup>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let candidates: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT g.id FROM bank_question_groups g
            WHERE g.part_id = $1
              AND NOT (g.id = ANY($3))
              AND (
                $2::INT IS NULL OR EXISTS (
                    SELECT 1 FROM bank_questions q
                    WHERE q.group_id = g.id AND q.question_type_id = $2
                )
              )
            "#,
        )
        .bind(part_id)
        .bind(question_type_id)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        let picked = sample_ids(&candidates, count);
        let mut groups = self.get_groups(&picked).await?;
        groups.sort_by_key(|g| picked.iter().position(|id| *id == g.id));
        Ok(groups)
    }
}
