use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::Result;
use crate::models::test_result::{NewTestResult, NewUserAnswer, TestResult, UserAnswer};

const RESULT_COLUMNS: &str = "id, test_id, user_id, test_type, duration_seconds, total_questions, \
    correct_count, incorrect_count, skip_count, ungraded_count, listening_correct, listening_total, \
    reading_correct, reading_total, listening_score, reading_score, total_score, created_at";

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Stores a graded result together with all of its answers, atomically.
    async fn insert_result(
        &self,
        result: NewTestResult,
        answers: Vec<NewUserAnswer>,
    ) -> Result<TestResult>;

    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>>;

    async fn list_answers(&self, result_id: Uuid) -> Result<Vec<UserAnswer>>;

    /// One page of a user's results, newest first, with the overall count.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestResult>, i64)>;
}

#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn insert_result(
        &self,
        result: NewTestResult,
        answers: Vec<NewUserAnswer>,
    ) -> Result<TestResult> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO test_results (
                id, test_id, user_id, test_type, duration_seconds, total_questions,
                correct_count, incorrect_count, skip_count, ungraded_count,
                listening_correct, listening_total, reading_correct, reading_total,
                listening_score, reading_score, total_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        );
        let stored = sqlx::query_as::<_, TestResult>(&sql)
            .bind(Uuid::new_v4())
            .bind(result.test_id)
            .bind(result.user_id)
            .bind(result.test_type.as_str())
            .bind(result.duration_seconds)
            .bind(result.total_questions)
            .bind(result.correct_count)
            .bind(result.incorrect_count)
            .bind(result.skip_count)
            .bind(result.ungraded_count)
            .bind(result.listening_correct)
            .bind(result.listening_total)
            .bind(result.reading_correct)
            .bind(result.reading_total)
            .bind(result.listening_score)
            .bind(result.reading_score)
            .bind(result.total_score)
            .fetch_one(&mut *tx)
            .await?;

        if !answers.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO user_answers (result_id, test_question_id, sub_question_index, \
                 chosen_label, is_correct) ",
            );
            builder.push_values(&answers, |mut row, a| {
                row.push_bind(stored.id)
                    .push_bind(a.test_question_id)
                    .push_bind(a.sub_question_index)
                    .push_bind(a.chosen_label.as_deref())
                    .push_bind(a.is_correct);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::debug!(result_id = %stored.id, answers = answers.len(), "Stored test result");
        Ok(stored)
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>> {
        let sql = format!("SELECT {} FROM test_results WHERE id = $1", RESULT_COLUMNS);
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(result)
    }

    async fn list_answers(&self, result_id: Uuid) -> Result<Vec<UserAnswer>> {
        let answers = sqlx::query_as::<_, UserAnswer>(
            r#"
            SELECT a.id, a.result_id, a.test_question_id, a.sub_question_index,
                   a.chosen_label, a.is_correct
            FROM user_answers a
            JOIN test_questions q ON q.id = a.test_question_id
            WHERE a.result_id = $1
            ORDER BY q.order_in_test, a.sub_question_index NULLS FIRST
            "#,
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestResult>, i64)> {
        let sql = format!(
            "SELECT {} FROM test_results WHERE user_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
            RESULT_COLUMNS
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM test_results WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok((results, total))
    }
}
