use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::test::{NewTest, Test, TestFilter, TestMeta, TestStatus};
use crate::models::test_question::{NewTestQuestion, TestQuestion};

const TEST_COLUMNS: &str = "id, title, description, skill, test_type, duration_minutes, \
    total_questions, audio_url, status, version, parent_test_id, created_at, updated_at";

/// Persistence for tests and their frozen question slots. Every method that
/// writes more than one row does so in a single transaction.
#[async_trait]
pub trait TestStore: Send + Sync {
    async fn insert_test(&self, test: NewTest, questions: Vec<NewTestQuestion>) -> Result<Test>;

    /// Overwrites a draft's metadata and replaces its question set. Fails with
    /// a conflict when the test is no longer a draft.
    async fn replace_draft(
        &self,
        id: Uuid,
        meta: TestMeta,
        total_questions: i32,
        questions: Vec<NewTestQuestion>,
    ) -> Result<Test>;

    async fn find_test(&self, id: Uuid) -> Result<Option<Test>>;

    /// Slots of a test ordered by `order_in_test`.
    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<TestQuestion>>;

    /// Every version sharing `root_id` as family root, newest first.
    async fn list_family(&self, root_id: Uuid) -> Result<Vec<Test>>;

    async fn max_family_version(&self, root_id: Uuid) -> Result<i32>;

    /// Moves a test from `from` to `to`; a conflict when it is not in `from`.
    async fn set_status(&self, id: Uuid, from: TestStatus, to: TestStatus) -> Result<Test>;

    async fn list_tests(&self, filter: &TestFilter, limit: i64, offset: i64)
        -> Result<(Vec<Test>, i64)>;
}

#[derive(Clone)]
pub struct PgTestStore {
    pool: PgPool,
}

impl PgTestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_questions(
    tx: &mut Transaction<'_, Postgres>,
    test_id: Uuid,
    questions: &[NewTestQuestion],
) -> Result<()> {
    if questions.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO test_questions (test_id, part_id, order_in_test, is_group, source_type, \
         source_question_id, source_group_id, snapshot_json) ",
    );
    builder.push_values(questions, |mut row, q| {
        row.push_bind(test_id)
            .push_bind(q.part_id)
            .push_bind(q.order_in_test)
            .push_bind(q.is_group)
            .push_bind(q.source_type.as_str())
            .push_bind(q.source_question_id)
            .push_bind(q.source_group_id)
            .push_bind(q.snapshot_json.as_str());
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

#[async_trait]
impl TestStore for PgTestStore {
    async fn insert_test(&self, test: NewTest, questions: Vec<NewTestQuestion>) -> Result<Test> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO tests (
                id, title, description, skill, test_type, duration_minutes,
                total_questions, audio_url, status, version, parent_test_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            TEST_COLUMNS
        );
        let created = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .bind(&test.meta.title)
            .bind(&test.meta.description)
            .bind(test.meta.skill.as_str())
            .bind(test.meta.test_type.as_str())
            .bind(test.meta.duration_minutes)
            .bind(test.total_questions)
            .bind(&test.meta.audio_url)
            .bind(test.status.as_str())
            .bind(test.version)
            .bind(test.parent_test_id)
            .fetch_one(&mut *tx)
            .await?;

        insert_questions(&mut tx, created.id, &questions).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn replace_draft(
        &self,
        id: Uuid,
        meta: TestMeta,
        total_questions: i32,
        questions: Vec<NewTestQuestion>,
    ) -> Result<Test> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            UPDATE tests
            SET title = $2, description = $3, skill = $4, test_type = $5,
                duration_minutes = $6, audio_url = $7, total_questions = $8,
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING {}
            "#,
            TEST_COLUMNS
        );
        let updated = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .bind(&meta.title)
            .bind(&meta.description)
            .bind(meta.skill.as_str())
            .bind(meta.test_type.as_str())
            .bind(meta.duration_minutes)
            .bind(&meta.audio_url)
            .bind(total_questions)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::Conflict(format!("Test {} is no longer a draft", id)))?;

        sqlx::query("DELETE FROM test_questions WHERE test_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, id, &questions).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn find_test(&self, id: Uuid) -> Result<Option<Test>> {
        let sql = format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS);
        let test = sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(test)
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<TestQuestion>> {
        let questions = sqlx::query_as::<_, TestQuestion>(
            r#"
            SELECT id, test_id, part_id, order_in_test, is_group, source_type,
                   source_question_id, source_group_id, snapshot_json, created_at
            FROM test_questions
            WHERE test_id = $1
            ORDER BY order_in_test
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn list_family(&self, root_id: Uuid) -> Result<Vec<Test>> {
        let sql = format!(
            "SELECT {} FROM tests WHERE id = $1 OR parent_test_id = $1 ORDER BY version DESC",
            TEST_COLUMNS
        );
        let tests = sqlx::query_as::<_, Test>(&sql)
            .bind(root_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tests)
    }

    async fn max_family_version(&self, root_id: Uuid) -> Result<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version) FROM tests WHERE id = $1 OR parent_test_id = $1",
        )
        .bind(root_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max.unwrap_or(0))
    }

    async fn set_status(&self, id: Uuid, from: TestStatus, to: TestStatus) -> Result<Test> {
        let sql = format!(
            r#"
            UPDATE tests SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            TEST_COLUMNS
        );
        sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                Error::Conflict(format!(
                    "Test {} is no longer {}, reload and retry",
                    id,
                    from.as_str()
                ))
            })
    }

    async fn list_tests(
        &self,
        filter: &TestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Test>, i64)> {
        let skill = filter.skill.map(|s| s.as_str());
        let test_type = filter.test_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE ($1::text IS NULL OR skill = $1)
              AND ($2::text IS NULL OR test_type = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR (title ILIKE $4 OR description ILIKE $4))
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tests {}", where_clause))
            .bind(skill)
            .bind(test_type)
            .bind(status)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM tests {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            TEST_COLUMNS, where_clause
        );
        let tests = sqlx::query_as::<_, Test>(&sql)
            .bind(skill)
            .bind(test_type)
            .bind(status)
            .bind(&search)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((tests, total))
    }
}
