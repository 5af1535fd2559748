use std::sync::Arc;

use uuid::Uuid;

use crate::database::test_store::TestStore;
use crate::error::{Error, Result, RuleViolation};
use crate::models::test::{NewTest, Test, TestMeta, TestStatus};
use crate::services::assembly_service::AssembledTest;

/// Changes requested by an update call.
#[derive(Debug, Clone)]
pub struct TestEdit {
    pub meta: TestMeta,
    /// `None` keeps the current question set.
    pub questions: Option<AssembledTest>,
}

/// Rejects edits that try to publish. Publishing goes through the status
/// transition only.
pub fn check_edit_status(requested: Option<TestStatus>) -> std::result::Result<(), RuleViolation> {
    match requested {
        Some(TestStatus::Active) => Err(RuleViolation::PublishThroughEdit),
        _ => Ok(()),
    }
}

/// Copy-on-write versioning. A draft is edited in place; anything that was
/// ever published stays frozen and edits land on a new draft version in the
/// same family.
#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn TestStore>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn TestStore>) -> Self {
        Self { store }
    }

    pub async fn apply_edit(&self, source: &Test, edit: TestEdit) -> Result<Test> {
        if !source.status.is_editable_in_place() {
            return self.fork(source, Some(edit)).await;
        }

        let questions = match edit.questions {
            Some(assembled) => assembled,
            None => self.copy_questions(source).await?,
        };
        let updated = self
            .store
            .replace_draft(
                source.id,
                edit.meta,
                questions.total_leaves as i32,
                questions.questions,
            )
            .await?;
        tracing::info!(test_id = %updated.id, version = updated.version, "Draft updated in place");
        Ok(updated)
    }

    /// Explicit copy of a published test into a new draft version.
    pub async fn clone_test(&self, source: &Test) -> Result<Test> {
        if source.status == TestStatus::Draft {
            return Err(RuleViolation::CloneOfDraft.into());
        }
        self.fork(source, None).await
    }

    pub async fn fork(&self, source: &Test, edit: Option<TestEdit>) -> Result<Test> {
        let root = source.family_root();
        let version = self.store.max_family_version(root).await?.max(source.version) + 1;

        let (meta, questions) = match edit {
            Some(TestEdit {
                meta,
                questions: Some(assembled),
            }) => (meta, assembled),
            Some(TestEdit {
                meta,
                questions: None,
            }) => (meta, self.copy_questions(source).await?),
            None => (source.meta(), self.copy_questions(source).await?),
        };

        let forked = self
            .store
            .insert_test(
                NewTest {
                    meta,
                    total_questions: questions.total_leaves as i32,
                    status: TestStatus::Draft,
                    version,
                    parent_test_id: Some(root),
                },
                questions.questions,
            )
            .await?;

        tracing::info!(
            source_id = %source.id,
            test_id = %forked.id,
            family = %root,
            version,
            "Forked new test version"
        );
        Ok(forked)
    }

    /// The whole family of the given test, newest version first.
    pub async fn versions(&self, id: Uuid) -> Result<Vec<Test>> {
        let test = self
            .store
            .find_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))?;
        self.store.list_family(test.family_root()).await
    }

    /// Source slots carried over verbatim, snapshot text included.
    async fn copy_questions(&self, source: &Test) -> Result<AssembledTest> {
        let existing = self.store.list_questions(source.id).await?;
        Ok(AssembledTest {
            questions: existing.iter().map(|q| q.to_new()).collect(),
            total_leaves: source.total_questions.max(0) as usize,
        })
    }
}
