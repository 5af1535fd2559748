use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::parts::PartCatalog;
use crate::database::test_store::TestStore;
use crate::dto::paper_dto::{PaperContent, PaperSlot, TestPaperResponse};
use crate::dto::test_dto::{
    FromBankRequest, ManualGroupRequest, ManualQuestionRequest, ManualTestRequest, MediaRef,
    PaginatedTests, PartSection, RandomFromBankRequest, TestDetailResponse, TestMetaRequest,
    TestQuestionView,
};
use crate::dto::{page_offset, total_pages};
use crate::error::{Error, Result, RuleViolation};
use crate::models::question::{AuthoredGroup, AuthoredPart, AuthoredQuestion};
use crate::models::test::{NewTest, Test, TestFilter, TestMeta, TestStatus};
use crate::models::test_question::TestQuestion;
use crate::services::assembly_service::{check_simulator_total, AssembledTest, TestAssembler};
use crate::services::media_service::{MediaKind, MediaStore, UploadSession, UploadedFile};
use crate::services::version_service::{check_edit_status, TestEdit, VersionManager};

#[derive(Clone)]
pub struct TestService {
    store: Arc<dyn TestStore>,
    parts: Arc<dyn PartCatalog>,
    media: Arc<dyn MediaStore>,
    assembler: TestAssembler,
    versions: VersionManager,
}

impl TestService {
    pub fn new(
        store: Arc<dyn TestStore>,
        assembler: TestAssembler,
        parts: Arc<dyn PartCatalog>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            versions: VersionManager::new(store.clone()),
            store,
            parts,
            media,
            assembler,
        }
    }

    async fn insert_new(&self, meta: TestMeta, assembled: AssembledTest) -> Result<Test> {
        let test = self
            .store
            .insert_test(
                NewTest {
                    meta,
                    total_questions: assembled.total_leaves as i32,
                    status: TestStatus::Draft,
                    version: 1,
                    parent_test_id: None,
                },
                assembled.questions,
            )
            .await?;
        tracing::info!(
            test_id = %test.id,
            skill = test.skill.as_str(),
            total_questions = test.total_questions,
            "Test created"
        );
        Ok(test)
    }

    pub async fn create_from_bank(&self, payload: FromBankRequest) -> Result<Test> {
        let meta = meta_from_request(&payload.meta, payload.audio_url.clone());
        let assembled = self
            .assembler
            .explicit(meta.skill, &payload.selection())
            .await?;
        self.insert_new(meta, assembled).await
    }

    pub async fn create_from_bank_random(&self, payload: RandomFromBankRequest) -> Result<Test> {
        let meta = meta_from_request(&payload.meta, payload.audio_url.clone());
        let assembled = self.assembler.random(meta.skill, &payload.quotas()).await?;
        self.insert_new(meta, assembled).await
    }

    pub async fn create_manual(
        &self,
        payload: ManualTestRequest,
        files: HashMap<String, UploadedFile>,
    ) -> Result<Test> {
        let mut session = UploadSession::new(self.media.clone());
        let outcome = async {
            let (meta, parts) = resolve_manual(&payload, files, &mut session).await?;
            let assembled = self.assembler.manual(&meta, &parts).await?;
            self.insert_new(meta, assembled).await
        }
        .await;

        if outcome.is_err() {
            session.compensate().await;
        }
        outcome
    }

    pub async fn update_from_bank(&self, id: Uuid, payload: FromBankRequest) -> Result<Test> {
        check_edit_status(payload.meta.status)?;
        let source = self.get_test(id).await?;
        let meta = meta_from_request(&payload.meta, payload.audio_url.clone());
        let assembled = self
            .assembler
            .explicit(meta.skill, &payload.selection())
            .await?;
        self.versions
            .apply_edit(
                &source,
                TestEdit {
                    meta,
                    questions: Some(assembled),
                },
            )
            .await
    }

    pub async fn update_manual(
        &self,
        id: Uuid,
        payload: ManualTestRequest,
        files: HashMap<String, UploadedFile>,
    ) -> Result<Test> {
        check_edit_status(payload.meta.status)?;
        let source = self.get_test(id).await?;

        let mut session = UploadSession::new(self.media.clone());
        let outcome = async {
            let (meta, parts) = resolve_manual(&payload, files, &mut session).await?;
            let assembled = self.assembler.manual(&meta, &parts).await?;
            self.versions
                .apply_edit(
                    &source,
                    TestEdit {
                        meta,
                        questions: Some(assembled),
                    },
                )
                .await
        }
        .await;

        if outcome.is_err() {
            session.compensate().await;
        }
        outcome
    }

    pub async fn clone_test(&self, id: Uuid) -> Result<Test> {
        let source = self.get_test(id).await?;
        self.versions.clone_test(&source).await
    }

    pub async fn versions(&self, id: Uuid) -> Result<Vec<Test>> {
        self.versions.versions(id).await
    }

    /// Publish (draft or inactive to active) or hide (active to inactive).
    pub async fn change_status(&self, id: Uuid, to: TestStatus) -> Result<Test> {
        let test = self.get_test(id).await?;
        if test.status == to {
            return Ok(test);
        }
        check_transition(test.status, to)?;

        if test.status == TestStatus::Draft {
            if test.total_questions <= 0 {
                return Err(RuleViolation::NoQuestions.into());
            }
            check_simulator_total(test.skill, test.test_type, test.total_questions as usize)?;
        }

        let updated = self.store.set_status(id, test.status, to).await?;
        tracing::info!(
            test_id = %id,
            from = test.status.as_str(),
            to = to.as_str(),
            "Test status changed"
        );
        Ok(updated)
    }

    pub async fn get_test(&self, id: Uuid) -> Result<Test> {
        self.store
            .find_test(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", id)))
    }

    /// Metadata plus decoded snapshots grouped by part in test order.
    pub async fn get_detail(&self, id: Uuid) -> Result<TestDetailResponse> {
        let test = self.get_test(id).await?;
        let questions = self.store.list_questions(id).await?;
        let names = self.part_names(&questions).await?;

        let views = questions.into_iter().map(|question| {
            let (snapshot, snapshot_error) = match question.snapshot() {
                Ok(s) => (Some(s), false),
                Err(e) => {
                    tracing::error!(
                        test_question_id = question.id,
                        error = %e,
                        "Stored snapshot could not be decoded"
                    );
                    (None, true)
                }
            };
            let view = TestQuestionView {
                id: question.id,
                order_in_test: question.order_in_test,
                is_group: question.is_group,
                source_type: question.source_type,
                source_question_id: question.source_question_id,
                source_group_id: question.source_group_id,
                snapshot,
                snapshot_error,
            };
            (question.part_id, view)
        });

        Ok(TestDetailResponse {
            family_id: test.family_root(),
            test,
            parts: sections_by_part(views, &names),
        })
    }

    /// Published test as a test taker sees it: no correct flags, no
    /// explanations. Slots whose snapshot cannot be decoded are left out.
    pub async fn get_paper(&self, id: Uuid) -> Result<TestPaperResponse> {
        let test = self.get_test(id).await?;
        if test.status != TestStatus::Active {
            return Err(RuleViolation::TestNotPublished.into());
        }
        let questions = self.store.list_questions(id).await?;
        let names = self.part_names(&questions).await?;

        let slots = questions
            .into_iter()
            .filter_map(|question| match question.snapshot() {
                Ok(snapshot) => Some((
                    question.part_id,
                    PaperSlot {
                        id: question.id,
                        order_in_test: question.order_in_test,
                        is_group: question.is_group,
                        content: PaperContent::from(&snapshot),
                    },
                )),
                Err(e) => {
                    tracing::error!(
                        test_question_id = question.id,
                        error = %e,
                        "Skipping undecodable snapshot on test paper"
                    );
                    None
                }
            });

        Ok(TestPaperResponse::new(test, sections_by_part(slots, &names)))
    }

    async fn part_names(&self, questions: &[TestQuestion]) -> Result<HashMap<i32, String>> {
        let mut part_ids: Vec<i32> = questions.iter().map(|q| q.part_id).collect();
        part_ids.sort_unstable();
        part_ids.dedup();
        Ok(self
            .parts
            .get_parts(&part_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }

    pub async fn list_tests(
        &self,
        page: i64,
        per_page: i64,
        filter: TestFilter,
    ) -> Result<PaginatedTests> {
        let offset = page_offset(page, per_page)?;
        let (tests, total) = self.store.list_tests(&filter, per_page, offset).await?;
        Ok(PaginatedTests {
            tests,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        })
    }
}

/// Consecutive items of the same part share one section.
fn sections_by_part<Q>(
    items: impl IntoIterator<Item = (i32, Q)>,
    names: &HashMap<i32, String>,
) -> Vec<PartSection<Q>> {
    let mut sections: Vec<PartSection<Q>> = Vec::new();
    for (part_id, item) in items {
        if let Some(section) = sections.last_mut().filter(|s| s.part_id == part_id) {
            section.questions.push(item);
            continue;
        }
        sections.push(PartSection {
            part_id,
            part_name: names.get(&part_id).cloned(),
            questions: vec![item],
        });
    }
    sections
}

fn meta_from_request(meta: &TestMetaRequest, audio_url: Option<String>) -> TestMeta {
    TestMeta {
        title: meta.title.trim().to_string(),
        description: meta.description.clone(),
        skill: meta.skill,
        test_type: meta.test_type,
        duration_minutes: meta.duration_minutes,
        audio_url: audio_url.filter(|u| !u.trim().is_empty()),
    }
}

fn check_transition(from: TestStatus, to: TestStatus) -> std::result::Result<(), RuleViolation> {
    use TestStatus::*;
    match (from, to) {
        (Draft, Active) | (Active, Inactive) | (Inactive, Active) => Ok(()),
        _ => Err(RuleViolation::StatusTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }),
    }
}

/// Turns media references into URLs, uploading each referenced file once.
struct MediaResolver<'a> {
    session: &'a mut UploadSession,
    files: HashMap<String, UploadedFile>,
    stored: HashMap<String, String>,
}

impl MediaResolver<'_> {
    async fn resolve(&mut self, media: &Option<MediaRef>, kind: MediaKind) -> Result<Option<String>> {
        match media {
            None => Ok(None),
            Some(MediaRef::Url { url }) => {
                Ok(Some(url.trim().to_string()).filter(|u| !u.is_empty()))
            }
            Some(MediaRef::Upload { upload }) => {
                if let Some(url) = self.stored.get(upload) {
                    return Ok(Some(url.clone()));
                }
                let file = self
                    .files
                    .remove(upload)
                    .ok_or_else(|| RuleViolation::MissingUpload(upload.clone()))?;
                let url = self.session.upload(file, kind).await?;
                self.stored.insert(upload.clone(), url.clone());
                Ok(Some(url))
            }
        }
    }

    async fn question(&mut self, q: &ManualQuestionRequest) -> Result<AuthoredQuestion> {
        Ok(AuthoredQuestion {
            content: q.content.clone(),
            audio_url: self.resolve(&q.audio, MediaKind::Audio).await?,
            image_url: self.resolve(&q.image, MediaKind::Image).await?,
            explanation: q.explanation.clone(),
            options: q.options.iter().map(Into::into).collect(),
        })
    }

    async fn group(&mut self, g: &ManualGroupRequest) -> Result<AuthoredGroup> {
        let mut questions = Vec::with_capacity(g.questions.len());
        for q in &g.questions {
            questions.push(self.question(q).await?);
        }
        Ok(AuthoredGroup {
            passage: g.passage.clone(),
            audio_url: self.resolve(&g.audio, MediaKind::Audio).await?,
            image_url: self.resolve(&g.image, MediaKind::Image).await?,
            questions,
        })
    }
}

async fn resolve_manual(
    payload: &ManualTestRequest,
    files: HashMap<String, UploadedFile>,
    session: &mut UploadSession,
) -> Result<(TestMeta, Vec<AuthoredPart>)> {
    let mut resolver = MediaResolver {
        session,
        files,
        stored: HashMap::new(),
    };
    let audio_url = resolver.resolve(&payload.audio, MediaKind::Audio).await?;
    let meta = meta_from_request(&payload.meta, audio_url);

    let mut parts = Vec::with_capacity(payload.parts.len());
    for part in &payload.parts {
        let mut authored = AuthoredPart {
            part_id: part.part_id,
            ..Default::default()
        };
        for g in &part.groups {
            authored.groups.push(resolver.group(g).await?);
        }
        for q in &part.questions {
            authored.questions.push(resolver.question(q).await?);
        }
        parts.push(authored);
    }
    Ok((meta, parts))
}
