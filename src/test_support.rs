//! In-memory stand-ins for the storage traits plus fixture builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::database::bank::QuestionBank;
use crate::database::parts::PartCatalog;
use crate::database::result_store::ResultStore;
use crate::database::test_store::TestStore;
use crate::error::{Error, Result};
use crate::models::part::{Part, Skill};
use crate::models::question::{AuthoredQuestion, BankOption, BankQuestion, BankQuestionGroup};
use crate::models::snapshot::{OptionSnapshot, QuestionGroupSnapshot, QuestionSnapshot, Snapshot};
use crate::models::test::{NewTest, Test, TestFilter, TestMeta, TestSkill, TestStatus, TestType};
use crate::models::test_question::{NewTestQuestion, SourceType, TestQuestion};
use crate::models::test_result::{NewTestResult, NewUserAnswer, TestResult, UserAnswer};
use crate::services::assembly_service::AssembledTest;
use crate::services::media_service::{MediaKind, MediaStore, UploadedFile};
use crate::services::score_service::ScoreTable;

const LABELS: [&str; 4] = ["A", "B", "C", "D"];

pub fn part(id: i32) -> Part {
    let (skill, number) = match id {
        1..=4 => (Skill::Listening, id),
        5..=7 => (Skill::Reading, id),
        8..=10 => (Skill::Writing, id - 7),
        _ => (Skill::Speaking, id - 10),
    };
    Part {
        id,
        number,
        skill,
        name: format!("{} part {}", skill.as_str(), number),
    }
}

pub fn lr_skill_map() -> HashMap<i32, Skill> {
    (1..=15).map(|id| (id, part(id).skill)).collect()
}

pub fn meta(skill: TestSkill, test_type: TestType) -> TestMeta {
    TestMeta {
        title: "Fixture test".into(),
        description: None,
        skill,
        test_type,
        duration_minutes: 120,
        audio_url: None,
    }
}

/// Options labelled A.. with A correct.
fn options(count: usize) -> Vec<OptionSnapshot> {
    LABELS
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, label)| OptionSnapshot {
            label: label.to_string(),
            content: format!("choice {}", label),
            is_correct: i == 0,
        })
        .collect()
}

pub fn bank_question(id: i64, part_id: i32, option_count: usize) -> BankQuestion {
    BankQuestion {
        id,
        part_id,
        question_type_id: None,
        group_id: None,
        content: format!("bank question {}", id),
        audio_url: None,
        image_url: Some(format!("/uploads/images/{}.png", id)),
        explanation: None,
        options: options(option_count)
            .into_iter()
            .enumerate()
            .map(|(i, o)| BankOption {
                id: id * 10 + i as i64,
                question_id: id,
                label: o.label,
                content: o.content,
                is_correct: o.is_correct,
                position: i as i32,
            })
            .collect(),
    }
}

pub fn bank_group(id: i64, part_id: i32, size: usize, first_question_id: i64) -> BankQuestionGroup {
    BankQuestionGroup {
        id,
        part_id,
        passage: format!("passage {}", id),
        audio_url: None,
        image_url: None,
        questions: (0..size as i64)
            .map(|i| {
                let mut q = bank_question(first_question_id + i, part_id, 4);
                q.group_id = Some(id);
                q
            })
            .collect(),
    }
}

pub fn authored_question(option_count: usize) -> AuthoredQuestion {
    AuthoredQuestion {
        content: "authored".into(),
        options: options(option_count),
        ..Default::default()
    }
}

fn question_snapshot(part_id: i32, option_count: usize) -> QuestionSnapshot {
    QuestionSnapshot {
        source_question_id: None,
        part_id,
        content: format!("part {} question", part_id),
        audio_url: None,
        image_url: (part_id == 1).then(|| "/uploads/images/photo.png".to_string()),
        explanation: None,
        options: options(option_count),
    }
}

pub fn stored_single(part_id: i32, option_count: usize) -> Snapshot {
    Snapshot::Single(question_snapshot(part_id, option_count))
}

pub fn stored_group(part_id: i32, size: usize) -> Snapshot {
    Snapshot::Group(QuestionGroupSnapshot {
        source_group_id: None,
        part_id,
        passage: format!("part {} passage", part_id),
        audio_url: None,
        image_url: None,
        questions: (0..size).map(|_| question_snapshot(part_id, 4)).collect(),
    })
}

pub fn slot(id: i64, order: i32, snapshot: Snapshot) -> TestQuestion {
    TestQuestion {
        id,
        test_id: Uuid::nil(),
        part_id: snapshot.part_id(),
        order_in_test: order,
        is_group: snapshot.is_group(),
        source_type: SourceType::Manual,
        source_question_id: None,
        source_group_id: None,
        snapshot_json: snapshot.encode().unwrap(),
        created_at: Utc::now(),
    }
}

pub fn assembled_from(snapshots: Vec<Snapshot>) -> AssembledTest {
    let mut assembled = AssembledTest::default();
    for (i, snapshot) in snapshots.into_iter().enumerate() {
        assembled.total_leaves += snapshot.leaf_count();
        assembled.questions.push(NewTestQuestion {
            part_id: snapshot.part_id(),
            order_in_test: i as i32 + 1,
            is_group: snapshot.is_group(),
            source_type: SourceType::Manual,
            source_question_id: None,
            source_group_id: None,
            snapshot_json: snapshot.encode().unwrap(),
        });
    }
    assembled
}

/// Listening & Reading practice test with `singles` reading questions.
pub async fn seed_test(store: &FakeTestStore, status: TestStatus, singles: usize) -> Test {
    let snapshots = (0..singles).map(|_| stored_single(5, 4)).collect();
    store.insert_assembled(assembled_from(snapshots), status).await
}

/// Active full-length simulator: 100 listening and 100 reading leaves.
pub async fn full_lr_simulator(store: &FakeTestStore) -> Test {
    let mut snapshots = Vec::new();
    snapshots.extend((0..6).map(|_| stored_single(1, 4)));
    snapshots.extend((0..25).map(|_| stored_single(2, 3)));
    snapshots.extend((0..13).map(|_| stored_group(3, 3)));
    snapshots.extend((0..10).map(|_| stored_group(4, 3)));
    snapshots.extend((0..30).map(|_| stored_single(5, 4)));
    snapshots.extend((0..4).map(|_| stored_group(6, 4)));
    snapshots.extend((0..10).map(|_| stored_group(7, 2)));
    snapshots.extend((0..6).map(|_| stored_group(7, 3)));
    snapshots.extend((0..4).map(|_| stored_group(7, 4)));

    let test = store
        .insert_assembled(assembled_from(snapshots), TestStatus::Active)
        .await;
    store.set_type(test.id, TestType::Simulator);
    store.get(test.id)
}

#[derive(Clone)]
pub struct FakeParts {
    parts: Vec<Part>,
}

impl FakeParts {
    pub fn standard() -> Self {
        Self {
            parts: (1..=15).map(part).collect(),
        }
    }
}

#[async_trait]
impl PartCatalog for FakeParts {
    async fn get_parts(&self, ids: &[i32]) -> Result<Vec<Part>> {
        Ok(self
            .parts
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct BankData {
    questions: Vec<BankQuestion>,
    groups: Vec<BankQuestionGroup>,
}

/// Shared in-memory bank; clones see the same rows.
#[derive(Clone, Default)]
pub struct FakeBank {
    inner: Arc<Mutex<BankData>>,
}

impl FakeBank {
    pub fn with_question(self, question: BankQuestion) -> Self {
        self.inner.lock().unwrap().questions.push(question);
        self
    }

    pub fn with_group(self, group: BankQuestionGroup) -> Self {
        self.inner.lock().unwrap().groups.push(group);
        self
    }

    pub fn edit_question(&self, id: i64, edit: impl FnOnce(&mut BankQuestion)) {
        let mut data = self.inner.lock().unwrap();
        if let Some(q) = data.questions.iter_mut().find(|q| q.id == id) {
            edit(q);
        }
    }

    pub fn remove_question(&self, id: i64) {
        self.inner.lock().unwrap().questions.retain(|q| q.id != id);
    }
}

fn sample<T: Clone>(candidates: Vec<&T>, count: usize) -> Vec<T> {
    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count)
        .map(|item| (*item).clone())
        .collect()
}

#[async_trait]
impl QuestionBank for FakeBank {
    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<BankQuestion>> {
        let data = self.inner.lock().unwrap();
        Ok(data
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn random_questions(
        &self,
        part_id: i32,
        question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestion>> {
        let data = self.inner.lock().unwrap();
        let candidates = data
            .questions
            .iter()
            .filter(|q| q.part_id == part_id && !exclude.contains(&q.id))
            .filter(|q| question_type_id.is_none() || q.question_type_id == question_type_id)
            .collect();
        Ok(sample(candidates, count))
    }

    async fn get_groups(&self, ids: &[i64]) -> Result<Vec<BankQuestionGroup>> {
        let data = self.inner.lock().unwrap();
        Ok(data
            .groups
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn random_groups(
        &self,
        part_id: i32,
        _question_type_id: Option<i32>,
        count: usize,
        exclude: &[i64],
    ) -> Result<Vec<BankQuestionGroup>> {
        let data = self.inner.lock().unwrap();
        let candidates = data
            .groups
            .iter()
            .filter(|g| g.part_id == part_id && !exclude.contains(&g.id))
            .collect();
        Ok(sample(candidates, count))
    }
}

#[derive(Default)]
struct StoreData {
    tests: Vec<Test>,
    questions: Vec<TestQuestion>,
    next_question_id: i64,
}

impl StoreData {
    fn attach(&mut self, test_id: Uuid, questions: Vec<NewTestQuestion>) {
        for q in questions {
            self.next_question_id += 1;
            self.questions.push(TestQuestion {
                id: self.next_question_id,
                test_id,
                part_id: q.part_id,
                order_in_test: q.order_in_test,
                is_group: q.is_group,
                source_type: q.source_type,
                source_question_id: q.source_question_id,
                source_group_id: q.source_group_id,
                snapshot_json: q.snapshot_json,
                created_at: Utc::now(),
            });
        }
    }

    fn test_mut(&mut self, id: Uuid) -> &mut Test {
        self.tests
            .iter_mut()
            .find(|t| t.id == id)
            .expect("fixture test exists")
    }
}

#[derive(Default)]
pub struct FakeTestStore {
    inner: Mutex<StoreData>,
}

impl FakeTestStore {
    pub fn test_count(&self) -> usize {
        self.inner.lock().unwrap().tests.len()
    }

    pub fn get(&self, id: Uuid) -> Test {
        self.inner.lock().unwrap().test_mut(id).clone()
    }

    /// Status change that bypasses transition rules, as another writer would.
    pub fn force_status(&self, id: Uuid, status: TestStatus) {
        self.inner.lock().unwrap().test_mut(id).status = status;
    }

    pub fn set_type(&self, id: Uuid, test_type: TestType) {
        self.inner.lock().unwrap().test_mut(id).test_type = test_type;
    }

    pub fn set_skill(&self, id: Uuid, skill: TestSkill) {
        self.inner.lock().unwrap().test_mut(id).skill = skill;
    }

    pub async fn insert_assembled(&self, assembled: AssembledTest, status: TestStatus) -> Test {
        let test = self
            .insert_test(
                NewTest {
                    meta: meta(TestSkill::ListeningReading, TestType::Practice),
                    total_questions: assembled.total_leaves as i32,
                    status: TestStatus::Draft,
                    version: 1,
                    parent_test_id: None,
                },
                assembled.questions,
            )
            .await
            .unwrap();
        self.force_status(test.id, status);
        self.get(test.id)
    }
}

#[async_trait]
impl TestStore for FakeTestStore {
    async fn insert_test(&self, test: NewTest, questions: Vec<NewTestQuestion>) -> Result<Test> {
        let mut data = self.inner.lock().unwrap();
        let root = test.parent_test_id;
        let clash = data.tests.iter().any(|t| {
            t.version == test.version
                && root.map(|r| t.family_root() == r).unwrap_or(false)
        });
        if clash {
            return Err(Error::Conflict("duplicate family version".into()));
        }
        let created = Test {
            id: Uuid::new_v4(),
            title: test.meta.title,
            description: test.meta.description,
            skill: test.meta.skill,
            test_type: test.meta.test_type,
            duration_minutes: test.meta.duration_minutes,
            total_questions: test.total_questions,
            audio_url: test.meta.audio_url,
            status: test.status,
            version: test.version,
            parent_test_id: test.parent_test_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        data.tests.push(created.clone());
        data.attach(created.id, questions);
        Ok(created)
    }

    async fn replace_draft(
        &self,
        id: Uuid,
        meta: TestMeta,
        total_questions: i32,
        questions: Vec<NewTestQuestion>,
    ) -> Result<Test> {
        let mut data = self.inner.lock().unwrap();
        let test = data
            .tests
            .iter_mut()
            .find(|t| t.id == id && t.status == TestStatus::Draft)
            .ok_or_else(|| Error::Conflict(format!("Test {} is no longer a draft", id)))?;
        test.title = meta.title;
        test.description = meta.description;
        test.skill = meta.skill;
        test.test_type = meta.test_type;
        test.duration_minutes = meta.duration_minutes;
        test.audio_url = meta.audio_url;
        test.total_questions = total_questions;
        test.updated_at = Some(Utc::now());
        let updated = test.clone();
        data.questions.retain(|q| q.test_id != id);
        data.attach(id, questions);
        Ok(updated)
    }

    async fn find_test(&self, id: Uuid) -> Result<Option<Test>> {
        let data = self.inner.lock().unwrap();
        Ok(data.tests.iter().find(|t| t.id == id).cloned())
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<TestQuestion>> {
        let data = self.inner.lock().unwrap();
        let mut questions: Vec<TestQuestion> = data
            .questions
            .iter()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order_in_test);
        Ok(questions)
    }

    async fn list_family(&self, root_id: Uuid) -> Result<Vec<Test>> {
        let data = self.inner.lock().unwrap();
        let mut family: Vec<Test> = data
            .tests
            .iter()
            .filter(|t| t.family_root() == root_id)
            .cloned()
            .collect();
        family.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(family)
    }

    async fn max_family_version(&self, root_id: Uuid) -> Result<i32> {
        let data = self.inner.lock().unwrap();
        Ok(data
            .tests
            .iter()
            .filter(|t| t.family_root() == root_id)
            .map(|t| t.version)
            .max()
            .unwrap_or(0))
    }

    async fn set_status(&self, id: Uuid, from: TestStatus, to: TestStatus) -> Result<Test> {
        let mut data = self.inner.lock().unwrap();
        let test = data
            .tests
            .iter_mut()
            .find(|t| t.id == id && t.status == from)
            .ok_or_else(|| Error::Conflict(format!("Test {} is no longer {}", id, from.as_str())))?;
        test.status = to;
        Ok(test.clone())
    }

    async fn list_tests(
        &self,
        filter: &TestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Test>, i64)> {
        let data = self.inner.lock().unwrap();
        let matching: Vec<Test> = data
            .tests
            .iter()
            .filter(|t| filter.skill.map(|s| s == t.skill).unwrap_or(true))
            .filter(|t| filter.test_type.map(|s| s == t.test_type).unwrap_or(true))
            .filter(|t| filter.status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| {
                filter
                    .search
                    .as_ref()
                    .map(|s| t.title.to_lowercase().contains(&s.to_lowercase()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct FakeResultStore {
    inner: Mutex<Vec<(TestResult, Vec<NewUserAnswer>)>>,
}

impl FakeResultStore {
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn stored(&self, id: Uuid) -> Option<(TestResult, Vec<NewUserAnswer>)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r.id == id)
            .cloned()
    }
}

#[async_trait]
impl ResultStore for FakeResultStore {
    async fn insert_result(
        &self,
        result: NewTestResult,
        answers: Vec<NewUserAnswer>,
    ) -> Result<TestResult> {
        let stored = TestResult {
            id: Uuid::new_v4(),
            test_id: result.test_id,
            user_id: result.user_id,
            test_type: result.test_type,
            duration_seconds: result.duration_seconds,
            total_questions: result.total_questions,
            correct_count: result.correct_count,
            incorrect_count: result.incorrect_count,
            skip_count: result.skip_count,
            ungraded_count: result.ungraded_count,
            listening_correct: result.listening_correct,
            listening_total: result.listening_total,
            reading_correct: result.reading_correct,
            reading_total: result.reading_total,
            listening_score: result.listening_score,
            reading_score: result.reading_score,
            total_score: result.total_score,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().push((stored.clone(), answers));
        Ok(stored)
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<TestResult>> {
        Ok(self.stored(id).map(|(r, _)| r))
    }

    async fn list_answers(&self, result_id: Uuid) -> Result<Vec<UserAnswer>> {
        Ok(self
            .stored(result_id)
            .map(|(_, answers)| {
                answers
                    .into_iter()
                    .enumerate()
                    .map(|(i, a)| UserAnswer {
                        id: i as i64 + 1,
                        result_id,
                        test_question_id: a.test_question_id,
                        sub_question_index: a.sub_question_index,
                        chosen_label: a.chosen_label,
                        is_correct: a.is_correct,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestResult>, i64)> {
        let stored = self.inner.lock().unwrap();
        // insertion order stands in for created_at
        let mine: Vec<TestResult> = stored
            .iter()
            .rev()
            .filter(|(r, _)| r.user_id == user_id)
            .map(|(r, _)| r.clone())
            .collect();
        let total = mine.len() as i64;
        let page = mine
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

/// Media store that keeps URLs in memory and remembers deletions.
#[derive(Default)]
pub struct RecordingMediaStore {
    uploads: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingMediaStore {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn upload(&self, file: UploadedFile, kind: MediaKind) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        let url = format!("/uploads/{}/{}-{}", kind.as_str(), uploads.len(), file.file_name);
        uploads.push(url.clone());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Score table that maps every raw count to the same value.
pub struct FixedScoreTable(pub i32);

impl ScoreTable for FixedScoreTable {
    fn listening(&self, _correct: usize) -> i32 {
        self.0
    }

    fn reading(&self, _correct: usize) -> i32 {
        self.0
    }
}
