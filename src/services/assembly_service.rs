use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::database::bank::QuestionBank;
use crate::database::parts::PartCatalog;
use crate::error::{Result, RuleViolation};
use crate::models::part::Part;
use crate::models::question::AuthoredPart;
use crate::models::snapshot::Snapshot;
use crate::models::test::{TestMeta, TestSkill, TestType};
use crate::models::test_question::{NewTestQuestion, SourceType};
use crate::services::snapshot_service::SnapshotBuilder;

#[derive(Debug, Clone, Default)]
pub struct ExplicitSelection {
    pub question_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct RandomQuota {
    pub part_id: i32,
    pub question_type_id: Option<i32>,
    pub question_count: usize,
    pub group_count: usize,
}

/// Fully validated question set of a test, ready to be written.
#[derive(Debug, Clone, Default)]
pub struct AssembledTest {
    pub questions: Vec<NewTestQuestion>,
    pub total_leaves: usize,
}

impl AssembledTest {
    fn push(&mut self, snapshot: Snapshot, source_type: SourceType) -> Result<()> {
        let (source_question_id, source_group_id) = match &snapshot {
            Snapshot::Single(q) => (q.source_question_id, None),
            Snapshot::Group(g) => (None, g.source_group_id),
        };
        self.total_leaves += snapshot.leaf_count();
        self.questions.push(NewTestQuestion {
            part_id: snapshot.part_id(),
            order_in_test: self.questions.len() as i32 + 1,
            is_group: snapshot.is_group(),
            source_type,
            source_question_id,
            source_group_id,
            snapshot_json: snapshot.encode()?,
        });
        Ok(())
    }
}

/// Builds the frozen question set of a test. Reads the bank and part catalog
/// but never writes; callers persist the result in one transaction.
#[derive(Clone)]
pub struct TestAssembler {
    bank: Arc<dyn QuestionBank>,
    parts: Arc<dyn PartCatalog>,
}

impl TestAssembler {
    pub fn new(bank: Arc<dyn QuestionBank>, parts: Arc<dyn PartCatalog>) -> Self {
        Self { bank, parts }
    }

    /// Resolves every part id and checks it belongs to the test's skill.
    async fn resolve_parts(
        &self,
        skill: TestSkill,
        ids: impl IntoIterator<Item = i32>,
    ) -> Result<HashMap<i32, Part>> {
        let wanted: Vec<i32> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let found: HashMap<i32, Part> = self
            .parts
            .get_parts(&wanted)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        for id in &wanted {
            let part = found.get(id).ok_or(RuleViolation::PartNotFound(*id))?;
            if !part.skill.fits(skill) {
                return Err(RuleViolation::PartSkillMismatch {
                    part_id: part.id,
                    part_name: part.name.clone(),
                    test_skill: skill.label().to_string(),
                }
                .into());
            }
        }
        Ok(found)
    }

    pub async fn explicit(
        &self,
        skill: TestSkill,
        selection: &ExplicitSelection,
    ) -> Result<AssembledTest> {
        let question_ids = dedup(&selection.question_ids);
        let group_ids = dedup(&selection.group_ids);
        if question_ids.is_empty() && group_ids.is_empty() {
            return Err(RuleViolation::NothingSelected.into());
        }

        let mut questions: HashMap<i64, _> = self
            .bank
            .get_questions(&question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let mut groups: HashMap<i64, _> = self
            .bank
            .get_groups(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        let mut singles = Vec::with_capacity(question_ids.len());
        for id in &question_ids {
            singles.push(questions.remove(id).ok_or(RuleViolation::QuestionNotFound(*id))?);
        }
        let mut picked_groups = Vec::with_capacity(group_ids.len());
        for id in &group_ids {
            picked_groups.push(groups.remove(id).ok_or(RuleViolation::GroupNotFound(*id))?);
        }

        let part_ids = singles
            .iter()
            .map(|q| q.part_id)
            .chain(picked_groups.iter().map(|g| g.part_id));
        let parts = self.resolve_parts(skill, part_ids).await?;
        let mut ordered_parts: Vec<&Part> = parts.values().collect();
        ordered_parts.sort_by_key(|p| p.id);

        let mut assembled = AssembledTest::default();
        for part in ordered_parts {
            for q in singles.iter().filter(|q| q.part_id == part.id) {
                let snapshot = SnapshotBuilder::from_bank_question(part, q)?;
                assembled.push(Snapshot::Single(snapshot), SourceType::FromBank)?;
            }
            for g in picked_groups.iter().filter(|g| g.part_id == part.id) {
                let snapshot = SnapshotBuilder::from_bank_group(part, g)?;
                assembled.push(Snapshot::Group(snapshot), SourceType::FromBank)?;
            }
        }
        Ok(assembled)
    }

    pub async fn random(&self, skill: TestSkill, quotas: &[RandomQuota]) -> Result<AssembledTest> {
        if quotas.iter().all(|q| q.question_count == 0 && q.group_count == 0) {
            return Err(RuleViolation::NoQuotas.into());
        }
        let parts = self
            .resolve_parts(skill, quotas.iter().map(|q| q.part_id))
            .await?;

        let mut drawn_questions: Vec<i64> = Vec::new();
        let mut drawn_groups: Vec<i64> = Vec::new();
        let mut assembled = AssembledTest::default();

        for quota in quotas {
            let part = &parts[&quota.part_id];

            if quota.question_count > 0 {
                let sampled = self
                    .bank
                    .random_questions(
                        quota.part_id,
                        quota.question_type_id,
                        quota.question_count,
                        &drawn_questions,
                    )
                    .await?;
                if sampled.len() < quota.question_count {
                    return Err(RuleViolation::InsufficientQuestions {
                        part_id: quota.part_id,
                        requested: quota.question_count,
                        available: sampled.len(),
                    }
                    .into());
                }
                for q in sampled.iter().take(quota.question_count) {
                    drawn_questions.push(q.id);
                    let snapshot = SnapshotBuilder::from_bank_question(part, q)?;
                    assembled.push(Snapshot::Single(snapshot), SourceType::FromBank)?;
                }
            }

            if quota.group_count > 0 {
                let sampled = self
                    .bank
                    .random_groups(
                        quota.part_id,
                        quota.question_type_id,
                        quota.group_count,
                        &drawn_groups,
                    )
                    .await?;
                if sampled.len() < quota.group_count {
                    return Err(RuleViolation::InsufficientGroups {
                        part_id: quota.part_id,
                        requested: quota.group_count,
                        available: sampled.len(),
                    }
                    .into());
                }
                for g in sampled.iter().take(quota.group_count) {
                    drawn_groups.push(g.id);
                    let snapshot = SnapshotBuilder::from_bank_group(part, g)?;
                    assembled.push(Snapshot::Group(snapshot), SourceType::FromBank)?;
                }
            }
        }

        tracing::debug!(
            quotas = quotas.len(),
            slots = assembled.questions.len(),
            leaves = assembled.total_leaves,
            "Sampled random test"
        );
        Ok(assembled)
    }

    /// Hand-written content: parts in the given order, groups before
    /// standalone questions within a part.
    pub async fn manual(&self, meta: &TestMeta, parts: &[AuthoredPart]) -> Result<AssembledTest> {
        let resolved = self
            .resolve_parts(meta.skill, parts.iter().map(|p| p.part_id))
            .await?;

        let mut assembled = AssembledTest::default();
        for authored in parts {
            let part = &resolved[&authored.part_id];
            for group in &authored.groups {
                let snapshot = SnapshotBuilder::from_authored_group(part, group)?;
                assembled.push(Snapshot::Group(snapshot), SourceType::Manual)?;
            }
            for question in &authored.questions {
                let snapshot = SnapshotBuilder::from_authored_question(part, question)?;
                assembled.push(Snapshot::Single(snapshot), SourceType::Manual)?;
            }
        }

        if assembled.questions.is_empty() {
            return Err(RuleViolation::NoQuestions.into());
        }
        check_simulator_total(meta.skill, meta.test_type, assembled.total_leaves)?;
        if meta.skill == TestSkill::ListeningReading && !has_audio(meta) {
            return Err(RuleViolation::MissingTestAudio.into());
        }
        Ok(assembled)
    }
}

fn has_audio(meta: &TestMeta) -> bool {
    meta.audio_url
        .as_deref()
        .map(|u| !u.trim().is_empty())
        .unwrap_or(false)
}

/// Simulator tests must match the full exam structure of their skill.
pub fn check_simulator_total(
    skill: TestSkill,
    test_type: TestType,
    actual: usize,
) -> std::result::Result<(), RuleViolation> {
    let expected = skill.full_test_total();
    if test_type == TestType::Simulator && actual != expected {
        return Err(RuleViolation::WrongTotal {
            skill: skill.label().to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
