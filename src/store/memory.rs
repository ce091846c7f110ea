//! In-memory [`LearnStore`] used by tests and the offline demo
//!
//! Backs the trait with plain tables behind a mutex, records every write in
//! an inspectable log (tests assert "quit persists nothing" and "a failed
//! attempt never touches progress" against it), and can be told to fail a
//! named operation to exercise partial-commit reporting.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::LearnStore;
use super::error::StoreError;
use super::models::{
    LearnerProgressUpdate, ModuleRef, NewAnswer, NewAttempt, ProgressStatus, QuestionRow,
    QuizMetadata, SectionRef,
};
use crate::quiz::model::QuestionKind;

/// Quiz id served by [`MemoryStore::sample`]
pub const SAMPLE_QUIZ_ID: &str = "cash-flow-basics";

/// One write issued against the store, in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// `record_attempt`
    Attempt {
        /// Quiz attempted
        quiz_id: String,
        /// Learner
        user_id: String,
        /// Score 0-100
        score: u8,
        /// Pass/fail
        passed: bool,
        /// XP on the attempt row
        xp_earned: u32,
    },
    /// `record_answers`
    Answers {
        /// Attempt the answers reference
        attempt_id: String,
        /// Number of answer rows
        count: usize,
    },
    /// `increment_user_xp`
    XpIncrement {
        /// Learner
        user_id: String,
        /// XP added
        delta: u32,
    },
    /// `upsert_module_progress`
    ModuleProgress {
        /// Learner
        user_id: String,
        /// Module
        module_id: String,
        /// New status
        status: ProgressStatus,
    },
    /// `upsert_section_progress`
    SectionProgress {
        /// Learner
        user_id: String,
        /// Section
        section_id: String,
        /// New status
        status: ProgressStatus,
    },
    /// `upsert_learner_progress`
    LearnerProgress {
        /// Learner
        user_id: String,
        /// New position
        update: LearnerProgressUpdate,
    },
}

#[derive(Default)]
struct Inner {
    quizzes: HashMap<String, QuizMetadata>,
    question_ids: HashMap<String, HashMap<QuestionKind, Vec<String>>>,
    question_rows: HashMap<QuestionKind, HashMap<String, QuestionRow>>,
    modules: HashMap<String, Vec<ModuleRef>>,
    sections: Vec<SectionRef>,
    user_xp: HashMap<String, u32>,
    attempt_ids_by_token: HashMap<String, String>,
    writes: Vec<StoreWrite>,
    fail_ops: HashSet<&'static str>,
}

/// In-memory backend fake
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the bundled real-estate sample curriculum:
    /// two sections, three modules, and the cash-flow quiz under the last
    /// module of section one.
    pub fn sample() -> Self {
        let store = Self::new();
        store.add_section(SectionRef { id: "s-fundamentos".into(), level: 1 });
        store.add_section(SectionRef { id: "s-financiacion".into(), level: 2 });
        store.add_module("s-fundamentos", ModuleRef { id: "m-intro".into(), sequence_number: 1 });
        store.add_module(
            "s-fundamentos",
            ModuleRef { id: "m-cash-flow".into(), sequence_number: 2 },
        );
        store.add_module(
            "s-financiacion",
            ModuleRef { id: "m-hipotecas".into(), sequence_number: 1 },
        );
        store.add_quiz(QuizMetadata {
            id: SAMPLE_QUIZ_ID.into(),
            title: "El flujo de caja".into(),
            xp_reward: 250,
            passing_threshold: Some(70),
            module_id: "m-cash-flow".into(),
            section_id: "s-fundamentos".into(),
        });

        for (kind, row) in sample_questions() {
            store.add_question(SAMPLE_QUIZ_ID, kind, row);
        }
        store
    }

    /// Register a quiz
    pub fn add_quiz(&self, metadata: QuizMetadata) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.quizzes.insert(metadata.id.clone(), metadata);
    }

    /// Register a question row under a quiz
    pub fn add_question(&self, quiz_id: &str, kind: QuestionKind, row: QuestionRow) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .question_ids
            .entry(quiz_id.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .push(row.id.clone());
        inner.question_rows.entry(kind).or_default().insert(row.id.clone(), row);
    }

    /// Register a module under a section
    pub fn add_module(&self, section_id: &str, module: ModuleRef) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let modules = inner.modules.entry(section_id.to_string()).or_default();
        modules.push(module);
        modules.sort_by_key(|m| m.sequence_number);
    }

    /// Register a section
    pub fn add_section(&self, section: SectionRef) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.sections.push(section);
        inner.sections.sort_by_key(|s| s.level);
    }

    /// Make the named trait operation fail with a 500 until cleared
    pub fn fail_op(&self, op: &'static str) {
        self.inner.lock().expect("store mutex poisoned").fail_ops.insert(op);
    }

    /// Stop failing the named operation
    pub fn clear_fail_op(&self, op: &'static str) {
        self.inner.lock().expect("store mutex poisoned").fail_ops.remove(op);
    }

    /// Snapshot of every write issued so far, in order
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.inner.lock().expect("store mutex poisoned").writes.clone()
    }

    /// Current cumulative XP for a learner
    pub fn user_xp(&self, user_id: &str) -> u32 {
        self.inner.lock().expect("store mutex poisoned").user_xp.get(user_id).copied().unwrap_or(0)
    }

    fn check_fail(&self, op: &'static str) -> Result<(), StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        if inner.fail_ops.contains(op) {
            return Err(StoreError::Persistence {
                status: 500,
                message: format!("injected failure: {op}"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LearnStore for MemoryStore {
    async fn fetch_quiz_metadata(&self, quiz_id: &str) -> Result<QuizMetadata, StoreError> {
        self.check_fail("fetch_quiz_metadata")?;
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { entity: "quiz", id: quiz_id.to_string() })
    }

    async fn fetch_question_ids(
        &self,
        quiz_id: &str,
    ) -> Result<HashMap<QuestionKind, Vec<String>>, StoreError> {
        self.check_fail("fetch_question_ids")?;
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.question_ids.get(quiz_id).cloned().unwrap_or_default())
    }

    async fn fetch_question_details(
        &self,
        kind: QuestionKind,
        ids: &[String],
    ) -> Result<Vec<QuestionRow>, StoreError> {
        self.check_fail("fetch_question_details")?;
        let inner = self.inner.lock().expect("store mutex poisoned");
        let rows = inner.question_rows.get(&kind);
        Ok(ids.iter().filter_map(|id| rows.and_then(|r| r.get(id)).cloned()).collect())
    }

    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<String, StoreError> {
        self.check_fail("record_attempt")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        let token = attempt.client_token.to_string();
        // Same token means a retried commit; hand back the existing row
        if let Some(existing) = inner.attempt_ids_by_token.get(&token) {
            return Ok(existing.clone());
        }

        let attempt_id = format!("att-{}", inner.attempt_ids_by_token.len() + 1);
        inner.attempt_ids_by_token.insert(token, attempt_id.clone());
        inner.writes.push(StoreWrite::Attempt {
            quiz_id: attempt.quiz_id.clone(),
            user_id: attempt.user_id.clone(),
            score: attempt.score,
            passed: attempt.passed,
            xp_earned: attempt.xp_earned,
        });
        Ok(attempt_id)
    }

    async fn record_answers(
        &self,
        attempt_id: &str,
        answers: &[NewAnswer],
    ) -> Result<(), StoreError> {
        self.check_fail("record_answers")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.writes.push(StoreWrite::Answers {
            attempt_id: attempt_id.to_string(),
            count: answers.len(),
        });
        Ok(())
    }

    async fn increment_user_xp(&self, user_id: &str, delta: u32) -> Result<(), StoreError> {
        self.check_fail("increment_user_xp")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        *inner.user_xp.entry(user_id.to_string()).or_insert(0) += delta;
        inner.writes.push(StoreWrite::XpIncrement { user_id: user_id.to_string(), delta });
        Ok(())
    }

    async fn upsert_module_progress(
        &self,
        user_id: &str,
        module_id: &str,
        status: ProgressStatus,
        _xp_earned: u32,
    ) -> Result<(), StoreError> {
        self.check_fail("upsert_module_progress")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.writes.push(StoreWrite::ModuleProgress {
            user_id: user_id.to_string(),
            module_id: module_id.to_string(),
            status,
        });
        Ok(())
    }

    async fn upsert_section_progress(
        &self,
        user_id: &str,
        section_id: &str,
        status: ProgressStatus,
    ) -> Result<(), StoreError> {
        self.check_fail("upsert_section_progress")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.writes.push(StoreWrite::SectionProgress {
            user_id: user_id.to_string(),
            section_id: section_id.to_string(),
            status,
        });
        Ok(())
    }

    async fn upsert_learner_progress(
        &self,
        user_id: &str,
        update: &LearnerProgressUpdate,
    ) -> Result<(), StoreError> {
        self.check_fail("upsert_learner_progress")?;
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.writes.push(StoreWrite::LearnerProgress {
            user_id: user_id.to_string(),
            update: update.clone(),
        });
        Ok(())
    }

    async fn list_modules_in_section(
        &self,
        section_id: &str,
    ) -> Result<Vec<ModuleRef>, StoreError> {
        self.check_fail("list_modules_in_section")?;
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.modules.get(section_id).cloned().unwrap_or_default())
    }

    async fn list_sections(&self) -> Result<Vec<SectionRef>, StoreError> {
        self.check_fail("list_sections")?;
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.sections.clone())
    }
}

/// The bundled cash-flow quiz, matching the product's seed content
fn sample_questions() -> Vec<(QuestionKind, QuestionRow)> {
    vec![
        (
            QuestionKind::Choice,
            QuestionRow {
                id: "q-cf-1".into(),
                title: Some(
                    "¿Que es el flujo de caja (Cash Flow) en una inversion inmobiliaria?".into(),
                ),
                options: Some(vec![
                    "El valor total de mercado de la propiedad.".into(),
                    "El dinero neto que queda mensualmente tras pagar todos los gastos.".into(),
                    "El impuesto que se paga al comprar un inmueble.".into(),
                    "La velocidad con la que se vende una propiedad.".into(),
                ]),
                correct_index: Some(1),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Cloze,
            QuestionRow {
                id: "q-cf-2".into(),
                title: Some("Completa el significado fundamental:".into()),
                sentence: Some(
                    "Un flujo de caja [gap] permite reinvertir, mientras que uno [gap] requiere \
                     poner dinero propio."
                        .into(),
                ),
                pool: Some(vec![
                    "positivo".into(),
                    "negativo".into(),
                    "nulo".into(),
                    "catastral".into(),
                ]),
                correct_fillers: Some(vec!["positivo".into(), "negativo".into()]),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Choice,
            QuestionRow {
                id: "q-cf-3".into(),
                title: Some(
                    "Si los gastos son mayores que los ingresos, el flujo de caja es...".into(),
                ),
                options: Some(vec![
                    "Positivo".into(),
                    "Nulo".into(),
                    "Negativo".into(),
                    "Variable".into(),
                ]),
                correct_index: Some(2),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Input,
            QuestionRow {
                id: "q-cf-4".into(),
                title: Some("Termina la frase: El Cash Flow es el alma de cualquier...".into()),
                placeholder: Some("Escribe la palabra faltante".into()),
                correct_text: Some("inversion".into()),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Input,
            QuestionRow {
                id: "q-cf-5".into(),
                title: Some(
                    "Si cobras $1000 de renta y gastas $700 en hipoteca y mantenimiento, \
                     ¿cual es tu flujo de caja?"
                        .into(),
                ),
                placeholder: Some("Ingresa el monto numerico".into()),
                correct_text: Some("300".into()),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Pairs,
            QuestionRow {
                id: "q-cf-6".into(),
                title: Some("Une cada concepto con su definicion:".into()),
                left_items: Some(vec!["ingresos".into(), "gastos".into(), "cash flow".into()]),
                right_items: Some(vec![
                    "lo que entra".into(),
                    "lo que sale".into(),
                    "lo que queda".into(),
                ]),
                correct_relations: Some(vec![
                    ("ingresos".into(), "lo que entra".into()),
                    ("gastos".into(), "lo que sale".into()),
                    ("cash flow".into(), "lo que queda".into()),
                ]),
                ..Default::default()
            },
        ),
        (
            QuestionKind::Choice,
            QuestionRow {
                id: "q-cf-7".into(),
                title: Some("¿Cual es el principal beneficio de tener Cash Flow positivo?".into()),
                options: Some(vec![
                    "Sustentabilidad del activo a largo plazo.".into(),
                    "Pagar mas comisiones al banco.".into(),
                    "Reducir el tamano de la propiedad.".into(),
                    "Ninguna de las anteriores.".into(),
                ]),
                correct_index: Some(0),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch_quiz_metadata("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "quiz", .. }));
    }

    #[tokio::test]
    async fn sample_store_serves_the_bundled_quiz() {
        let store = MemoryStore::sample();
        let meta = store.fetch_quiz_metadata(SAMPLE_QUIZ_ID).await.unwrap();
        assert_eq!(meta.module_id, "m-cash-flow");

        let ids = store.fetch_question_ids(SAMPLE_QUIZ_ID).await.unwrap();
        let total: usize = ids.values().map(Vec::len).sum();
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn attempt_token_deduplicates_retries() {
        let store = MemoryStore::new();
        let attempt = NewAttempt {
            client_token: Uuid::new_v4(),
            quiz_id: "qz".into(),
            user_id: "u".into(),
            score: 80,
            passed: true,
            xp_earned: 100,
        };
        let first = store.record_attempt(&attempt).await.unwrap();
        let second = store.record_attempt(&attempt).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn xp_increments_accumulate() {
        let store = MemoryStore::new();
        store.increment_user_xp("u", 100).await.unwrap();
        store.increment_user_xp("u", 50).await.unwrap();
        assert_eq!(store.user_xp("u"), 150);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_persistence_errors() {
        let store = MemoryStore::new();
        store.fail_op("increment_user_xp");
        let err = store.increment_user_xp("u", 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence { status: 500, .. }));

        store.clear_fail_op("increment_user_xp");
        assert!(store.increment_user_xp("u", 10).await.is_ok());
    }
}
