//! Data-access seam to the hosted learning platform
//!
//! All persistence, authorization, and relational querying are delegated to
//! the external backend. The quiz core only ever talks to [`LearnStore`],
//! which is constructor-injected so the core is testable against
//! [`MemoryStore`] and runs in production against [`RestStore`].

pub mod error;
pub mod memory;
pub mod models;
pub mod rest;

use std::collections::HashMap;

pub use error::StoreError;
pub use memory::{MemoryStore, StoreWrite};
pub use models::{
    LearnerProgressUpdate, ModuleRef, NewAnswer, NewAttempt, ProgressStatus, QuestionRow,
    QuizMetadata, SectionRef,
};
pub use rest::RestStore;

use crate::quiz::model::QuestionKind;

/// Operations the quiz core needs from the backend.
///
/// Reads feed quiz assembly; writes are issued only by the progression commit
/// protocol. `increment_user_xp` must be atomic on the server (`xp = xp +
/// delta`), never a client read-modify-write.
#[async_trait::async_trait]
pub trait LearnStore: Send + Sync {
    /// Resolve a quiz's metadata; `NotFound` if the quiz does not exist
    async fn fetch_quiz_metadata(&self, quiz_id: &str) -> Result<QuizMetadata, StoreError>;

    /// Question ids belonging to the quiz, partitioned by kind
    async fn fetch_question_ids(
        &self,
        quiz_id: &str,
    ) -> Result<HashMap<QuestionKind, Vec<String>>, StoreError>;

    /// Batch-fetch detail rows for one kind (one round trip per kind)
    async fn fetch_question_details(
        &self,
        kind: QuestionKind,
        ids: &[String],
    ) -> Result<Vec<QuestionRow>, StoreError>;

    /// Persist an attempt; returns the attempt id
    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<String, StoreError>;

    /// Persist the per-question answer log for an attempt
    async fn record_answers(
        &self,
        attempt_id: &str,
        answers: &[NewAnswer],
    ) -> Result<(), StoreError>;

    /// Atomically add `delta` to the learner's cumulative XP
    async fn increment_user_xp(&self, user_id: &str, delta: u32) -> Result<(), StoreError>;

    /// Upsert a per-(user, module) progress record
    async fn upsert_module_progress(
        &self,
        user_id: &str,
        module_id: &str,
        status: ProgressStatus,
        xp_earned: u32,
    ) -> Result<(), StoreError>;

    /// Upsert a per-(user, section) progress record
    async fn upsert_section_progress(
        &self,
        user_id: &str,
        section_id: &str,
        status: ProgressStatus,
    ) -> Result<(), StoreError>;

    /// Replace the learner's current-position record
    async fn upsert_learner_progress(
        &self,
        user_id: &str,
        update: &LearnerProgressUpdate,
    ) -> Result<(), StoreError>;

    /// Modules in a section, ordered by ascending sequence number
    async fn list_modules_in_section(&self, section_id: &str)
    -> Result<Vec<ModuleRef>, StoreError>;

    /// All sections, ordered by ascending level
    async fn list_sections(&self) -> Result<Vec<SectionRef>, StoreError>;
}
