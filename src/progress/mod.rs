//! Progression commit protocol
//!
//! Fires exactly once, when a quiz run completes. Persists the attempt and
//! its answer log unconditionally, then, only on a pass, awards XP and
//! advances the learner's curriculum position: next module in the section,
//! or the next section's first module, or the curriculum-complete terminal
//! state.
//!
//! The sequence is multi-step against a remote store and has no rollback.
//! Every attempt carries a client-generated token so a retried commit lands
//! on the same attempt row, and [`CommitError`] names the step that failed so
//! callers know what a retry would redo. Steps are strictly sequential; later
//! steps depend on earlier results.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::quiz::session::AttemptOutcome;
use crate::store::{
    LearnStore, LearnerProgressUpdate, NewAnswer, NewAttempt, ProgressStatus, QuizMetadata,
    StoreError,
};

/// The commit's individual steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    /// Persist the attempt row
    RecordAttempt,
    /// Persist the per-question answer log
    RecordAnswers,
    /// Atomic XP increment
    AwardXp,
    /// Mark the module's progress record completed
    CompleteModule,
    /// Look up the section's module ordering
    ResolveNextModule,
    /// Mark the section's progress record completed
    CompleteSection,
    /// Look up the section ordering
    ResolveNextSection,
    /// Write the learner's new position
    AdvanceLearner,
}

/// A commit failure, tagged with the step that failed.
///
/// Steps before `step` are durable; retrying with the same token is safe for
/// the attempt row, and `source.is_retryable()` says whether retrying at all
/// is sensible.
#[derive(Debug, Error)]
#[error("progression commit failed at {step:?}: {source}")]
pub struct CommitError {
    /// Which step failed
    pub step: CommitStep,
    /// The underlying store failure
    #[source]
    pub source: StoreError,
}

impl CommitError {
    fn at(step: CommitStep) -> impl FnOnce(StoreError) -> Self {
        move |source| Self { step, source }
    }
}

/// Where the learner ended up after a committed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advancement {
    /// Failed attempt; position untouched
    NotPassed,
    /// Moved to the next module in the same section
    NextModule {
        /// The new current module
        module_id: String,
    },
    /// Finished the section; moved to the next section's first module
    NextSection {
        /// The new current section
        section_id: String,
        /// Its first module
        module_id: String,
    },
    /// No further module exists; curriculum exhausted (terminal, not an
    /// error)
    CurriculumComplete,
}

/// Receipt for a committed attempt
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Server-side attempt id
    pub attempt_id: String,
    /// Idempotency token the attempt was recorded under
    pub token: Uuid,
    /// Score, 0-100
    pub score: u8,
    /// Whether the attempt passed
    pub passed: bool,
    /// XP awarded (0 when failed)
    pub xp_earned: u32,
    /// Resulting curriculum movement
    pub advancement: Advancement,
}

/// Commits completed attempts for one learner. Sole writer of the learner's
/// progress records.
pub struct ProgressionCommitter {
    store: Arc<dyn LearnStore>,
    user_id: String,
}

impl ProgressionCommitter {
    /// Create a committer for the given learner
    pub fn new(store: Arc<dyn LearnStore>, user_id: impl Into<String>) -> Self {
        Self { store, user_id: user_id.into() }
    }

    /// Commit a completed run under a fresh idempotency token
    pub async fn commit(
        &self,
        metadata: &QuizMetadata,
        outcome: &AttemptOutcome,
    ) -> Result<CommitReceipt, CommitError> {
        self.commit_with_token(Uuid::new_v4(), metadata, outcome).await
    }

    /// Commit a completed run, reusing `token` when retrying a failed commit
    /// so the attempt row is not duplicated
    pub async fn commit_with_token(
        &self,
        token: Uuid,
        metadata: &QuizMetadata,
        outcome: &AttemptOutcome,
    ) -> Result<CommitReceipt, CommitError> {
        let score = score_percentage(outcome.correct_count, outcome.total_questions);
        let passed = score >= metadata.threshold();
        let xp_earned = if passed { metadata.xp_reward } else { 0 };

        // The attempt is the permanent receipt, recorded pass or fail
        let attempt = NewAttempt {
            client_token: token,
            quiz_id: metadata.id.clone(),
            user_id: self.user_id.clone(),
            score,
            passed,
            xp_earned,
        };
        let attempt_id = self
            .store
            .record_attempt(&attempt)
            .await
            .map_err(CommitError::at(CommitStep::RecordAttempt))?;

        let answers: Vec<NewAnswer> = outcome
            .answers
            .iter()
            .map(|a| {
                Ok(NewAnswer {
                    question_id: a.question_id.clone(),
                    answer: serde_json::to_value(&a.answer)?,
                    is_correct: a.correct,
                })
            })
            .collect::<Result<_, serde_json::Error>>()
            .map_err(|e| CommitError { step: CommitStep::RecordAnswers, source: e.into() })?;
        self.store
            .record_answers(&attempt_id, &answers)
            .await
            .map_err(CommitError::at(CommitStep::RecordAnswers))?;

        let advancement = if passed {
            self.advance(metadata, xp_earned).await?
        } else {
            debug!(quiz_id = %metadata.id, score, "attempt failed; position untouched");
            Advancement::NotPassed
        };

        info!(quiz_id = %metadata.id, attempt_id, score, passed, xp_earned, "attempt committed");
        Ok(CommitReceipt { attempt_id, token, score, passed, xp_earned, advancement })
    }

    /// Post-pass side of the commit: XP, module completion, and the move to
    /// whatever comes next
    async fn advance(
        &self,
        metadata: &QuizMetadata,
        xp_earned: u32,
    ) -> Result<Advancement, CommitError> {
        self.store
            .increment_user_xp(&self.user_id, xp_earned)
            .await
            .map_err(CommitError::at(CommitStep::AwardXp))?;

        self.store
            .upsert_module_progress(
                &self.user_id,
                &metadata.module_id,
                ProgressStatus::Completed,
                xp_earned,
            )
            .await
            .map_err(CommitError::at(CommitStep::CompleteModule))?;

        let modules = self
            .store
            .list_modules_in_section(&metadata.section_id)
            .await
            .map_err(CommitError::at(CommitStep::ResolveNextModule))?;
        // The completed module absent from its own section's listing is a
        // data inconsistency, not a rollover; closing the section on it
        // would be wrong.
        let Some(position) = modules.iter().position(|m| m.id == metadata.module_id) else {
            warn!(module_id = %metadata.module_id, section_id = %metadata.section_id,
                "completed module missing from its section listing");
            return Err(CommitError {
                step: CommitStep::ResolveNextModule,
                source: StoreError::NotFound {
                    entity: "module",
                    id: metadata.module_id.clone(),
                },
            });
        };
        let next_module = modules.get(position + 1);

        if let Some(next) = next_module {
            self.store
                .upsert_learner_progress(
                    &self.user_id,
                    &LearnerProgressUpdate {
                        current_section_id: Some(metadata.section_id.clone()),
                        current_module_id: Some(next.id.clone()),
                        module_completion_pct: 0,
                    },
                )
                .await
                .map_err(CommitError::at(CommitStep::AdvanceLearner))?;
            return Ok(Advancement::NextModule { module_id: next.id.clone() });
        }

        // Last module of the section: close the section out and roll over
        self.store
            .upsert_section_progress(&self.user_id, &metadata.section_id, ProgressStatus::Completed)
            .await
            .map_err(CommitError::at(CommitStep::CompleteSection))?;

        let sections = self
            .store
            .list_sections()
            .await
            .map_err(CommitError::at(CommitStep::ResolveNextSection))?;
        let section_pos = sections.iter().position(|s| s.id == metadata.section_id);
        let next_section = section_pos.and_then(|i| sections.get(i + 1));

        let Some(next_section) = next_section else {
            return self.finish_curriculum(metadata).await;
        };

        let next_modules = self
            .store
            .list_modules_in_section(&next_section.id)
            .await
            .map_err(CommitError::at(CommitStep::ResolveNextSection))?;
        let Some(first_module) = next_modules.first() else {
            // A next section with nothing in it ends the journey the same way
            return self.finish_curriculum(metadata).await;
        };

        self.store
            .upsert_learner_progress(
                &self.user_id,
                &LearnerProgressUpdate {
                    current_section_id: Some(next_section.id.clone()),
                    current_module_id: Some(first_module.id.clone()),
                    module_completion_pct: 0,
                },
            )
            .await
            .map_err(CommitError::at(CommitStep::AdvanceLearner))?;

        Ok(Advancement::NextSection {
            section_id: next_section.id.clone(),
            module_id: first_module.id.clone(),
        })
    }

    async fn finish_curriculum(
        &self,
        metadata: &QuizMetadata,
    ) -> Result<Advancement, CommitError> {
        self.store
            .upsert_learner_progress(
                &self.user_id,
                &LearnerProgressUpdate {
                    current_section_id: Some(metadata.section_id.clone()),
                    current_module_id: None,
                    module_completion_pct: 100,
                },
            )
            .await
            .map_err(CommitError::at(CommitStep::AdvanceLearner))?;
        info!(user_id = %self.user_id, "curriculum exhausted");
        Ok(Advancement::CurriculumComplete)
    }
}

/// `round(correct / total * 100)`; 0 for an empty attempt
fn score_percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u8
}
