//! Wire-level records exchanged with the learning-platform backend

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Passing threshold applied when a quiz row does not declare one
pub const DEFAULT_PASSING_THRESHOLD: u8 = 70;

/// Quiz metadata row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizMetadata {
    /// Quiz identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// XP awarded on a passing attempt
    pub xp_reward: u32,
    /// Minimum score (0-100) to pass; `None` means the default applies
    #[serde(default)]
    pub passing_threshold: Option<u8>,
    /// Module this quiz belongs to
    pub module_id: String,
    /// Section that module belongs to
    pub section_id: String,
}

impl QuizMetadata {
    /// Effective passing threshold for this quiz
    pub fn threshold(&self) -> u8 {
        self.passing_threshold.unwrap_or(DEFAULT_PASSING_THRESHOLD)
    }
}

/// Raw question detail row, one table per question kind.
///
/// Every kind-specific field is optional at the wire level; rows missing the
/// fields their kind requires are skipped during assembly rather than failing
/// the whole quiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionRow {
    /// Question identifier
    pub id: String,
    /// Prompt text
    #[serde(default)]
    pub title: Option<String>,
    /// Choice: options in display order
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Choice: index of the correct option
    #[serde(default)]
    pub correct_index: Option<i64>,
    /// Cloze: sentence containing gap markers
    #[serde(default)]
    pub sentence: Option<String>,
    /// Cloze: candidate fillers including distractors
    #[serde(default)]
    pub pool: Option<Vec<String>>,
    /// Cloze: expected filler per gap, in order
    #[serde(default)]
    pub correct_fillers: Option<Vec<String>>,
    /// Input: placeholder hint
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Input: accepted answer
    #[serde(default)]
    pub correct_text: Option<String>,
    /// Pairs: left column
    #[serde(default)]
    pub left_items: Option<Vec<String>>,
    /// Pairs: right column
    #[serde(default)]
    pub right_items: Option<Vec<String>>,
    /// Pairs: expected left -> right relation
    #[serde(default)]
    pub correct_relations: Option<Vec<(String, String)>>,
}

/// A completed attempt, ready to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttempt {
    /// Client-generated idempotency token; a uniqueness-enforcing backend
    /// deduplicates retried commits on it
    pub client_token: Uuid,
    /// Quiz that was attempted
    pub quiz_id: String,
    /// Learner who attempted it
    pub user_id: String,
    /// Score, 0-100
    pub score: u8,
    /// Whether the score met the quiz threshold
    pub passed: bool,
    /// XP awarded (0 on a failed attempt)
    pub xp_earned: u32,
}

/// One per-question answer row, referencing its attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswer {
    /// Question the answer belongs to
    pub question_id: String,
    /// The learner's answer, self-describing JSON
    pub answer: serde_json::Value,
    /// Grading outcome
    pub is_correct: bool,
}

/// Status of a per-(user, module|section) progress record.
///
/// `Completed` is terminal and is never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Not yet started
    NotStarted,
    /// Started but not finished
    InProgress,
    /// Finished; terminal
    Completed,
}

/// New values for the learner's singleton progress record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProgressUpdate {
    /// Section the learner is now in
    pub current_section_id: Option<String>,
    /// Module the learner is now on; `None` once the curriculum is exhausted
    pub current_module_id: Option<String>,
    /// Completion percentage within the current module
    pub module_completion_pct: u8,
}

/// Module listing entry, ordered by sequence within its section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Module identifier
    pub id: String,
    /// Position within the section, ascending
    pub sequence_number: u32,
}

/// Section listing entry, ordered by level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRef {
    /// Section identifier
    pub id: String,
    /// Curriculum level, ascending
    pub level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(threshold: Option<u8>) -> QuizMetadata {
        QuizMetadata {
            id: "qz-1".into(),
            title: "Cash flow".into(),
            xp_reward: 250,
            passing_threshold: threshold,
            module_id: "m-1".into(),
            section_id: "s-1".into(),
        }
    }

    #[test]
    fn threshold_defaults_to_70() {
        assert_eq!(metadata(None).threshold(), 70);
        assert_eq!(metadata(Some(90)).threshold(), 90);
    }

    #[test]
    fn question_row_tolerates_sparse_json() {
        let row: QuestionRow = serde_json::from_str(r#"{"id":"q1"}"#).unwrap();
        assert_eq!(row.id, "q1");
        assert!(row.options.is_none());
    }

    #[test]
    fn progress_status_uses_snake_case() {
        let json = serde_json::to_string(&ProgressStatus::NotStarted).unwrap();
        assert_eq!(json, r#""not_started""#);
    }

    #[test]
    fn learner_update_serializes_cleared_module_as_null() {
        let update = LearnerProgressUpdate {
            current_section_id: Some("s-2".into()),
            current_module_id: None,
            module_completion_pct: 100,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json["current_module_id"].is_null());
    }
}
