//! Question model for quizzes
//!
//! A quiz is administered as a flat list of questions drawn from four closed
//! variants. Each variant carries its own correctness data; grading rules live
//! in [`crate::quiz::grading`].

use serde::{Deserialize, Serialize};

/// Marker embedded in a cloze sentence wherever a gap must be filled.
pub const GAP_MARKER: &str = "[gap]";

/// The four question variants, as stored in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Multiple choice: pick one option
    Choice,
    /// Fill-in-the-blank from a word pool
    Cloze,
    /// Free-text input
    Input,
    /// Match left items to right items
    Pairs,
}

impl QuestionKind {
    /// All variants, in backend partition order
    pub fn all() -> &'static [QuestionKind] {
        &[Self::Choice, Self::Cloze, Self::Input, Self::Pairs]
    }

    /// Backend identifier for this variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Choice => "choice",
            Self::Cloze => "cloze",
            Self::Input => "input",
            Self::Pairs => "pairs",
        }
    }

    /// Parse a backend type tag; `None` for unknown tags so callers can skip
    /// rows from newer schema versions instead of failing
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "choice" => Some(Self::Choice),
            "cloze" => Some(Self::Cloze),
            "input" => Some(Self::Input),
            "pairs" => Some(Self::Pairs),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-resolved quiz question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Question {
    /// Pick the single correct option
    Choice {
        /// Question id, unique within the quiz
        id: String,
        /// Prompt text
        title: String,
        /// Options in display order
        options: Vec<String>,
        /// Index of the correct option
        correct_index: usize,
    },
    /// Fill every `[gap]` in the sentence from the word pool
    Cloze {
        /// Question id, unique within the quiz
        id: String,
        /// Prompt text
        title: String,
        /// Sentence containing one or more [`GAP_MARKER`]s
        sentence: String,
        /// Candidate fillers, superset of `correct` (includes distractors)
        pool: Vec<String>,
        /// Expected filler per gap, in gap order
        correct: Vec<String>,
    },
    /// Type the answer freely
    Input {
        /// Question id, unique within the quiz
        id: String,
        /// Prompt text
        title: String,
        /// Input placeholder hint
        placeholder: String,
        /// Accepted answer (matched normalized, substring-tolerant)
        correct: String,
    },
    /// Pair each left item with its right item
    Pairs {
        /// Question id, unique within the quiz
        id: String,
        /// Prompt text
        title: String,
        /// Left column, in display order
        left_items: Vec<String>,
        /// Right column (presented shuffled by the caller)
        right_items: Vec<String>,
        /// Expected left -> right relation, one entry per left item
        correct_relations: Vec<(String, String)>,
    },
}

impl Question {
    /// Question id
    pub fn id(&self) -> &str {
        match self {
            Self::Choice { id, .. }
            | Self::Cloze { id, .. }
            | Self::Input { id, .. }
            | Self::Pairs { id, .. } => id,
        }
    }

    /// Prompt text
    pub fn title(&self) -> &str {
        match self {
            Self::Choice { title, .. }
            | Self::Cloze { title, .. }
            | Self::Input { title, .. }
            | Self::Pairs { title, .. } => title,
        }
    }

    /// Which variant this question is
    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::Choice { .. } => QuestionKind::Choice,
            Self::Cloze { .. } => QuestionKind::Cloze,
            Self::Input { .. } => QuestionKind::Input,
            Self::Pairs { .. } => QuestionKind::Pairs,
        }
    }

    /// Number of gaps in a cloze sentence; 0 for other variants
    pub fn gap_count(&self) -> usize {
        match self {
            Self::Cloze { sentence, .. } => sentence.matches(GAP_MARKER).count(),
            _ => 0,
        }
    }
}

/// A learner's submitted answer, parallel to the question variants.
///
/// This is the representation persisted in the per-question answer log, so it
/// serializes to a self-describing JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Answer {
    /// Selected option index
    Choice(usize),
    /// Typed text, as entered
    Input(String),
    /// Chosen filler per gap, in gap order
    Cloze(Vec<String>),
    /// Constructed left -> right relations
    Pairs(Vec<(String, String)>),
}
