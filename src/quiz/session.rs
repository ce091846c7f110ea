//! Quiz run state machine
//!
//! Administers one assembled quiz, one question at a time:
//! `Presenting -> Feedback -> Presenting -> ... -> Completed`. The session
//! owns all transient attempt state (current index, pending answer, tally)
//! and discards it on quit; nothing here touches the backend. The progression
//! commit fires from the caller once [`Phase::Completed`] is reached.
//!
//! All transitions are caller-driven and synchronous; there is never more
//! than one question in flight.

use super::grading::{InputMatchPolicy, grade};
use super::model::{Answer, Question};

/// Where the session is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Showing the current question, collecting a pending answer
    Presenting,
    /// Showing right/wrong feedback for the just-submitted answer
    Feedback {
        /// Whether the submission graded correct
        correct: bool,
    },
    /// All questions answered; terminal
    Completed,
}

/// A pool entry placed into a cloze gap.
///
/// Tracks the pool index so a pool word used twice (e.g. two "de" fillers)
/// consumes distinct entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledGap {
    /// The filler text
    pub word: String,
    /// Index into the question's pool
    pub pool_index: usize,
}

/// The pending, not-yet-submitted answer for the current question
#[derive(Debug, Clone)]
pub enum Draft {
    /// Choice: selected option, if any
    Choice {
        /// Selected option index
        selected: Option<usize>,
    },
    /// Input: typed text
    Input {
        /// Current buffer
        text: String,
    },
    /// Cloze: one slot per gap, filled from the pool
    Cloze {
        /// Filled state per gap, in sentence order
        gaps: Vec<Option<FilledGap>>,
    },
    /// Pairs: constructed relations plus an armed left item
    Pairs {
        /// Left item awaiting a right-side pick
        selected_left: Option<String>,
        /// Relations built so far
        relations: Vec<(String, String)>,
    },
}

impl Draft {
    fn for_question(question: &Question) -> Self {
        match question {
            Question::Choice { .. } => Self::Choice { selected: None },
            Question::Input { .. } => Self::Input { text: String::new() },
            Question::Cloze { .. } => {
                Self::Cloze { gaps: vec![None; question.gap_count()] }
            }
            Question::Pairs { .. } => Self::Pairs { selected_left: None, relations: Vec::new() },
        }
    }
}

/// One entry in the attempt's answer log
#[derive(Debug, Clone)]
pub struct AnsweredQuestion {
    /// Question answered
    pub question_id: String,
    /// What the learner submitted
    pub answer: Answer,
    /// Grading result
    pub correct: bool,
}

/// Everything the progression commit needs from a completed run
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Number of correct submissions
    pub correct_count: usize,
    /// Number of questions administered
    pub total_questions: usize,
    /// Per-question answer log, in administration order
    pub answers: Vec<AnsweredQuestion>,
}

/// State machine for one quiz attempt
pub struct QuizSession {
    questions: Vec<Question>,
    policy: InputMatchPolicy,
    index: usize,
    phase: Phase,
    draft: Draft,
    answers: Vec<AnsweredQuestion>,
    correct_count: usize,
    active: bool,
}

impl QuizSession {
    /// Start a session at the first question.
    ///
    /// An empty question list completes immediately; assembly guarantees at
    /// least one question, so this is purely defensive totality.
    pub fn new(questions: Vec<Question>, policy: InputMatchPolicy) -> Self {
        let phase = if questions.is_empty() { Phase::Completed } else { Phase::Presenting };
        let draft = questions
            .first()
            .map(Draft::for_question)
            .unwrap_or(Draft::Input { text: String::new() });
        Self {
            questions,
            policy,
            index: 0,
            phase,
            draft,
            answers: Vec::new(),
            correct_count: 0,
            active: true,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// False once the learner has quit; a quit session ignores every event
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The question being presented, `None` once completed
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Completed => None,
            _ => self.questions.get(self.index),
        }
    }

    /// (current 0-based index, total questions)
    pub fn position(&self) -> (usize, usize) {
        (self.index.min(self.questions.len()), self.questions.len())
    }

    /// Pending answer state for the current question
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Select a choice option. Ignored outside `Presenting`, for non-choice
    /// questions, or out of range.
    pub fn select_option(&mut self, option_index: usize) {
        if !self.editable() {
            return;
        }
        let in_range = matches!(
            self.current_question(),
            Some(Question::Choice { options, .. }) if option_index < options.len()
        );
        if !in_range {
            return;
        }
        if let Draft::Choice { selected } = &mut self.draft {
            *selected = Some(option_index);
        }
    }

    /// Replace the input buffer
    pub fn set_input(&mut self, text: impl Into<String>) {
        if !self.editable() {
            return;
        }
        if let Draft::Input { text: buffer } = &mut self.draft {
            *buffer = text.into();
        }
    }

    /// Place the pool entry at `pool_index` into the first empty gap.
    /// A pool entry already sitting in a gap cannot be placed again until
    /// that gap is cleared.
    pub fn fill_gap(&mut self, pool_index: usize) {
        if !self.editable() {
            return;
        }
        let Some(Question::Cloze { pool, .. }) = self.current_question() else {
            return;
        };
        let Some(word) = pool.get(pool_index).cloned() else {
            return;
        };
        if let Draft::Cloze { gaps } = &mut self.draft {
            let consumed =
                gaps.iter().flatten().any(|filled| filled.pool_index == pool_index);
            if consumed {
                return;
            }
            if let Some(slot) = gaps.iter_mut().find(|g| g.is_none()) {
                *slot = Some(FilledGap { word, pool_index });
            }
        }
    }

    /// Empty a filled gap, releasing its pool entry for re-selection
    pub fn clear_gap(&mut self, gap_index: usize) {
        if !self.editable() {
            return;
        }
        if let Draft::Cloze { gaps } = &mut self.draft {
            if let Some(slot) = gaps.get_mut(gap_index) {
                *slot = None;
            }
        }
    }

    /// Arm a left item for pairing. Ignored if the item is unknown or
    /// already paired.
    pub fn select_left(&mut self, left: &str) {
        if !self.editable() {
            return;
        }
        let known = matches!(
            self.current_question(),
            Some(Question::Pairs { left_items, .. }) if left_items.iter().any(|l| l == left)
        );
        if !known {
            return;
        }
        if let Draft::Pairs { selected_left, relations } = &mut self.draft {
            if relations.iter().any(|(l, _)| l == left) {
                return;
            }
            *selected_left = Some(left.to_string());
        }
    }

    /// Pair the armed left item with `right`. Ignored without an armed left
    /// item, for unknown right items, or when `right` is already taken.
    pub fn select_right(&mut self, right: &str) {
        if !self.editable() {
            return;
        }
        let known = matches!(
            self.current_question(),
            Some(Question::Pairs { right_items, .. }) if right_items.iter().any(|r| r == right)
        );
        if !known {
            return;
        }
        if let Draft::Pairs { selected_left, relations } = &mut self.draft {
            if relations.iter().any(|(_, r)| r == right) {
                return;
            }
            if let Some(left) = selected_left.take() {
                relations.push((left, right.to_string()));
            }
        }
    }

    /// Dissolve the pair anchored at `left`, releasing both sides
    pub fn unpair(&mut self, left: &str) {
        if !self.editable() {
            return;
        }
        if let Draft::Pairs { relations, .. } = &mut self.draft {
            relations.retain(|(l, _)| l != left);
        }
    }

    /// Whether the pending answer is complete enough to submit:
    /// choice needs a selection, input non-empty trimmed text, cloze every
    /// gap filled, pairs every left item paired.
    pub fn can_submit(&self) -> bool {
        if !self.editable() {
            return false;
        }
        match (&self.draft, self.current_question()) {
            (Draft::Choice { selected }, Some(Question::Choice { .. })) => selected.is_some(),
            (Draft::Input { text }, Some(Question::Input { .. })) => !text.trim().is_empty(),
            (Draft::Cloze { gaps }, Some(Question::Cloze { .. })) => {
                gaps.iter().all(Option::is_some)
            }
            (Draft::Pairs { relations, .. }, Some(Question::Pairs { left_items, .. })) => {
                relations.len() == left_items.len()
            }
            _ => false,
        }
    }

    /// Grade and log the pending answer, moving to `Feedback`.
    ///
    /// Returns the grading result, or `None` when submission is disabled
    /// (incomplete answer, wrong phase, or quit session); callers prevent
    /// this via [`Self::can_submit`]; a stray call is rejected silently.
    pub fn submit(&mut self) -> Option<bool> {
        if !self.can_submit() {
            return None;
        }
        let answer = match &self.draft {
            Draft::Choice { selected } => Answer::Choice((*selected)?),
            Draft::Input { text } => Answer::Input(text.trim().to_string()),
            Draft::Cloze { gaps } => Answer::Cloze(
                gaps.iter().flatten().map(|g| g.word.clone()).collect(),
            ),
            Draft::Pairs { relations, .. } => Answer::Pairs(relations.clone()),
        };

        let question = self.questions.get(self.index)?;
        let correct = grade(question, &answer, self.policy);
        let question_id = question.id().to_string();
        self.answers.push(AnsweredQuestion { question_id, answer, correct });
        if correct {
            self.correct_count += 1;
        }
        self.phase = Phase::Feedback { correct };
        Some(correct)
    }

    /// Leave feedback: present the next question with fresh transient state,
    /// or complete the run. Returns the new phase.
    pub fn advance(&mut self) -> Phase {
        if !self.active || !matches!(self.phase, Phase::Feedback { .. }) {
            return self.phase;
        }
        self.index += 1;
        match self.questions.get(self.index) {
            Some(next) => {
                self.draft = Draft::for_question(next);
                self.phase = Phase::Presenting;
            }
            None => self.phase = Phase::Completed,
        }
        self.phase
    }

    /// Abandon the attempt. Permitted from any non-completed state; the
    /// attempt is never persisted and later events are ignored.
    pub fn quit(&mut self) {
        if self.phase == Phase::Completed {
            return;
        }
        self.active = false;
    }

    /// The attempt outcome, available only once completed
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        if self.phase != Phase::Completed || !self.active {
            return None;
        }
        Some(AttemptOutcome {
            correct_count: self.correct_count,
            total_questions: self.questions.len(),
            answers: self.answers.clone(),
        })
    }

    fn editable(&self) -> bool {
        self.active && self.phase == Phase::Presenting
    }
}
