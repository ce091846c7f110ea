//! Result presentation: pure derived summary of a finished attempt

use super::session::AttemptOutcome;
use crate::progress::CommitReceipt;

/// What the learner should be offered next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Passed: continue to the next module or section
    ContinueJourney,
    /// Failed: offer another attempt
    RetryQuiz,
}

/// Display summary for the results screen. Derivation only, no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSummary {
    /// Correct submissions
    pub correct: usize,
    /// Questions administered
    pub total: usize,
    /// Rounded score percentage
    pub percentage: u8,
    /// Whether the attempt passed
    pub passed: bool,
    /// XP awarded (0 when failed)
    pub xp_earned: u32,
    /// Leaderboard position, when the caller has one to show
    pub rank: Option<u32>,
}

impl QuizSummary {
    /// Build a summary from raw attempt figures
    pub fn from_parts(
        correct: usize,
        total: usize,
        xp_earned: u32,
        passed: bool,
        rank: Option<u32>,
    ) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            (correct as f64 / total as f64 * 100.0).round() as u8
        };
        Self { correct, total, percentage, passed, xp_earned, rank }
    }

    /// Build a summary from a completed run and its commit receipt
    pub fn new(outcome: &AttemptOutcome, receipt: &CommitReceipt, rank: Option<u32>) -> Self {
        Self::from_parts(
            outcome.correct_count,
            outcome.total_questions,
            receipt.xp_earned,
            receipt.passed,
            rank,
        )
    }

    /// Pass/fail headline
    pub fn headline(&self) -> &'static str {
        if self.passed { "¡Excelente! Has aprobado el modulo" } else { "Sigue practicando" }
    }

    /// "correct/total" display string
    pub fn score_line(&self) -> String {
        format!("{}/{}", self.correct, self.total)
    }

    /// The affordance to show under the summary
    pub fn next_action(&self) -> NextAction {
        if self.passed { NextAction::ContinueJourney } else { NextAction::RetryQuiz }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_nearest() {
        let summary = QuizSummary::from_parts(2, 3, 0, false, None);
        assert_eq!(summary.percentage, 67);
        assert_eq!(summary.score_line(), "2/3");
    }

    #[test]
    fn passing_offers_continuation() {
        let summary = QuizSummary::from_parts(3, 3, 250, true, Some(4));
        assert_eq!(summary.percentage, 100);
        assert_eq!(summary.next_action(), NextAction::ContinueJourney);
        assert_eq!(summary.rank, Some(4));
    }

    #[test]
    fn failing_offers_retry_with_zero_xp() {
        let summary = QuizSummary::from_parts(3, 5, 0, false, None);
        assert_eq!(summary.percentage, 60);
        assert_eq!(summary.xp_earned, 0);
        assert_eq!(summary.next_action(), NextAction::RetryQuiz);
    }

    #[test]
    fn empty_attempt_is_zero_percent() {
        let summary = QuizSummary::from_parts(0, 0, 0, false, None);
        assert_eq!(summary.percentage, 0);
    }
}
