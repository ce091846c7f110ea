//! The quiz core: question model, grading, assembly, run state machine, and
//! result presentation
//!
//! Control flow: [`assembly`] builds the question set, [`session`] drives it
//! one question at a time, [`crate::progress`] commits the completed attempt,
//! and [`results`] derives the summary for display.

pub mod assembly;
pub mod grading;
pub mod model;
pub mod normalize;
pub mod results;
pub mod session;

pub use assembly::{AssembledQuiz, AssemblyError, QuizAssembler};
pub use grading::InputMatchPolicy;
pub use model::{Answer, Question, QuestionKind};
pub use results::QuizSummary;
pub use session::{AttemptOutcome, Phase, QuizSession};
