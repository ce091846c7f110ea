//! Kasa Learn - gamified real-estate-investment education
//!
//! The quiz core of the Kasa learning journey: assembling quizzes from the
//! hosted backend, administering them one question at a time, grading the
//! four question variants, and committing curriculum progression (XP, module
//! and section completion) when an attempt passes.
//!
//! Persistence and authorization live entirely in the external data platform
//! behind the [`store::LearnStore`] seam.

pub mod config;
pub mod progress;
pub mod quiz;
pub mod store;

pub use config::Config;
pub use progress::ProgressionCommitter;
pub use quiz::{QuizAssembler, QuizSession};
pub use store::LearnStore;
