use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kasa_learn::Config;
use kasa_learn::progress::{Advancement, ProgressionCommitter};
use kasa_learn::quiz::session::Draft;
use kasa_learn::quiz::{
    AssemblyError, InputMatchPolicy, Phase, Question, QuizAssembler, QuizSession, QuizSummary,
};
use kasa_learn::store::memory::SAMPLE_QUIZ_ID;
use kasa_learn::store::{LearnStore, MemoryStore, RestStore};

#[derive(Parser)]
#[command(name = "kasa-learn")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a quiz against the configured backend
    Run {
        /// Quiz identifier
        quiz_id: String,
    },
    /// Run the bundled sample quiz offline
    Demo,
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kasa_learn=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Run { quiz_id } => {
            let store: Arc<dyn LearnStore> = Arc::new(RestStore::new(
                &config.backend_url,
                &config.api_key,
                config.request_timeout_secs,
            ));
            run_quiz(store, &config, &quiz_id).await
        }
        Commands::Demo => {
            let store: Arc<dyn LearnStore> = Arc::new(MemoryStore::sample());
            run_quiz(store, &config, SAMPLE_QUIZ_ID).await
        }
        Commands::ConfigPath => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
    }
}

/// Assemble, administer, commit, summarize
async fn run_quiz(store: Arc<dyn LearnStore>, config: &Config, quiz_id: &str) -> Result<()> {
    let assembler = QuizAssembler::new(store.clone(), config.max_quiz_questions);
    let mut rng = StdRng::from_entropy();
    let cancel = CancellationToken::new();

    let quiz = match assembler.assemble(quiz_id, &mut rng, &cancel).await {
        Ok(quiz) => quiz,
        Err(AssemblyError::QuizNotFound(id)) => {
            eprintln!("Quiz '{id}' does not exist.");
            return Ok(());
        }
        Err(AssemblyError::NoQuestionsConfigured(id)) => {
            eprintln!("Quiz '{id}' has no questions yet. Come back later.");
            return Ok(());
        }
        Err(err) => return Err(err).context("Failed to assemble quiz"),
    };

    println!("\n=== {} ===", quiz.metadata.title);
    println!(
        "{} questions, {} XP on a pass. Type 'q' at any prompt to quit.\n",
        quiz.questions.len(),
        quiz.metadata.xp_reward
    );

    let mut session = QuizSession::new(quiz.questions.clone(), InputMatchPolicy::default());

    while session.phase() != Phase::Completed {
        let Some(question) = session.current_question().cloned() else {
            break;
        };
        let (index, total) = session.position();
        println!("--- Question {} of {} ---", index + 1, total);
        println!("{}\n", question.title());

        if !collect_answer(&mut session, &question)? {
            session.quit();
            println!("Attempt discarded. Nothing was saved.");
            return Ok(());
        }

        match session.submit() {
            Some(true) => println!("\n  ✓ Correct!\n"),
            Some(false) => println!("\n  ✗ Not quite.\n"),
            None => continue,
        }
        session.advance();
    }

    let Some(outcome) = session.outcome() else {
        return Ok(());
    };

    let committer = ProgressionCommitter::new(store, &config.user_id);
    let receipt = committer
        .commit(&quiz.metadata, &outcome)
        .await
        .context("Failed to save your attempt; your answers were not lost on the server side")?;

    let summary = QuizSummary::new(&outcome, &receipt, None);
    println!("==============================");
    println!("{}", summary.headline());
    println!("Score: {} ({}%)", summary.score_line(), summary.percentage);
    println!("XP earned: +{}", summary.xp_earned);
    match &receipt.advancement {
        Advancement::NotPassed => println!("Try the quiz again when you're ready."),
        Advancement::NextModule { module_id } => println!("Next up: module {module_id}."),
        Advancement::NextSection { section_id, module_id } => {
            println!("Section complete! Continuing with {module_id} in {section_id}.");
        }
        Advancement::CurriculumComplete => println!("You finished the whole journey!"),
    }

    Ok(())
}

/// Drive the prompts for one question until it is submittable.
/// Returns false when the learner quits.
fn collect_answer(session: &mut QuizSession, question: &Question) -> Result<bool> {
    loop {
        if session.can_submit() {
            return Ok(true);
        }
        match question {
            Question::Choice { options, .. } => {
                for (i, option) in options.iter().enumerate() {
                    println!("  {}) {}", i + 1, option);
                }
                let Some(line) = prompt("Pick an option: ")? else {
                    return Ok(false);
                };
                if is_quit(&line) {
                    return Ok(false);
                }
                if let Ok(n) = line.parse::<usize>() {
                    if n >= 1 {
                        session.select_option(n - 1);
                    }
                }
            }
            Question::Input { placeholder, .. } => {
                let Some(line) = prompt(&format!("{placeholder}: "))? else {
                    return Ok(false);
                };
                if is_quit(&line) {
                    return Ok(false);
                }
                session.set_input(line);
            }
            Question::Cloze { sentence, pool, .. } => {
                println!("  {}", render_cloze(sentence, session.draft()));
                for (i, word) in pool.iter().enumerate() {
                    println!("  {}) {}", i + 1, word);
                }
                let Some(line) = prompt("Fill the next gap (number), or 'clear N': ")? else {
                    return Ok(false);
                };
                if is_quit(&line) {
                    return Ok(false);
                }
                if let Some(rest) = line.strip_prefix("clear ") {
                    if let Ok(n) = rest.trim().parse::<usize>() {
                        if n >= 1 {
                            session.clear_gap(n - 1);
                        }
                    }
                } else if let Ok(n) = line.parse::<usize>() {
                    if n >= 1 {
                        session.fill_gap(n - 1);
                    }
                }
            }
            Question::Pairs { left_items, right_items, .. } => {
                println!("  Left: {}", left_items.join(", "));
                println!("  Right: {}", right_items.join(", "));
                if let Draft::Pairs { relations, .. } = session.draft() {
                    for (l, r) in relations {
                        println!("  paired: {l} -> {r}");
                    }
                }
                let Some(line) = prompt("Pair as 'left = right', or 'undo left': ")? else {
                    return Ok(false);
                };
                if is_quit(&line) {
                    return Ok(false);
                }
                if let Some(rest) = line.strip_prefix("undo ") {
                    session.unpair(rest.trim());
                } else if let Some((left, right)) = line.split_once('=') {
                    session.select_left(left.trim());
                    session.select_right(right.trim());
                }
            }
        }
    }
}

/// Render the cloze sentence with filled gaps inlined and empty gaps as
/// underscores
fn render_cloze(sentence: &str, draft: &Draft) -> String {
    let Draft::Cloze { gaps } = draft else {
        return sentence.to_string();
    };
    let mut rendered = String::new();
    let mut remaining = sentence;
    for gap in gaps {
        let Some(pos) = remaining.find(kasa_learn::quiz::model::GAP_MARKER) else {
            break;
        };
        rendered.push_str(&remaining[..pos]);
        match gap {
            Some(filled) => rendered.push_str(&format!("[{}]", filled.word)),
            None => rendered.push_str("[____]"),
        }
        remaining = &remaining[pos + kasa_learn::quiz::model::GAP_MARKER.len()..];
    }
    rendered.push_str(remaining);
    rendered
}

/// Prompt for one line; `None` once stdin is exhausted, which callers treat
/// as a quit
fn prompt(text: &str) -> Result<Option<String>> {
    print!("{text}");
    io::stdout().flush().context("Failed to flush stdout")?;
    read_trimmed_line(&mut io::stdin().lock())
}

fn read_trimmed_line(reader: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).context("Failed to read input")?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn exhausted_input_reads_as_none() {
        let mut input = Cursor::new("");
        assert_eq!(read_trimmed_line(&mut input).unwrap(), None);
    }

    #[test]
    fn lines_are_trimmed_then_input_ends() {
        let mut input = Cursor::new("  2 \nq\n");
        assert_eq!(read_trimmed_line(&mut input).unwrap().as_deref(), Some("2"));
        assert_eq!(read_trimmed_line(&mut input).unwrap().as_deref(), Some("q"));
        assert_eq!(read_trimmed_line(&mut input).unwrap(), None);
    }

    #[test]
    fn quit_matching_is_case_insensitive() {
        assert!(is_quit("Q"));
        assert!(is_quit("quit"));
        assert!(!is_quit(""));
        assert!(!is_quit("2"));
    }
}
