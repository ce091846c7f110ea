//! REST implementation of [`LearnStore`] against the hosted data platform
//!
//! Speaks the platform's PostgREST-style surface: table reads via query
//! filters, inserts/upserts via `POST` with `Prefer` headers, and the atomic
//! XP bump via an RPC endpoint so concurrent sessions never lose an update.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LearnStore;
use super::error::StoreError;
use super::models::{
    LearnerProgressUpdate, ModuleRef, NewAnswer, NewAttempt, ProgressStatus, QuestionRow,
    QuizMetadata, SectionRef,
};
use crate::quiz::model::QuestionKind;

/// REST client for the learning backend
pub struct RestStore {
    /// HTTP client with the per-request timeout baked in
    client: Client,
    /// Backend base URL, no trailing slash
    base_url: String,
    /// API key, sent as both `apikey` and bearer token
    api_key: String,
    /// Per-request budget, kept for error reporting
    timeout_secs: u64,
}

impl RestStore {
    /// Create a client for the given backend
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self { client, base_url, api_key: api_key.into(), timeout_secs }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout { seconds: self.timeout_secs }
        } else {
            StoreError::Network(err)
        }
    }

    /// GET rows from a table, decoding the JSON array body
    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(StoreError::Persistence { status: status.as_u16(), message: body });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// POST a JSON body to a table or RPC endpoint; returns the raw body
    async fn post(
        &self,
        url: String,
        query: &[(&str, String)],
        prefer: Option<&str>,
        body: &impl Serialize,
    ) -> Result<String, StoreError> {
        let mut request = self
            .client
            .post(url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(body);

        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(StoreError::Persistence { status: status.as_u16(), message: text });
        }

        Ok(text)
    }
}

/// `id=in.("a","b","c")` filter value for a batch read. Ids are opaque
/// strings, so each one is quoted to keep `,` and `)` from corrupting the
/// filter.
fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn unix_timestamp() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct QuizQuestionRow {
    question_id: String,
    question_type: String,
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: String,
}

#[derive(Debug, Serialize)]
struct AnswerInsert<'a> {
    attempt_id: &'a str,
    question_id: &'a str,
    answer: &'a serde_json::Value,
    is_correct: bool,
}

#[derive(Debug, Serialize)]
struct ModuleProgressUpsert<'a> {
    user_id: &'a str,
    module_id: &'a str,
    status: ProgressStatus,
    xp_earned: u32,
    completed_at: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SectionProgressUpsert<'a> {
    user_id: &'a str,
    section_id: &'a str,
    status: ProgressStatus,
    completed_at: Option<i64>,
}

#[derive(Debug, Serialize)]
struct LearnerProgressUpsert<'a> {
    user_id: &'a str,
    current_section_id: Option<&'a str>,
    current_module_id: Option<&'a str>,
    module_completion_pct: u8,
}

#[derive(Debug, Serialize)]
struct XpIncrementArgs<'a> {
    p_user_id: &'a str,
    p_delta: u32,
}

#[async_trait::async_trait]
impl LearnStore for RestStore {
    async fn fetch_quiz_metadata(&self, quiz_id: &str) -> Result<QuizMetadata, StoreError> {
        let rows: Vec<QuizMetadata> = self
            .get_rows("quizzes", &[("id", format!("eq.{quiz_id}")), ("limit", "1".into())])
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound { entity: "quiz", id: quiz_id.to_string() })
    }

    async fn fetch_question_ids(
        &self,
        quiz_id: &str,
    ) -> Result<HashMap<QuestionKind, Vec<String>>, StoreError> {
        let rows: Vec<QuizQuestionRow> = self
            .get_rows(
                "quiz_questions",
                &[
                    ("quiz_id", format!("eq.{quiz_id}")),
                    ("select", "question_id,question_type".into()),
                ],
            )
            .await?;

        let mut partitions: HashMap<QuestionKind, Vec<String>> = HashMap::new();
        for row in rows {
            match QuestionKind::parse(&row.question_type) {
                Some(kind) => partitions.entry(kind).or_default().push(row.question_id),
                None => {
                    debug!(question_id = %row.question_id, kind = %row.question_type,
                        "skipping question with unknown type");
                }
            }
        }
        Ok(partitions)
    }

    async fn fetch_question_details(
        &self,
        kind: QuestionKind,
        ids: &[String],
    ) -> Result<Vec<QuestionRow>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = format!("questions_{kind}");
        self.get_rows(&table, &[("id", in_filter(ids))]).await
    }

    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<String, StoreError> {
        // Upsert on the client token so a retried commit lands on the same row
        let body = self
            .post(
                self.table_url("quiz_attempts"),
                &[("on_conflict", "client_token".into())],
                Some("resolution=merge-duplicates,return=representation"),
                attempt,
            )
            .await?;

        let rows: Vec<InsertedRow> = serde_json::from_str(&body)?;
        rows.into_iter().next().map(|r| r.id).ok_or(StoreError::Persistence {
            status: 200,
            message: "attempt insert returned no row".to_string(),
        })
    }

    async fn record_answers(
        &self,
        attempt_id: &str,
        answers: &[NewAnswer],
    ) -> Result<(), StoreError> {
        let rows: Vec<AnswerInsert<'_>> = answers
            .iter()
            .map(|a| AnswerInsert {
                attempt_id,
                question_id: &a.question_id,
                answer: &a.answer,
                is_correct: a.is_correct,
            })
            .collect();

        self.post(
            self.table_url("quiz_attempt_answers"),
            &[],
            Some("return=minimal"),
            &rows,
        )
        .await?;
        Ok(())
    }

    async fn increment_user_xp(&self, user_id: &str, delta: u32) -> Result<(), StoreError> {
        self.post(
            self.rpc_url("increment_user_xp"),
            &[],
            None,
            &XpIncrementArgs { p_user_id: user_id, p_delta: delta },
        )
        .await?;
        Ok(())
    }

    async fn upsert_module_progress(
        &self,
        user_id: &str,
        module_id: &str,
        status: ProgressStatus,
        xp_earned: u32,
    ) -> Result<(), StoreError> {
        let completed_at =
            (status == ProgressStatus::Completed).then(unix_timestamp);
        self.post(
            self.table_url("module_progress"),
            &[("on_conflict", "user_id,module_id".into())],
            Some("resolution=merge-duplicates,return=minimal"),
            &ModuleProgressUpsert { user_id, module_id, status, xp_earned, completed_at },
        )
        .await?;
        Ok(())
    }

    async fn upsert_section_progress(
        &self,
        user_id: &str,
        section_id: &str,
        status: ProgressStatus,
    ) -> Result<(), StoreError> {
        let completed_at =
            (status == ProgressStatus::Completed).then(unix_timestamp);
        self.post(
            self.table_url("section_progress"),
            &[("on_conflict", "user_id,section_id".into())],
            Some("resolution=merge-duplicates,return=minimal"),
            &SectionProgressUpsert { user_id, section_id, status, completed_at },
        )
        .await?;
        Ok(())
    }

    async fn upsert_learner_progress(
        &self,
        user_id: &str,
        update: &LearnerProgressUpdate,
    ) -> Result<(), StoreError> {
        self.post(
            self.table_url("learner_progress"),
            &[("on_conflict", "user_id".into())],
            Some("resolution=merge-duplicates,return=minimal"),
            &LearnerProgressUpsert {
                user_id,
                current_section_id: update.current_section_id.as_deref(),
                current_module_id: update.current_module_id.as_deref(),
                module_completion_pct: update.module_completion_pct,
            },
        )
        .await?;
        Ok(())
    }

    async fn list_modules_in_section(
        &self,
        section_id: &str,
    ) -> Result<Vec<ModuleRef>, StoreError> {
        self.get_rows(
            "modules",
            &[
                ("section_id", format!("eq.{section_id}")),
                ("select", "id,sequence_number".into()),
                ("order", "sequence_number.asc".into()),
            ],
        )
        .await
    }

    async fn list_sections(&self) -> Result<Vec<SectionRef>, StoreError> {
        self.get_rows("sections", &[("select", "id,level".into()), ("order", "level.asc".into())])
            .await
    }
}
