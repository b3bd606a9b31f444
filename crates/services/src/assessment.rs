//! HTTP boundary to the assessment service.
//!
//! The service owns all grading and timing authority; this module only moves
//! domain types across the wire. Failures carry the service's structured
//! error code so callers can react to the deadline race without parsing
//! message text.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quiz_core::model::{
    AnswerSheetId, AttemptId, AttemptResult, AttemptStatus, OptionId, Question, QuestionId,
    QuestionKind, QuestionOption, QuizAttempt, QuizId,
};

use crate::error::AssessmentError;

//
// ─── CONFIGURATION ─────────────────────────────────────────────────────────────
//

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Connection settings for the assessment service.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    base_url: String,
    bearer_token: String,
}

impl AssessmentConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Read the configuration from `QUIZ_API_BASE_URL` and `QUIZ_API_TOKEN`.
    ///
    /// Returns `None` when no token is set; the base URL falls back to a
    /// local development default.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let bearer_token = env::var("QUIZ_API_TOKEN").ok().filter(|t| !t.is_empty())?;
        let base_url =
            env::var("QUIZ_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self::new(base_url, bearer_token))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct StartAttemptRequest<'a> {
    quiz_id: QuizId,
    quiz_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct OptionDto {
    id: OptionId,
    option_text: String,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: QuestionId,
    question_text: String,
    points: u32,
    question_type: QuestionKind,
    options: Vec<OptionDto>,
}

#[derive(Debug, Deserialize)]
struct AttemptDto {
    answer_sheet_id: AnswerSheetId,
    quiz_title: String,
    quiz_questions: Vec<QuestionDto>,
    total_points: u32,
    time_start: DateTime<Utc>,
    time_limit: String,
}

impl AttemptDto {
    fn into_attempt(self) -> Result<QuizAttempt, AssessmentError> {
        let mut questions = Vec::with_capacity(self.quiz_questions.len());
        for dto in self.quiz_questions {
            let options = dto
                .options
                .into_iter()
                .map(|o| QuestionOption::new(o.id, o.option_text))
                .collect();
            questions.push(
                Question::new(dto.id, dto.question_text, dto.points, dto.question_type, options)
                    .map_err(quiz_core::model::AttemptError::from)?,
            );
        }

        Ok(QuizAttempt::new(
            self.answer_sheet_id,
            self.quiz_title,
            questions,
            self.total_points,
            self.time_start,
            self.time_limit,
        )?)
    }
}

/// Payload for saving the current question's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveAnswerRequest {
    pub quiz_answer_sheet_id: AnswerSheetId,
    pub question_id: QuestionId,
    pub question_type: QuestionKind,
    pub selected_options_ids: Vec<OptionId>,
}

impl SaveAnswerRequest {
    /// Build the save payload for a question's current selection.
    ///
    /// An unanswered question submits an empty selection list; the service
    /// records it as answered-with-nothing.
    #[must_use]
    pub fn for_question(answer_sheet_id: AnswerSheetId, question: &Question) -> Self {
        Self {
            quiz_answer_sheet_id: answer_sheet_id,
            question_id: question.id(),
            question_type: question.kind(),
            selected_options_ids: question.selected_ids(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResultDto {
    id: AttemptId,
    quiz_id: QuizId,
    attempt_score: f64,
    total_points: u32,
    time_start: DateTime<Utc>,
    time_finish: DateTime<Utc>,
    status: AttemptStatus,
}

impl ResultDto {
    fn into_result(self) -> Result<AttemptResult, AssessmentError> {
        Ok(AttemptResult::new(
            self.id,
            self.quiz_id,
            self.attempt_score,
            self.total_points,
            self.time_start,
            self.time_finish,
            self.status,
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Coded { code: String, message: String },
    Message(String),
}

/// Map a non-success response onto a domain error.
///
/// The service reports rejections as `{"detail": {"code", "message"}}`; the
/// code is the contract, the message is display-only. Bodies that do not
/// parse fall back to the bare HTTP status.
fn classify_failure(status: StatusCode, body: &str) -> AssessmentError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            detail: ApiErrorDetail::Coded { code, message },
        }) => match code.as_str() {
            "already_finished" => AssessmentError::AlreadyFinished,
            "time_window_closed" => AssessmentError::TimeWindowClosed,
            _ => AssessmentError::Rejected { message },
        },
        Ok(ApiErrorBody {
            detail: ApiErrorDetail::Message(message),
        }) => AssessmentError::Rejected { message },
        Err(_) => AssessmentError::Status(status),
    }
}

//
// ─── API CONTRACT ──────────────────────────────────────────────────────────────
//

/// The three calls the session engine makes against the assessment service.
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    /// Open a fresh answer sheet for the given quiz.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` when the service rejects the key, the
    /// request fails, or the response violates an attempt invariant.
    async fn start_attempt(
        &self,
        quiz_id: QuizId,
        quiz_key: &str,
    ) -> Result<QuizAttempt, AssessmentError>;

    /// Persist one question's selection server-side.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` when the service rejects the answer or the
    /// request fails.
    async fn save_answer(&self, request: &SaveAnswerRequest) -> Result<(), AssessmentError>;

    /// Close the answer sheet and retrieve the scored result.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AlreadyFinished` or
    /// `AssessmentError::TimeWindowClosed` when the sheet is already settled
    /// server-side, and other variants for transport or payload failures.
    async fn finish_attempt(
        &self,
        answer_sheet_id: AnswerSheetId,
    ) -> Result<AttemptResult, AssessmentError>;
}

//
// ─── REQWEST CLIENT ────────────────────────────────────────────────────────────
//

/// `reqwest`-backed implementation of [`AssessmentApi`].
pub struct AssessmentClient {
    client: Client,
    config: AssessmentConfig,
}

impl AssessmentClient {
    #[must_use]
    pub fn new(config: AssessmentConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build a client from the environment, or `None` when no token is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        AssessmentConfig::from_env().map(Self::new)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    async fn reject(response: reqwest::Response) -> AssessmentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_failure(status, &body)
    }
}

#[async_trait]
impl AssessmentApi for AssessmentClient {
    async fn start_attempt(
        &self,
        quiz_id: QuizId,
        quiz_key: &str,
    ) -> Result<QuizAttempt, AssessmentError> {
        debug!(%quiz_id, "starting attempt");

        let response = self
            .client
            .post(self.url("/api/v1/answersheet/attempt"))
            .bearer_auth(&self.config.bearer_token)
            .json(&StartAttemptRequest { quiz_id, quiz_key })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        response.json::<AttemptDto>().await?.into_attempt()
    }

    async fn save_answer(&self, request: &SaveAnswerRequest) -> Result<(), AssessmentError> {
        debug!(question_id = %request.question_id, "saving answer");

        let response = self
            .client
            .post(self.url("/api/v1/answersheet/answer_slot/save"))
            .bearer_auth(&self.config.bearer_token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        Ok(())
    }

    async fn finish_attempt(
        &self,
        answer_sheet_id: AnswerSheetId,
    ) -> Result<AttemptResult, AssessmentError> {
        debug!(%answer_sheet_id, "finishing attempt");

        let response = self
            .client
            .patch(self.url(&format!(
                "/api/v1/answersheet/{}/finish",
                answer_sheet_id.value()
            )))
            .bearer_auth(&self.config.bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        response.json::<ResultDto>().await?.into_result()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
