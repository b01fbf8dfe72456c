//! Error types.
//!
//! Store and provider errors are defined here so the jobs in this crate can
//! downcast and classify failures (a unique-key conflict, a dead push token)
//! without string matching.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::QuestionKind;

/// Errors returned by a row store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (HTTP 409 from PostgREST).
    #[error("conflict on {table}: {message}")]
    Conflict { table: String, message: String },

    /// The addressed row does not exist.
    #[error("{table} row not found: {id}")]
    NotFound { table: String, id: String },

    /// Authentication failed (invalid service key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl StoreError {
    /// Returns `true` for a unique-constraint conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Errors from the external HTTP services (push gateway, AI evaluator, image host).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key or access token).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::MalformedResponse(_)
        )
    }
}

/// Daily assignment failures.
#[derive(Debug, Error)]
pub enum AssignError {
    /// Every question in the pool already appears in the history table.
    #[error("no unused {kind} question left (pool of {pool_size} fully assigned)")]
    PoolExhausted { kind: QuestionKind, pool_size: usize },
}

/// Rejected user submissions.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("user not found: {0}")]
    UnknownUser(String),

    #[error("question not found: {0}")]
    UnknownQuestion(String),

    /// One submission per user per day.
    #[error("already submitted for {0}")]
    AlreadySubmitted(NaiveDate),

    #[error("option {selected} out of range (question has {available} options)")]
    InvalidOption { selected: usize, available: usize },

    #[error("an answer copy needs at least one image")]
    NoImages,

    #[error("{question_id} is not the question assigned for {date}")]
    NotAssigned { question_id: String, date: NaiveDate },
}

/// Rejected feed actions.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("post not found: {0}")]
    UnknownPost(String),

    #[error("no answer copy for {0} to share")]
    NothingToShare(NaiveDate),

    #[error("comment must be between 1 and {max} characters")]
    InvalidComment { max: usize },

    #[error("page size must be between 1 and {max}")]
    InvalidPageSize { max: usize },

    #[error("page {0} is out of range")]
    InvalidPage(usize),
}

/// Evaluation failures.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// No JSON object could be found in the evaluator's reply.
    #[error("evaluator reply contains no JSON object")]
    NoJson,

    /// The JSON did not match the rubric schema.
    #[error("rubric does not match schema: {0}")]
    Schema(String),

    /// The rubric parsed but its numbers are inconsistent.
    #[error("invalid rubric: {0}")]
    InvalidRubric(String),

    #[error("reviewers cannot evaluate their own answer")]
    SelfReview,

    #[error("user {user_id} has no answer copy for {date}")]
    NoAnswerCopy { user_id: String, date: NaiveDate },
}
