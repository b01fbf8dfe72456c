//! Core trait definitions for the hosted services dailyprep talks to.
//!
//! These async traits are implemented by the `dailyprep-providers` crate:
//! a row store (Supabase), a push gateway (Expo), an answer evaluator
//! (Gemini), and an image host (Cloudinary).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{
    Comment, DailyRecord, Evaluation, MainsQuestion, PoolEntry, Post, PrelimsQuestion, PushToken,
    QuestionKind, UserProfile,
};

// ---------------------------------------------------------------------------
// Row store
// ---------------------------------------------------------------------------

/// A table-oriented row store.
///
/// Writes are plain last-write-wins; the only constraint implementations
/// must enforce is uniqueness of `date` in the daily tables, reported as
/// [`crate::error::StoreError::Conflict`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Human-readable backend name (e.g. "supabase").
    fn name(&self) -> &str;

    // --- daily assignment ---

    async fn daily_record(
        &self,
        kind: QuestionKind,
        date: NaiveDate,
    ) -> anyhow::Result<Option<DailyRecord>>;

    /// Every record ever assigned for `kind`.
    async fn daily_history(&self, kind: QuestionKind) -> anyhow::Result<Vec<DailyRecord>>;

    async fn insert_daily_record(
        &self,
        kind: QuestionKind,
        record: &DailyRecord,
    ) -> anyhow::Result<()>;

    // --- question datasets ---

    /// Ids of the full question pool for `kind`.
    async fn question_pool(&self, kind: QuestionKind) -> anyhow::Result<Vec<PoolEntry>>;

    async fn prelims_question(&self, id: &str) -> anyhow::Result<Option<PrelimsQuestion>>;

    async fn mains_question(&self, id: &str) -> anyhow::Result<Option<MainsQuestion>>;

    async fn insert_prelims_questions(&self, questions: &[PrelimsQuestion]) -> anyhow::Result<()>;

    // --- users ---

    async fn user(&self, id: &str) -> anyhow::Result<Option<UserProfile>>;

    async fn upsert_user(&self, user: &UserProfile) -> anyhow::Result<()>;

    // --- feed ---

    async fn insert_post(&self, post: &Post) -> anyhow::Result<()>;

    async fn post(&self, id: &str) -> anyhow::Result<Option<Post>>;

    async fn update_post(&self, post: &Post) -> anyhow::Result<()>;

    /// Posts ordered newest first.
    async fn posts_page(&self, offset: usize, limit: usize) -> anyhow::Result<Vec<Post>>;

    async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()>;

    /// Comments on a post, oldest first.
    async fn comments(&self, post_id: &str) -> anyhow::Result<Vec<Comment>>;

    // --- evaluations ---

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> anyhow::Result<()>;

    async fn evaluations_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Evaluation>>;

    // --- push tokens ---

    async fn push_tokens(&self) -> anyhow::Result<Vec<PushToken>>;

    async fn set_push_token_failures(&self, id: &str, failure_count: u32) -> anyhow::Result<()>;

    async fn delete_push_token(&self, id: &str) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Push gateway
// ---------------------------------------------------------------------------

/// A push notification service that accepts batches of messages.
#[async_trait]
pub trait PushGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Send one batch. Returns one ticket per message, in order.
    async fn send(&self, messages: &[PushMessage]) -> anyhow::Result<Vec<PushTicket>>;
}

/// A single push message in the Expo wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// Delivery receipt for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushTicket {
    Ok {
        #[serde(default)]
        id: String,
    },
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        details: Option<PushErrorDetails>,
    },
}

/// Machine-readable part of an error ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushErrorDetails {
    /// e.g. "DeviceNotRegistered", "MessageTooBig".
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Answer evaluator
// ---------------------------------------------------------------------------

/// A generative model that grades handwritten answers.
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier recorded on stored evaluations.
    fn model(&self) -> &str;

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<EvaluationReply>;
}

/// Prompt plus the answer photos.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub prompt: String,
    pub images: Vec<ImageData>,
}

/// Raw model reply; parsing into a rubric happens in [`crate::evaluation`].
#[derive(Debug, Clone)]
pub struct EvaluationReply {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
}

/// An image held in memory.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Guess the MIME type from the file extension.
    pub fn mime_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit('.')
            .next()
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "image/jpeg",
        }
    }
}

// ---------------------------------------------------------------------------
// Image host
// ---------------------------------------------------------------------------

/// Public image hosting for answer photos.
#[async_trait]
pub trait ImageHost: Send + Sync {
    fn name(&self) -> &str;

    /// Upload an image and return its public HTTPS URL.
    async fn upload(&self, image: &ImageData) -> anyhow::Result<String>;
}
