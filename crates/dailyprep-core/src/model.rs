//! Core data model types for dailyprep.
//!
//! Every type here mirrors a database row. Field names match the column
//! names so rows round-trip through the PostgREST JSON API unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two daily practice tracks a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Long-form written answers.
    Mains,
    /// Multiple-choice questions.
    Prelims,
}

impl QuestionKind {
    /// Table holding one assigned question per calendar date.
    pub fn daily_table(self) -> &'static str {
        match self {
            QuestionKind::Mains => "daily_mains_questions",
            QuestionKind::Prelims => "daily_prelims_questions",
        }
    }

    /// Table holding the full question pool.
    pub fn dataset_table(self) -> &'static str {
        match self {
            QuestionKind::Mains => "dataset_mains_questions",
            QuestionKind::Prelims => "dataset_prelims_questions",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Mains => write!(f, "mains"),
            QuestionKind::Prelims => write!(f, "prelims"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mains" => Ok(QuestionKind::Mains),
            "prelims" | "pre" => Ok(QuestionKind::Prelims),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// A multiple-choice question from `dataset_prelims_questions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrelimsQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Index of the correct entry in `options`.
    pub answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

/// A long-form question from `dataset_mains_questions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainsQuestion {
    pub id: String,
    pub question: String,
    /// GS paper label, e.g. "GS2".
    #[serde(default)]
    pub paper: Option<String>,
    #[serde(default)]
    pub marks: Option<u32>,
    #[serde(default)]
    pub word_limit: Option<u32>,
}

/// The `id` projection of a dataset row, all assignment needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub id: String,
}

/// One assigned question for one calendar date. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub question_id: String,
    pub created_at: DateTime<Utc>,
}

/// A user's answer to the daily Prelims question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrelimsSubmission {
    pub question_id: String,
    pub selected_option: usize,
    pub correct: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Photos of a handwritten Mains answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCopy {
    pub question_id: String,
    pub image_urls: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A `users` row. The maps are JSONB columns keyed by ISO date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub pre_submissions: BTreeMap<NaiveDate, PrelimsSubmission>,
    #[serde(default)]
    pub mains_answer_copies: BTreeMap<NaiveDate, AnswerCopy>,
    #[serde(default)]
    pub points_history: BTreeMap<NaiveDate, i64>,
    #[serde(default)]
    pub dates_active: BTreeMap<NaiveDate, bool>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            streak: 0,
            points: 0,
            pre_submissions: BTreeMap::new(),
            mains_answer_copies: BTreeMap::new(),
            points_history: BTreeMap::new(),
            dates_active: BTreeMap::new(),
        }
    }
}

/// A shared answer in the community feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// One scored criterion of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub comment: String,
}

/// The fixed evaluation schema shared by AI and peer reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub total_score: f64,
    pub max_score: f64,
    pub criteria: Vec<CriterionScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl Rubric {
    /// Total score as a percentage of the maximum.
    pub fn percent(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        self.total_score / self.max_score * 100.0
    }
}

/// Who produced an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EvaluationSource {
    Ai { model: String },
    Peer { reviewer_id: String },
}

/// An `evaluations` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub date: NaiveDate,
    pub source: EvaluationSource,
    pub rubric: Rubric,
    pub created_at: DateTime<Utc>,
}

/// A `push_tokens` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    /// Consecutive failed deliveries.
    #[serde(default)]
    pub failure_count: u32,
    pub created_at: DateTime<Utc>,
}
