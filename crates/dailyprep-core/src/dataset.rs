//! Prelims question dataset loading, validation, and upload.
//!
//! Dataset files are JSON arrays. The answer may be given as a zero-based
//! index, an option letter ("B"), or the exact option text.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::model::{PrelimsQuestion, QuestionKind};
use crate::traits::Store;

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    question: String,
    options: Vec<String>,
    answer: RawAnswer,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    year: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Index(usize),
    Label(String),
}

fn resolve_answer(answer: &RawAnswer, options: &[String]) -> Option<usize> {
    match answer {
        RawAnswer::Index(i) => Some(*i),
        RawAnswer::Label(label) => {
            let label = label.trim();
            if let Some(idx) = options.iter().position(|o| o.trim() == label) {
                return Some(idx);
            }
            let mut chars = label.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    Some((c.to_ascii_lowercase() as u8 - b'a') as usize)
                }
                _ => None,
            }
        }
    }
}

/// Parse a JSON dataset string.
pub fn parse_questions_str(content: &str, source: &Path) -> Result<Vec<PrelimsQuestion>> {
    let raw: Vec<RawQuestion> = serde_json::from_str(content)
        .with_context(|| format!("failed to parse JSON: {}", source.display()))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = resolve_answer(&q.answer, &q.options).with_context(|| {
                format!("question #{} has an unrecognised answer: {:?}", i + 1, q.answer)
            })?;
            Ok(PrelimsQuestion {
                id: q.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                question: q.question,
                options: q.options,
                answer,
                explanation: q.explanation,
                subject: q.subject,
                year: q.year,
            })
        })
        .collect()
}

/// Parse a JSON dataset file.
pub fn load_questions(path: &Path) -> Result<Vec<PrelimsQuestion>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file: {}", path.display()))?;
    parse_questions_str(&content, path)
}

/// A problem found in a dataset.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub question_id: Option<String>,
    pub message: String,
    /// Blocking problems keep the question out of an upload.
    pub blocking: bool,
}

/// Validate a dataset for common issues.
pub fn validate_questions(questions: &[PrelimsQuestion]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |q: &PrelimsQuestion, message: String, blocking: bool| {
        warnings.push(ValidationWarning {
            question_id: Some(q.id.clone()),
            message,
            blocking,
        });
    };

    let mut seen_ids = HashSet::new();
    for q in questions {
        if !seen_ids.insert(q.id.as_str()) {
            warn(q, format!("duplicate question ID: {}", q.id), true);
        }
        if q.question.trim().is_empty() {
            warn(q, "question text is empty".into(), true);
        }
        if q.options.len() < 2 {
            warn(q, format!("only {} option(s)", q.options.len()), true);
        }
        if q.answer >= q.options.len() {
            warn(q, format!("answer index {} out of range", q.answer), true);
        }

        let mut seen_options = HashSet::new();
        if q
            .options
            .iter()
            .any(|o| !seen_options.insert(o.trim().to_lowercase()))
        {
            warn(q, "duplicate option text".into(), false);
        }
    }

    warnings
}

/// Result of an upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    /// Questions held back by blocking validation warnings.
    pub rejected: usize,
    /// Questions whose id already exists in the pool.
    pub already_present: usize,
}

/// Insert valid, new questions in batches.
#[instrument(skip(store, questions), fields(store = store.name(), count = questions.len()))]
pub async fn upload_questions(
    store: &dyn Store,
    questions: &[PrelimsQuestion],
    batch_size: usize,
) -> Result<UploadSummary> {
    let blocked: HashSet<String> = validate_questions(questions)
        .into_iter()
        .filter(|w| w.blocking)
        .filter_map(|w| w.question_id)
        .collect();

    let existing: HashSet<String> = store
        .question_pool(QuestionKind::Prelims)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut summary = UploadSummary::default();
    let mut to_upload = Vec::new();
    for q in questions {
        if blocked.contains(&q.id) {
            summary.rejected += 1;
        } else if existing.contains(&q.id) {
            summary.already_present += 1;
        } else {
            to_upload.push(q.clone());
        }
    }

    for batch in to_upload.chunks(batch_size.max(1)) {
        store
            .insert_prelims_questions(batch)
            .await
            .with_context(|| format!("failed after uploading {} questions", summary.uploaded))?;
        summary.uploaded += batch.len();
        tracing::debug!(uploaded = summary.uploaded, "batch inserted");
    }

    tracing::info!(
        uploaded = summary.uploaded,
        rejected = summary.rejected,
        already_present = summary.already_present,
        "dataset upload complete"
    );
    Ok(summary)
}
