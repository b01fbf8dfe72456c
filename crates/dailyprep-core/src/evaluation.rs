//! AI and peer evaluation of Mains answers.
//!
//! The AI path builds a fixed-rubric prompt, sends it with the answer photos,
//! and parses the model's JSON reply into a [`Rubric`]. Peer reviews use the
//! same rubric and the same validation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{EvaluationError, SubmissionError};
use crate::model::{AnswerCopy, Evaluation, EvaluationSource, MainsQuestion, Rubric};
use crate::submission::{record_answer_copy, PointsPolicy};
use crate::traits::{AnswerEvaluator, EvaluationRequest, ImageData, ImageHost, Store};

/// Criteria every evaluation scores, each out of [`CRITERION_MAX`].
pub const CRITERIA: [&str; 5] = [
    "Understanding of the demand",
    "Content and depth",
    "Structure and presentation",
    "Examples and evidence",
    "Conclusion and way forward",
];

pub const CRITERION_MAX: f64 = 2.0;

/// Tolerance when checking the total against the criteria sum.
const SCORE_EPSILON: f64 = 0.05;

/// Build the evaluator prompt for a Mains question.
pub fn build_prompt(question: &MainsQuestion) -> String {
    let mut prompt = String::from(
        "You are an experienced UPSC Civil Services Mains examiner. \
         The attached images are photos of a candidate's handwritten answer.\n\n",
    );
    prompt.push_str(&format!("Question: {}\n", question.question.trim()));
    if let Some(paper) = &question.paper {
        prompt.push_str(&format!("Paper: {paper}\n"));
    }
    if let Some(marks) = question.marks {
        prompt.push_str(&format!("Marks: {marks}\n"));
    }
    if let Some(limit) = question.word_limit {
        prompt.push_str(&format!("Word limit: {limit}\n"));
    }

    prompt.push_str("\nScore the answer on these criteria, each out of ");
    prompt.push_str(&format!("{CRITERION_MAX}:\n"));
    for name in CRITERIA {
        prompt.push_str(&format!("- {name}\n"));
    }
    let max_total = CRITERION_MAX * CRITERIA.len() as f64;
    prompt.push_str(&format!(
        "\nIf the images are unreadable or unrelated to the question, give every criterion 0.\n\
         Respond ONLY with a JSON object of this exact shape:\n\
         {{\"total_score\": number, \"max_score\": {max_total}, \
         \"criteria\": [{{\"name\": string, \"score\": number, \"max_score\": {CRITERION_MAX}, \"comment\": string}}], \
         \"strengths\": [string], \"improvements\": [string], \"summary\": string}}\n"
    ));
    prompt
}

/// Extract the JSON object from a model reply.
///
/// Candidates, in order of preference:
/// - a ```json fenced block
/// - a bare ``` fenced block
/// - the span from the first `{` to the last `}`
///
/// The first candidate that parses as JSON wins.
pub fn extract_json_block(reply: &str) -> Option<String> {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in reply.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    let brace_span = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(reply[start..=end].to_string()),
        _ => None,
    };

    // First candidate that is valid JSON; otherwise the first candidate, so
    // the schema error names what the model actually sent.
    let candidates: Vec<String> = json_blocks
        .into_iter()
        .chain(generic_blocks)
        .chain(brace_span)
        .collect();
    candidates
        .iter()
        .find(|c| serde_json::from_str::<serde_json::Value>(c).is_ok())
        .or(candidates.first())
        .cloned()
}

/// Check a rubric's numbers, fixing a total that disagrees with its criteria.
pub fn validate_rubric(mut rubric: Rubric) -> Result<Rubric, EvaluationError> {
    if rubric.criteria.is_empty() {
        return Err(EvaluationError::InvalidRubric("no criteria".into()));
    }
    for c in &rubric.criteria {
        if !(c.max_score > 0.0) {
            return Err(EvaluationError::InvalidRubric(format!(
                "criterion '{}' has non-positive max_score",
                c.name
            )));
        }
        if !(0.0..=c.max_score).contains(&c.score) {
            return Err(EvaluationError::InvalidRubric(format!(
                "criterion '{}' scored {} outside 0..={}",
                c.name, c.score, c.max_score
            )));
        }
    }

    let criteria_sum: f64 = rubric.criteria.iter().map(|c| c.score).sum();
    let criteria_max: f64 = rubric.criteria.iter().map(|c| c.max_score).sum();
    if (rubric.total_score - criteria_sum).abs() > SCORE_EPSILON {
        tracing::warn!(
            reported = rubric.total_score,
            computed = criteria_sum,
            "rubric total disagrees with criteria, using criteria sum"
        );
        rubric.total_score = criteria_sum;
    }
    if !(rubric.max_score > 0.0) {
        rubric.max_score = criteria_max;
    }
    if rubric.total_score > rubric.max_score + SCORE_EPSILON {
        return Err(EvaluationError::InvalidRubric(format!(
            "total {} exceeds max {}",
            rubric.total_score, rubric.max_score
        )));
    }
    Ok(rubric)
}

/// Parse and validate an evaluator reply.
pub fn parse_rubric(reply: &str) -> Result<Rubric, EvaluationError> {
    let json = extract_json_block(reply).ok_or(EvaluationError::NoJson)?;
    let rubric: Rubric =
        serde_json::from_str(&json).map_err(|e| EvaluationError::Schema(e.to_string()))?;
    validate_rubric(rubric)
}

/// Build a peer evaluation, rejecting self-review.
pub fn peer_evaluation(
    reviewer_id: &str,
    author_id: &str,
    question_id: &str,
    date: NaiveDate,
    rubric: Rubric,
) -> Result<Evaluation, EvaluationError> {
    if reviewer_id == author_id {
        return Err(EvaluationError::SelfReview);
    }
    Ok(Evaluation {
        id: Uuid::new_v4().to_string(),
        user_id: author_id.to_string(),
        question_id: question_id.to_string(),
        date,
        source: EvaluationSource::Peer {
            reviewer_id: reviewer_id.to_string(),
        },
        rubric: validate_rubric(rubric)?,
        created_at: Utc::now(),
    })
}

/// Store a peer review of the author's answer copy for `date`.
#[instrument(skip(store, rubric), fields(store = store.name()))]
pub async fn submit_peer_evaluation(
    store: &dyn Store,
    reviewer_id: &str,
    author_id: &str,
    date: NaiveDate,
    rubric: Rubric,
) -> Result<Evaluation> {
    if reviewer_id == author_id {
        return Err(EvaluationError::SelfReview.into());
    }
    let author = store
        .user(author_id)
        .await?
        .ok_or_else(|| SubmissionError::UnknownUser(author_id.to_string()))?;
    let copy = author
        .mains_answer_copies
        .get(&date)
        .ok_or_else(|| EvaluationError::NoAnswerCopy {
            user_id: author_id.to_string(),
            date,
        })?;

    let evaluation = peer_evaluation(reviewer_id, author_id, &copy.question_id, date, rubric)?;
    store.insert_evaluation(&evaluation).await?;

    tracing::info!(percent = evaluation.rubric.percent(), "stored peer evaluation");
    Ok(evaluation)
}

/// Aggregate scores across a user's evaluations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationStats {
    pub count: usize,
    pub ai_count: usize,
    pub peer_count: usize,
    pub average_percent: f64,
    pub best_percent: f64,
    /// Average percent per criterion name.
    pub per_criterion: BTreeMap<String, f64>,
}

/// Compute [`EvaluationStats`]. Empty input gives all zeros.
pub fn evaluation_stats(evaluations: &[Evaluation]) -> EvaluationStats {
    if evaluations.is_empty() {
        return EvaluationStats::default();
    }

    let mut stats = EvaluationStats {
        count: evaluations.len(),
        ..Default::default()
    };
    let mut criterion_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut percent_sum = 0.0;

    for e in evaluations {
        match e.source {
            EvaluationSource::Ai { .. } => stats.ai_count += 1,
            EvaluationSource::Peer { .. } => stats.peer_count += 1,
        }
        let percent = e.rubric.percent();
        percent_sum += percent;
        stats.best_percent = stats.best_percent.max(percent);

        for c in &e.rubric.criteria {
            if c.max_score <= 0.0 {
                continue;
            }
            let entry = criterion_sums.entry(c.name.clone()).or_insert((0.0, 0));
            entry.0 += c.score / c.max_score * 100.0;
            entry.1 += 1;
        }
    }

    stats.average_percent = percent_sum / evaluations.len() as f64;
    stats.per_criterion = criterion_sums
        .into_iter()
        .map(|(name, (sum, n))| (name, sum / n as f64))
        .collect();
    stats
}

/// Outcome of [`evaluate_answer`].
#[derive(Debug, Clone)]
pub struct EvaluatedAnswer {
    pub copy: AnswerCopy,
    pub evaluation: Evaluation,
}

/// Upload answer photos, grade them, then record the answer copy and the
/// AI evaluation.
///
/// A failed or unparseable evaluation leaves the user free to resubmit.
#[allow(clippy::too_many_arguments)]
#[instrument(
    skip(store, evaluator, host, question, images, points),
    fields(store = store.name(), evaluator = evaluator.name(), question_id = %question.id)
)]
pub async fn evaluate_answer(
    store: &dyn Store,
    evaluator: &dyn AnswerEvaluator,
    host: &dyn ImageHost,
    user_id: &str,
    question: &MainsQuestion,
    images: Vec<ImageData>,
    date: NaiveDate,
    points: &PointsPolicy,
) -> Result<EvaluatedAnswer> {
    if images.is_empty() {
        return Err(SubmissionError::NoImages.into());
    }

    // Reject before uploading anything.
    let user = store
        .user(user_id)
        .await?
        .ok_or_else(|| SubmissionError::UnknownUser(user_id.to_string()))?;
    if user.mains_answer_copies.contains_key(&date) {
        return Err(SubmissionError::AlreadySubmitted(date).into());
    }

    let urls = try_join_all(images.iter().map(|img| host.upload(img)))
        .await
        .context("failed to upload answer images")?;
    tracing::info!(count = urls.len(), "uploaded answer images");

    let request = EvaluationRequest {
        prompt: build_prompt(question),
        images,
    };
    let reply = evaluator.evaluate(&request).await?;
    tracing::debug!(latency_ms = reply.latency_ms, "evaluator replied");
    let rubric = parse_rubric(&reply.text)?;

    // Only a successfully graded answer counts as the day's submission.
    let copy = record_answer_copy(store, user_id, &question.id, urls, date, points).await?;

    let evaluation = Evaluation {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        question_id: question.id.clone(),
        date,
        source: EvaluationSource::Ai { model: reply.model },
        rubric,
        created_at: Utc::now(),
    };
    store.insert_evaluation(&evaluation).await?;

    tracing::info!(percent = evaluation.rubric.percent(), "stored AI evaluation");
    Ok(EvaluatedAnswer { copy, evaluation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CriterionScore;

    fn rubric_json(total: f64) -> String {
        serde_json::json!({
            "total_score": total,
            "max_score": 10,
            "criteria": [
                {"name": "Content and depth", "score": 1.5, "max_score": 2, "comment": "good"},
                {"name": "Conclusion and way forward", "score": 1.0, "max_score": 2}
            ],
            "strengths": ["clear intro"],
            "improvements": ["add data"],
            "summary": "Decent attempt"
        })
        .to_string()
    }

    fn rubric(scores: &[(&str, f64)]) -> Rubric {
        Rubric {
            total_score: scores.iter().map(|(_, s)| s).sum(),
            max_score: CRITERION_MAX * scores.len() as f64,
            criteria: scores
                .iter()
                .map(|(n, s)| CriterionScore {
                    name: n.to_string(),
                    score: *s,
                    max_score: CRITERION_MAX,
                    comment: String::new(),
                })
                .collect(),
            strengths: vec![],
            improvements: vec![],
            summary: String::new(),
        }
    }

    #[test]
    fn prompt_names_question_and_criteria() {
        let q = MainsQuestion {
            id: "m1".into(),
            question: "Discuss cooperative federalism.".into(),
            paper: Some("GS2".into()),
            marks: Some(15),
            word_limit: Some(250),
        };
        let prompt = build_prompt(&q);
        assert!(prompt.contains("Discuss cooperative federalism."));
        assert!(prompt.contains("Word limit: 250"));
        for name in CRITERIA {
            assert!(prompt.contains(name));
        }
        assert!(prompt.contains("\"total_score\""));
    }

    #[test]
    fn extract_prefers_json_fence() {
        let reply = "Here you go:\n```\n{\"a\": 1}\n```\n```json\n{\"b\": 2}\n```";
        assert_eq!(extract_json_block(reply).unwrap(), "{\"b\": 2}");
    }

    #[test]
    fn extract_bare_object() {
        let reply = "Sure! {\"a\": {\"b\": 1}} Hope this helps.";
        assert_eq!(extract_json_block(reply).unwrap(), "{\"a\": {\"b\": 1}}");
        assert!(extract_json_block("no json here").is_none());
    }

    #[test]
    fn extract_skips_fence_that_is_not_json() {
        let reply = format!("```\nNote: photo 2 is blurry\n```\n{}", rubric_json(2.5));
        let rubric = parse_rubric(&reply).unwrap();
        assert!((rubric.total_score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn parse_valid_reply() {
        let reply = format!("```json\n{}\n```", rubric_json(2.5));
        let rubric = parse_rubric(&reply).unwrap();
        assert_eq!(rubric.criteria.len(), 2);
        assert!((rubric.total_score - 2.5).abs() < 1e-9);
        assert_eq!(rubric.strengths, vec!["clear intro"]);
    }

    #[test]
    fn inconsistent_total_is_recomputed() {
        let rubric = parse_rubric(&rubric_json(7.0)).unwrap();
        assert!((rubric.total_score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_criterion_rejected() {
        let mut r = rubric(&[("Content and depth", 1.0)]);
        r.criteria[0].score = 3.0;
        r.total_score = 3.0;
        assert!(matches!(
            validate_rubric(r),
            Err(EvaluationError::InvalidRubric(_))
        ));
    }

    #[test]
    fn schema_mismatch_reported() {
        let err = parse_rubric("{\"score\": \"high\"}").unwrap_err();
        assert!(matches!(err, EvaluationError::Schema(_)));
    }

    #[test]
    fn peer_self_review_rejected() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let r = rubric(&[("Content and depth", 1.0)]);
        assert!(matches!(
            peer_evaluation("u1", "u1", "m1", date, r.clone()),
            Err(EvaluationError::SelfReview)
        ));
        let eval = peer_evaluation("u2", "u1", "m1", date, r).unwrap();
        assert_eq!(
            eval.source,
            EvaluationSource::Peer {
                reviewer_id: "u2".into()
            }
        );
    }

    #[test]
    fn stats_average_and_best() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let low = peer_evaluation("u2", "u1", "m1", date, rubric(&[("Content and depth", 0.5)]))
            .unwrap();
        let mut high = peer_evaluation("u3", "u1", "m1", date, rubric(&[("Content and depth", 1.5)]))
            .unwrap();
        high.source = EvaluationSource::Ai {
            model: "gemini".into(),
        };

        let stats = evaluation_stats(&[low, high]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.ai_count, 1);
        assert_eq!(stats.peer_count, 1);
        assert!((stats.average_percent - 50.0).abs() < 1e-9);
        assert!((stats.best_percent - 75.0).abs() < 1e-9);
        assert!((stats.per_criterion["Content and depth"] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn stats_empty() {
        assert_eq!(evaluation_stats(&[]), EvaluationStats::default());
    }
}
