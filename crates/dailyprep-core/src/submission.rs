//! Per-day user activity: Prelims answers, Mains answer copies, points, streaks.
//!
//! Each user may submit once per track per calendar date. The user row is
//! read, changed in memory, and written back whole.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::SubmissionError;
use crate::model::{AnswerCopy, PrelimsSubmission, QuestionKind, UserProfile};
use crate::traits::Store;

/// Points awarded per activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointsPolicy {
    #[serde(default = "default_prelims_correct")]
    pub prelims_correct: i64,
    #[serde(default = "default_prelims_attempt")]
    pub prelims_attempt: i64,
    #[serde(default = "default_mains_submission")]
    pub mains_submission: i64,
}

fn default_prelims_correct() -> i64 {
    4
}
fn default_prelims_attempt() -> i64 {
    1
}
fn default_mains_submission() -> i64 {
    10
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self {
            prelims_correct: default_prelims_correct(),
            prelims_attempt: default_prelims_attempt(),
            mains_submission: default_mains_submission(),
        }
    }
}

/// Consecutive active days ending at `today`.
///
/// A streak that ended yesterday is still alive until today is over.
pub fn current_streak(dates_active: &BTreeMap<NaiveDate, bool>, today: NaiveDate) -> u32 {
    let active = |d: NaiveDate| dates_active.get(&d).copied().unwrap_or(false);

    let mut day = if active(today) {
        today
    } else {
        match today.pred_opt() {
            Some(d) => d,
            None => return 0,
        }
    };

    let mut streak = 0;
    while active(day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Add `amount` to the running total and the day's history entry.
pub fn award_points(user: &mut UserProfile, date: NaiveDate, amount: i64) {
    user.points += amount;
    *user.points_history.entry(date).or_insert(0) += amount;
}

/// Mark `date` active and refresh the cached streak.
pub fn mark_active(user: &mut UserProfile, date: NaiveDate) {
    user.dates_active.insert(date, true);
    user.streak = current_streak(&user.dates_active, date);
}

async fn load_user(store: &dyn Store, user_id: &str) -> Result<UserProfile> {
    Ok(store
        .user(user_id)
        .await?
        .ok_or_else(|| SubmissionError::UnknownUser(user_id.to_string()))?)
}

/// Record a user's answer to the Prelims question assigned for `date`.
#[instrument(skip(store, points), fields(store = store.name()))]
pub async fn submit_prelims(
    store: &dyn Store,
    user_id: &str,
    question_id: &str,
    selected_option: usize,
    date: NaiveDate,
    points: &PointsPolicy,
) -> Result<PrelimsSubmission> {
    let mut user = load_user(store, user_id).await?;
    if user.pre_submissions.contains_key(&date) {
        return Err(SubmissionError::AlreadySubmitted(date).into());
    }

    let assigned = store.daily_record(QuestionKind::Prelims, date).await?;
    if !assigned.is_some_and(|r| r.question_id == question_id) {
        return Err(SubmissionError::NotAssigned {
            question_id: question_id.to_string(),
            date,
        }
        .into());
    }

    let question = store
        .prelims_question(question_id)
        .await?
        .ok_or_else(|| SubmissionError::UnknownQuestion(question_id.to_string()))?;
    if selected_option >= question.options.len() {
        return Err(SubmissionError::InvalidOption {
            selected: selected_option,
            available: question.options.len(),
        }
        .into());
    }

    let correct = selected_option == question.answer;
    let submission = PrelimsSubmission {
        question_id: question.id.clone(),
        selected_option,
        correct,
        submitted_at: Utc::now(),
    };

    user.pre_submissions.insert(date, submission.clone());
    let amount = if correct {
        points.prelims_correct
    } else {
        points.prelims_attempt
    };
    award_points(&mut user, date, amount);
    mark_active(&mut user, date);
    store.upsert_user(&user).await?;

    tracing::info!(correct, streak = user.streak, "prelims answer recorded");
    Ok(submission)
}

/// Record uploaded answer photos for the Mains question of `date`.
#[instrument(skip(store, image_urls, points), fields(store = store.name(), images = image_urls.len()))]
pub async fn record_answer_copy(
    store: &dyn Store,
    user_id: &str,
    question_id: &str,
    image_urls: Vec<String>,
    date: NaiveDate,
    points: &PointsPolicy,
) -> Result<AnswerCopy> {
    if image_urls.is_empty() {
        return Err(SubmissionError::NoImages.into());
    }
    let mut user = load_user(store, user_id).await?;
    if user.mains_answer_copies.contains_key(&date) {
        return Err(SubmissionError::AlreadySubmitted(date).into());
    }

    let copy = AnswerCopy {
        question_id: question_id.to_string(),
        image_urls,
        submitted_at: Utc::now(),
    };
    user.mains_answer_copies.insert(date, copy.clone());
    award_points(&mut user, date, points.mains_submission);
    mark_active(&mut user, date);
    store.upsert_user(&user).await?;

    tracing::info!(streak = user.streak, "mains answer copy recorded");
    Ok(copy)
}
