//! Daily question assignment.
//!
//! Once per calendar date, pick a question that has never been assigned
//! before and record it in the kind's daily table.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::instrument;

use crate::error::{AssignError, StoreError};
use crate::model::{DailyRecord, PoolEntry, QuestionKind};
use crate::traits::Store;

/// India Standard Time, the default calendar for daily questions.
pub const IST_OFFSET_MINUTES: i32 = 5 * 60 + 30;

/// Result of an assignment run.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    /// A new question was written for the date.
    Assigned(DailyRecord),
    /// The date already had a question; nothing was written.
    AlreadyAssigned(DailyRecord),
}

impl AssignOutcome {
    pub fn record(&self) -> &DailyRecord {
        match self {
            AssignOutcome::Assigned(r) | AssignOutcome::AlreadyAssigned(r) => r,
        }
    }
}

/// Today's calendar date at a fixed UTC offset.
pub fn today_in(offset_minutes: i32) -> NaiveDate {
    match FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Pick a pool entry whose id is not in `used`, uniformly at random.
pub fn pick_unused<'a, R: Rng + ?Sized>(
    pool: &'a [PoolEntry],
    used: &HashSet<&str>,
    rng: &mut R,
) -> Option<&'a PoolEntry> {
    let candidates: Vec<&PoolEntry> = pool
        .iter()
        .filter(|q| !used.contains(q.id.as_str()))
        .collect();
    candidates.choose(rng).copied()
}

/// Assign a question of `kind` to `date`, unless one is already assigned.
///
/// Losing the race against a concurrent run shows up as a unique conflict on
/// insert; the winner's row is read back and reported as `AlreadyAssigned`.
#[instrument(skip(store, rng), fields(store = store.name()))]
pub async fn assign_daily<R: Rng + Send + ?Sized>(
    store: &dyn Store,
    kind: QuestionKind,
    date: NaiveDate,
    rng: &mut R,
) -> Result<AssignOutcome> {
    if let Some(existing) = store.daily_record(kind, date).await? {
        tracing::info!(question_id = %existing.question_id, "question already assigned");
        return Ok(AssignOutcome::AlreadyAssigned(existing));
    }

    let history = store
        .daily_history(kind)
        .await
        .with_context(|| format!("failed to load {} history", kind.daily_table()))?;
    let pool = store
        .question_pool(kind)
        .await
        .with_context(|| format!("failed to load {} pool", kind.dataset_table()))?;

    let used: HashSet<&str> = history.iter().map(|r| r.question_id.as_str()).collect();
    let picked = pick_unused(&pool, &used, rng).ok_or(AssignError::PoolExhausted {
        kind,
        pool_size: pool.len(),
    })?;

    tracing::debug!(
        pool = pool.len(),
        used = used.len(),
        picked = %picked.id,
        "picked unused question"
    );

    let record = DailyRecord {
        date,
        question_id: picked.id.clone(),
        created_at: Utc::now(),
    };

    match store.insert_daily_record(kind, &record).await {
        Ok(()) => {
            tracing::info!(question_id = %record.question_id, "assigned daily question");
            Ok(AssignOutcome::Assigned(record))
        }
        Err(e) if e.downcast_ref::<StoreError>().is_some_and(StoreError::is_conflict) => {
            tracing::warn!("lost assignment race, reading back winner");
            let winner = store
                .daily_record(kind, date)
                .await?
                .context("insert conflicted but no record exists for the date")?;
            Ok(AssignOutcome::AlreadyAssigned(winner))
        }
        Err(e) => Err(e),
    }
}
