//! The `dailyprep review` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use dailyprep_core::evaluation::{parse_rubric, submit_peer_evaluation};

use super::{date_or_today, open_store};

pub async fn execute(
    config_path: Option<PathBuf>,
    reviewer: String,
    author: String,
    rubric_path: PathBuf,
    date: Option<NaiveDate>,
) -> Result<()> {
    let content = std::fs::read_to_string(&rubric_path)
        .with_context(|| format!("failed to read rubric: {}", rubric_path.display()))?;
    let rubric = parse_rubric(&content)
        .with_context(|| format!("invalid rubric: {}", rubric_path.display()))?;

    let (config, store) = open_store(config_path.as_deref())?;
    let date = date_or_today(date, &config);

    let evaluation =
        submit_peer_evaluation(store.as_ref(), &reviewer, &author, date, rubric).await?;
    println!(
        "Stored review of {author}'s answer to {} on {date}: {:.1}/{:.1} ({:.0}%)",
        evaluation.question_id,
        evaluation.rubric.total_score,
        evaluation.rubric.max_score,
        evaluation.rubric.percent()
    );
    Ok(())
}
