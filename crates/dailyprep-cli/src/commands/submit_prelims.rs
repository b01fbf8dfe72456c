//! The `dailyprep submit-prelims` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use dailyprep_core::submission::submit_prelims;

use super::{date_or_today, open_store};

pub async fn execute(
    config_path: Option<PathBuf>,
    user: String,
    question_id: String,
    option: usize,
    date: Option<NaiveDate>,
) -> Result<()> {
    let (config, store) = open_store(config_path.as_deref())?;
    let date = date_or_today(date, &config);

    let submission =
        submit_prelims(store.as_ref(), &user, &question_id, option, date, &config.points).await?;
    let profile = store
        .user(&user)
        .await?
        .with_context(|| format!("user {user} disappeared after submitting"))?;

    let verdict = if submission.correct { "Correct" } else { "Incorrect" };
    println!("{verdict} answer for {question_id} on {date}");
    println!("Points: {}  Streak: {} day(s)", profile.points, profile.streak);
    Ok(())
}
