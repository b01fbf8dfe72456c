//! The `dailyprep streak` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use dailyprep_core::submission::current_streak;

use super::{date_or_today, open_store};

pub async fn execute(config_path: Option<PathBuf>, user: String) -> Result<()> {
    let (config, store) = open_store(config_path.as_deref())?;
    let profile = store
        .user(&user)
        .await?
        .with_context(|| format!("user not found: {user}"))?;

    // The stored streak is only refreshed on submission.
    let today = date_or_today(None, &config);
    let streak = current_streak(&profile.dates_active, today);

    println!("{} ({})", profile.name, profile.id);
    println!("Streak: {streak} day(s)");
    println!("Points: {}", profile.points);
    if let Some((date, _)) = profile.dates_active.iter().next_back() {
        println!("Last active: {date}");
    }
    Ok(())
}
