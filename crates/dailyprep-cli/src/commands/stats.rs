//! The `dailyprep stats` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use dailyprep_core::evaluation::evaluation_stats;

use super::open_store;

pub async fn execute(config_path: Option<PathBuf>, user: String) -> Result<()> {
    let (_, store) = open_store(config_path.as_deref())?;
    let profile = store
        .user(&user)
        .await?
        .with_context(|| format!("user not found: {user}"))?;
    let evaluations = store.evaluations_for_user(&user).await?;
    let stats = evaluation_stats(&evaluations);

    let attempted = profile.pre_submissions.len();
    let correct = profile.pre_submissions.values().filter(|s| s.correct).count();
    let accuracy = if attempted == 0 {
        0.0
    } else {
        correct as f64 / attempted as f64 * 100.0
    };

    println!("{} ({})", profile.name, profile.id);
    println!("Prelims: {correct}/{attempted} correct ({accuracy:.1}%)");
    println!(
        "Mains: {} answer(s), {} evaluation(s) ({} AI, {} peer)",
        profile.mains_answer_copies.len(),
        stats.count,
        stats.ai_count,
        stats.peer_count
    );

    if stats.count == 0 {
        return Ok(());
    }
    println!(
        "Average: {:.1}%  Best: {:.1}%",
        stats.average_percent, stats.best_percent
    );

    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Average"]);
    for (name, percent) in &stats.per_criterion {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{percent:.1}%"))]);
    }
    println!("{table}");
    Ok(())
}
