//! The `dailyprep evaluate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use dailyprep_core::evaluation::evaluate_answer;
use dailyprep_core::model::Rubric;
use dailyprep_core::traits::ImageData;
use dailyprep_providers::{create_evaluator, create_image_host};

use super::{date_or_today, open_store};

fn read_image(path: &Path) -> Result<ImageData> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("not a file path: {}", path.display()))?;
    Ok(ImageData {
        mime_type: ImageData::mime_for(&file_name).to_string(),
        file_name,
        bytes,
    })
}

pub async fn execute(
    config_path: Option<PathBuf>,
    user: String,
    question_id: String,
    images: Vec<PathBuf>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let images = images
        .iter()
        .map(|p| read_image(p))
        .collect::<Result<Vec<_>>>()?;

    let (config, store) = open_store(config_path.as_deref())?;
    let evaluator = create_evaluator(&config)?;
    let host = create_image_host(&config)?;
    let date = date_or_today(date, &config);

    let question = store
        .mains_question(&question_id)
        .await?
        .with_context(|| format!("mains question not found: {question_id}"))?;

    eprintln!(
        "Evaluating {} page(s) with {} ({})",
        images.len(),
        evaluator.name(),
        evaluator.model()
    );
    let result = evaluate_answer(
        store.as_ref(),
        evaluator.as_ref(),
        host.as_ref(),
        &user,
        &question,
        images,
        date,
        &config.points,
    )
    .await?;

    print_rubric(&result.evaluation.rubric);
    Ok(())
}

fn print_rubric(rubric: &Rubric) {
    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Score", "Comment"]);
    for c in &rubric.criteria {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(format!("{:.1}/{:.1}", c.score, c.max_score)),
            Cell::new(&c.comment),
        ]);
    }
    println!("{table}");
    println!(
        "Total: {:.1}/{:.1} ({:.0}%)",
        rubric.total_score,
        rubric.max_score,
        rubric.percent()
    );

    if !rubric.strengths.is_empty() {
        println!("\nStrengths:");
        for s in &rubric.strengths {
            println!("  + {s}");
        }
    }
    if !rubric.improvements.is_empty() {
        println!("\nImprovements:");
        for s in &rubric.improvements {
            println!("  - {s}");
        }
    }
    if !rubric.summary.is_empty() {
        println!("\n{}", rubric.summary);
    }
}
