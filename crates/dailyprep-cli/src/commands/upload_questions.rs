//! The `dailyprep upload-questions` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use dailyprep_core::dataset::{load_questions, upload_questions};

use super::open_store;

pub async fn execute(
    config_path: Option<PathBuf>,
    file: PathBuf,
    batch_size: Option<usize>,
) -> Result<()> {
    let questions = load_questions(&file)?;
    let (config, store) = open_store(config_path.as_deref())?;
    let batch_size = batch_size.unwrap_or(config.upload_batch_size);

    eprintln!(
        "Uploading {} questions from {} (batch size {batch_size})",
        questions.len(),
        file.display()
    );
    let summary = upload_questions(store.as_ref(), &questions, batch_size).await?;

    let mut table = Table::new();
    table.set_header(vec!["Uploaded", "Already present", "Rejected"]);
    table.add_row(vec![
        Cell::new(summary.uploaded),
        Cell::new(summary.already_present),
        Cell::new(summary.rejected),
    ]);
    println!("{table}");

    if summary.rejected > 0 {
        println!("Run `dailyprep validate-questions --file {}` for details.", file.display());
    }
    Ok(())
}
