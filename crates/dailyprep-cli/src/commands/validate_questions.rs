//! The `dailyprep validate-questions` command.

use std::path::PathBuf;

use anyhow::Result;

use dailyprep_core::dataset::{load_questions, validate_questions};

pub fn execute(file: PathBuf) -> Result<()> {
    let questions = load_questions(&file)?;
    println!("Dataset: {} ({} questions)", file.display(), questions.len());

    let warnings = validate_questions(&questions);
    let mut blocking = 0;
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        let level = if w.blocking { "ERROR" } else { "WARNING" };
        println!("{prefix} {level}: {}", w.message);
        if w.blocking {
            blocking += 1;
        }
    }

    if warnings.is_empty() {
        println!("All questions valid.");
    } else {
        println!("\n{} problem(s) found.", warnings.len());
    }
    if blocking > 0 {
        anyhow::bail!("{blocking} blocking problem(s) in {}", file.display());
    }

    Ok(())
}
