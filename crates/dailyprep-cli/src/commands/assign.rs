//! The `dailyprep assign` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::ValueEnum;
use comfy_table::{Cell, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dailyprep_core::assign::{assign_daily, AssignOutcome};
use dailyprep_core::model::QuestionKind;

use super::{date_or_today, open_store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Mains,
    Prelims,
    Both,
}

impl KindArg {
    fn kinds(self) -> &'static [QuestionKind] {
        match self {
            KindArg::Mains => &[QuestionKind::Mains],
            KindArg::Prelims => &[QuestionKind::Prelims],
            KindArg::Both => &[QuestionKind::Mains, QuestionKind::Prelims],
        }
    }
}

pub async fn execute(
    config_path: Option<PathBuf>,
    kind: KindArg,
    date: Option<NaiveDate>,
) -> Result<()> {
    let (config, store) = open_store(config_path.as_deref())?;
    let date = date_or_today(date, &config);
    let mut rng = StdRng::from_entropy();
    tracing::debug!(%date, store = store.name(), "running assignment");

    let mut table = Table::new();
    table.set_header(vec!["Kind", "Date", "Question", "Status"]);

    // Each track runs even if the other fails.
    let mut failures = 0;
    for &kind in kind.kinds() {
        match assign_daily(store.as_ref(), kind, date, &mut rng).await {
            Ok(outcome) => {
                let status = match &outcome {
                    AssignOutcome::Assigned(_) => "assigned",
                    AssignOutcome::AlreadyAssigned(_) => "already assigned",
                };
                table.add_row(vec![
                    Cell::new(kind),
                    Cell::new(date),
                    Cell::new(&outcome.record().question_id),
                    Cell::new(status),
                ]);
            }
            Err(e) => {
                eprintln!("{kind}: {e:#}");
                failures += 1;
            }
        }
    }

    println!("{table}");
    if failures > 0 {
        anyhow::bail!("{failures} assignment(s) failed");
    }
    Ok(())
}
