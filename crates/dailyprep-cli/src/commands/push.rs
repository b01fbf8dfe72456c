//! The `dailyprep push` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use dailyprep_core::push::{daily_reminder, dispatch, Notification};
use dailyprep_providers::create_push_gateway;

use super::{date_or_today, open_store};

pub async fn execute(
    config_path: Option<PathBuf>,
    title: Option<String>,
    body: Option<String>,
    screen: Option<String>,
) -> Result<()> {
    let (config, store) = open_store(config_path.as_deref())?;
    let gateway = create_push_gateway(&config)?;
    let today = date_or_today(None, &config);

    let mut notification = daily_reminder(today);
    if let Some(title) = title {
        notification.title = title;
    }
    if let Some(body) = body {
        notification.body = body;
    }
    if let Some(screen) = screen {
        notification = Notification {
            data: serde_json::json!({ "screen": screen, "date": today.to_string() }),
            ..notification
        };
    }

    tracing::debug!(title = %notification.title, "dispatching notification");
    let summary = dispatch(store.as_ref(), gateway, &notification, &config.push).await?;

    let mut table = Table::new();
    table.set_header(vec!["Tokens", "Sent", "Failed", "Deleted", "Invalid", "Batches"]);
    table.add_row(vec![
        Cell::new(summary.total_tokens),
        Cell::new(summary.sent),
        Cell::new(summary.failed),
        Cell::new(summary.deleted),
        Cell::new(summary.invalid),
        Cell::new(summary.batches),
    ]);
    println!("{table}");

    Ok(())
}
