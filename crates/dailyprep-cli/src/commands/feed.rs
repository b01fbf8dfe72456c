//! The `dailyprep feed` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use dailyprep_core::feed::feed_page;

use super::open_store;

pub async fn execute(config_path: Option<PathBuf>, page: usize, page_size: usize) -> Result<()> {
    let (_, store) = open_store(config_path.as_deref())?;
    let posts = feed_page(store.as_ref(), page, page_size).await?;

    if posts.is_empty() {
        println!("No posts on page {page}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "User", "Question", "Caption", "Images", "Likes", "Comments"]);
    for p in &posts {
        table.add_row(vec![
            Cell::new(p.date),
            Cell::new(&p.user_id),
            Cell::new(&p.question_id),
            Cell::new(&p.caption),
            Cell::new(p.image_urls.len()),
            Cell::new(p.like_count),
            Cell::new(p.comment_count),
        ]);
    }
    println!("{table}");
    Ok(())
}
