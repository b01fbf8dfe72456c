pub mod assign;
pub mod evaluate;
pub mod feed;
pub mod init;
pub mod push;
pub mod review;
pub mod stats;
pub mod streak;
pub mod submit_prelims;
pub mod upload_questions;
pub mod validate_questions;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use dailyprep_core::assign::today_in;
use dailyprep_core::traits::Store;
use dailyprep_providers::config::load_config_from;
use dailyprep_providers::{create_store, DailyprepConfig};

/// Load the config and connect to the configured store.
pub(crate) fn open_store(config_path: Option<&Path>) -> Result<(DailyprepConfig, Arc<dyn Store>)> {
    let config = load_config_from(config_path)?;
    let store = create_store(&config)?;
    Ok((config, store))
}

/// The given date, or today in the configured calendar.
pub(crate) fn date_or_today(date: Option<NaiveDate>, config: &DailyprepConfig) -> NaiveDate {
    date.unwrap_or_else(|| today_in(config.utc_offset_minutes))
}
