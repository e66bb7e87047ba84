//! Stats command implementation.

use super::feed;
use serde::Serialize;
use std::path::Path;

/// Feed statistics.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    /// Feed directory.
    pub path: String,
    /// Sequenced entries.
    pub total: u64,
    /// Entries waiting for a position.
    pub pending: usize,
    /// Entries per page.
    pub page_size: usize,
    /// Index of the oldest page.
    pub last_page_index: u64,
    /// Size of the feed log in bytes.
    pub log_size: u64,
}

/// Runs the stats command.
pub fn run(path: &Path, page_size: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let server = feed::open(path, page_size, false)?;
    let stats = server.stats()?;

    let log_size = std::fs::metadata(path.join("feed.log"))
        .map(|m| m.len())
        .unwrap_or(0);

    let result = StatsResult {
        path: path.display().to_string(),
        total: stats.total,
        pending: stats.pending,
        page_size: stats.page_size,
        last_page_index: stats.last_page_index,
        log_size,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Feed: {}", result.path);
            println!("==========================================");
            println!("  Entries:         {}", result.total);
            println!("  Pending:         {}", result.pending);
            println!("  Page size:       {}", result.page_size);
            println!("  Oldest page:     {}", result.last_page_index);
            println!("  Log size:        {} bytes", result.log_size);
        }
    }

    Ok(())
}
