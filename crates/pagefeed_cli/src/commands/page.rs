//! Page command implementation.

use super::feed::{self, Payload};
use pagefeed_protocol::FeedPage;
use std::path::Path;

/// Runs the page command.
pub fn run(
    path: &Path,
    page_size: usize,
    index: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = feed::open(path, page_size, false)?;
    let page = server.page(index)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        _ => {
            print_text_output(&page);
        }
    }

    Ok(())
}

fn print_text_output(page: &FeedPage<Payload>) {
    println!("Page {} ({} entries)", page.page, page.len());
    println!("==========================================");
    println!("Feed:    {}", page.meta.id);
    println!("Updated: {}", page.updated.to_rfc3339());
    for link in &page.links {
        println!("  {:<8} {}", link.rel.as_str(), page.meta.resolve(&link.href));
    }
    println!();

    for entry in &page.entries {
        let position = entry
            .position
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("{:>8}  {}  {}", position, entry.id, entry.content);
    }
}
