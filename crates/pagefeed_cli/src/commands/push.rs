//! Push command implementation.

use super::feed;
use std::path::Path;

/// Runs the push command.
pub fn run(
    path: &Path,
    page_size: usize,
    contents: &[String],
    allocate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = feed::open(path, page_size, true)?;

    let payloads = contents.iter().map(|c| feed::parse_content(c)).collect();
    let pushed = server.push(payloads)?;
    println!("Pushed {} entries", pushed);

    if allocate {
        super::allocate::print_report(&server.allocate()?);
    }

    Ok(())
}
