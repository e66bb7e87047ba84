//! Allocate command implementation.

use super::feed;
use pagefeed_core::AllocationReport;
use std::path::Path;

/// Runs the allocate command.
pub fn run(path: &Path, page_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let server = feed::open(path, page_size, false)?;
    print_report(&server.allocate()?);
    Ok(())
}

pub(crate) fn print_report(report: &AllocationReport) {
    match (report.first, report.last) {
        (Some(first), Some(last)) => println!(
            "Assigned {} positions ({}..={}) in {} round(s)",
            report.assigned, first, last, report.attempts
        ),
        _ => println!("No pending entries"),
    }
}
