//! Cursor command implementation.

use super::feed;
use pagefeed_consumer::{Cursor, CursorStore, FileCursorStore};
use std::path::Path;

/// Runs the cursor command.
pub fn run(
    path: &Path,
    consumer_id: &str,
    reset: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No feed found at {:?}", path).into());
    }
    let store = FileCursorStore::open(&feed::cursor_dir(path))?;

    if reset {
        store.save(&Cursor::new(consumer_id))?;
        println!("Reset cursor for {}", consumer_id);
        return Ok(());
    }

    let cursor = store
        .load(consumer_id)?
        .ok_or_else(|| format!("No cursor saved for consumer {:?}", consumer_id))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&cursor)?);
        }
        _ => {
            let last = cursor
                .last_processed
                .map_or_else(|| "none".to_string(), |p| p.to_string());
            println!("Consumer:        {}", cursor.consumer_id);
            println!("Last processed:  {}", last);
            println!("Next page:       {}", cursor.page_index);
        }
    }

    Ok(())
}
