//! Download ledger maintained by youtube-dl
//!
//! youtube-dl appends one `<origin> <id>` line to its archive file for every
//! completed download. This process only ever reads the file; the external
//! tool is its sole writer and creates it lazily on the first success.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Archive file name inside each destination directory
pub const ARCHIVE_FILE: &str = "downloaded.txt";

/// Origin tag youtube-dl writes for YouTube downloads
const YOUTUBE_ORIGIN: &str = "youtube";

/// Path of the ledger file for a destination directory
pub fn archive_path(dir: &Path) -> PathBuf {
    dir.join(ARCHIVE_FILE)
}

/// Ids of already-downloaded YouTube tracks for a destination directory.
///
/// A missing file is an empty ledger. Lines with fewer than two fields are
/// skipped, extra fields beyond the second are ignored, and only lines with
/// the `youtube` origin tag count.
pub async fn completed(dir: &Path) -> std::io::Result<HashSet<String>> {
    let path = archive_path(dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };

    let mut ids = HashSet::new();
    for line in content.lines() {
        let mut fields = line.split(' ');
        let (Some(origin), Some(id)) = (fields.next(), fields.next()) else {
            continue;
        };
        if origin == YOUTUBE_ORIGIN && !id.is_empty() {
            ids.insert(id.to_string());
        }
    }

    debug!("Loaded {} completed ids from {}", ids.len(), path.display());
    Ok(ids)
}
