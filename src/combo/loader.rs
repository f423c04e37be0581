//! Combo File Loading
//!
//! Plain-text reader for combo lists. Out of scope per spec §1 beyond this
//! narrow collaborator: one `username:password` pair per line, malformed
//! lines skipped and counted rather than failing the whole load.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use super::Combo;
use crate::Result;

/// Result of loading a combo file: the parsed combos plus how many lines
/// were skipped as malformed.
#[derive(Debug)]
pub struct ComboLoadResult {
    pub combos: Vec<Combo>,
    pub skipped: usize,
}

/// Load combos from a plain-text file, one `username:password` per line.
pub async fn load_combos(path: impl AsRef<Path>) -> Result<ComboLoadResult> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read combo file {}: {}", path.display(), e))?;

    let mut combos = Vec::new();
    let mut skipped = 0usize;

    for line in contents.lines() {
        match Combo::parse(line) {
            Some(combo) => combos.push(combo),
            None if line.trim().is_empty() => {}
            None => {
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed combo lines");
    }
    debug!(loaded = combos.len(), path = %path.display(), "loaded combo file");

    Ok(ComboLoadResult { combos, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn loads_and_skips_malformed_lines() {
        let mut file = NamedTempFile::new().unwrap();
        let mut handle = tokio::fs::File::from_std(file.reopen().unwrap());
        handle
            .write_all(b"alice:pw1\n\nno-colon-here\nbob:pw2\n")
            .await
            .unwrap();
        handle.flush().await.unwrap();
        drop(handle);

        let result = load_combos(file.path()).await.unwrap();
        assert_eq!(result.combos.len(), 2);
        assert_eq!(result.skipped, 1);
        file.close().unwrap();
    }
}
