//! Atomic file replacement
//!
//! Downloaded frames are written to a `.part` sibling, synced, then renamed
//! over the destination. Readers of the destination only ever see a complete
//! old frame or a complete new one.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

/// Sibling path used while `path` is being written
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged: OsString = path.as_os_str().to_owned();
    staged.push(".part");
    PathBuf::from(staged)
}

/// Replace `path` with `content` in one rename
pub async fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staged = staging_path(path);
    let mut file = tokio::fs::File::create(&staged).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&staged, path).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(e);
    }
    Ok(())
}
