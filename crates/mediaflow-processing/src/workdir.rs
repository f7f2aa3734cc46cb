//! Per-job scratch directory.

use mediaflow_storage::keys::file_extension;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use uuid::Uuid;

/// Scratch directory `{root}/{asset_id}-{random}`, removed when dropped.
///
/// The random suffix keeps duplicate jobs for one asset out of each other's way.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub async fn create(root: &Path, asset_id: Uuid) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = Builder::new()
            .prefix(&format!("{}-", asset_id))
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `input{ext}`, keeping the original's extension so tools can sniff it.
    pub fn input_path(&self, original_filename: &str) -> PathBuf {
        self.path()
            .join(format!("input{}", file_extension(original_filename)))
    }
}
