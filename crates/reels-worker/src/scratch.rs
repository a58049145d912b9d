//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use reels_models::JobId;

/// Scratch space for one job's intermediate files.
///
/// The directory and everything in it is removed when the guard drops.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `{root}/{job_id}-XXXXXX`, creating `root` if needed.
    pub fn create(root: &Path, job_id: &JobId) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", job_id))
            .tempdir_in(root)?;
        debug!(job_id = %job_id, path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_is_keyed_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::from_string("job-11");

        let path = {
            let scratch = ScratchDir::create(&root.path().join("nested"), &job_id).unwrap();
            std::fs::write(scratch.join("voice.wav"), b"RIFF").unwrap();
            assert!(scratch
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("job-11-"));
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
    }
}
