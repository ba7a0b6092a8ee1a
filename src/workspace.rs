use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// Directory all engine state lives under: `$GRAFT_DIR`, or `graft` inside
/// the system temp directory.
pub fn base_dir() -> PathBuf {
    match env::var_os("GRAFT_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => env::temp_dir().join("graft"),
    }
}

/// Destination reserved for explicitly archived variants. The engine only
/// exposes the location; writing there is an external collaborator's job.
pub fn saved_variants_dir() -> PathBuf {
    base_dir().join("saved_variants")
}

/// An isolated on-disk copy of a program's source tree.
///
/// Lives at `<base>/tmp_variants/<name>/<timestamp>-<unique>/`; the unique
/// suffix keeps programs constructed within the same second from colliding.
/// The directory is removed on disposal, or on drop if never disposed.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Copy the tree at `source_root` into a fresh workspace directory.
    pub fn create(source_root: &Path, name: &str, timestamp: u64) -> Result<Self> {
        let parent = base_dir().join("tmp_variants").join(name);
        fs::create_dir_all(&parent)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{timestamp}-"))
            .tempdir_in(&parent)?;

        copy_dir_recursive(source_root, dir.path())?;

        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_disposed(&self) -> bool {
        self.dir.is_none()
    }

    /// Overwrite one file, addressed relative to the workspace root. Parent
    /// directories are created as needed.
    pub fn write_file(&self, relative: &Path, text: &str) -> Result<()> {
        if self.dir.is_none() {
            return Err(Error::Validation(format!(
                "workspace {} is already disposed",
                self.path.display()
            )));
        }

        let target = self.path.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, text)?;
        Ok(())
    }

    /// Remove the workspace directory. A second call is a no-op.
    pub fn dispose(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

/// Recursively copy all files and directories from `src` into `dst`.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }

    Ok(())
}
