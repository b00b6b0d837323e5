//! Per-test filesystem sandboxes and environment overlays
//!
//! A [`Sandbox`] is a uniquely named temporary directory plus a set of
//! environment variables (HOME, HISTFILE, PATH, ...) meant to be injected when
//! the child is spawned. It is removed when dropped, whatever the test outcome.

use crate::error::{HarnessError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SANDBOX_PREFIX: &str = "shell-conform-";

/// Allocate a fresh, uniquely named temporary directory
///
/// The directory outlives this call; pair it with [`destroy`].
pub fn create() -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(SANDBOX_PREFIX)
        .tempdir()
        .map_err(|e| HarnessError::sandbox(std::env::temp_dir(), e))?;
    Ok(dir.keep())
}

/// Recursively remove `path`; a missing path is not an error
pub fn destroy(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HarnessError::sandbox(path, e)),
    }
}

/// `mkdir -p`
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| HarnessError::sandbox(path, e))
}

/// Write `content` to `path`, creating parent directories as needed
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content).map_err(|e| HarnessError::sandbox(path, e))
}

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| HarnessError::sandbox(path, e))
}

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Whether the file at `path` has size zero
pub fn file_is_empty(path: &Path) -> Result<bool> {
    let metadata = fs::metadata(path).map_err(|e| HarnessError::sandbox(path, e))?;
    Ok(metadata.len() == 0)
}

/// An isolated directory tree plus the environment overlay that points into it
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    env: BTreeMap<String, String>,
    destroyed: bool,
}

impl Sandbox {
    pub fn create() -> Result<Self> {
        let root = create()?;
        debug!(root = %root.display(), "sandbox created");
        Ok(Self {
            root,
            env: BTreeMap::new(),
            destroyed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` inside the sandbox
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Environment overlay to hand to `ShellHarness::start`
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Create `<root>/<relative>` and point HOME at it
    pub fn overlay_home(&mut self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let home = self.join(relative);
        ensure_dir(&home)?;
        self.set_env("HOME", home.to_string_lossy());
        Ok(home)
    }

    /// Point HISTFILE at `<root>/<relative>` without creating it
    pub fn overlay_histfile(&mut self, relative: impl AsRef<Path>) -> PathBuf {
        let histfile = self.join(relative);
        self.set_env("HISTFILE", histfile.to_string_lossy());
        histfile
    }

    /// Prepend `<root>/<relative>` to the ambient PATH
    pub fn prepend_path(&mut self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let bin = self.join(relative);
        ensure_dir(&bin)?;
        let path = match std::env::var("PATH") {
            Ok(ambient) if !ambient.is_empty() => format!("{}:{}", bin.display(), ambient),
            _ => bin.display().to_string(),
        };
        self.set_env("PATH", path);
        Ok(bin)
    }

    pub fn ensure_dir(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.join(relative);
        ensure_dir(&path)?;
        Ok(path)
    }

    pub fn write_file(&self, relative: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.join(relative);
        write_file(&path, content)?;
        Ok(path)
    }

    pub fn read_file(&self, relative: impl AsRef<Path>) -> Result<String> {
        read_file(&self.join(relative))
    }

    pub fn file_exists(&self, relative: impl AsRef<Path>) -> bool {
        file_exists(&self.join(relative))
    }

    pub fn file_is_empty(&self, relative: impl AsRef<Path>) -> Result<bool> {
        file_is_empty(&self.join(relative))
    }

    /// Remove the tree now instead of at drop, surfacing any failure
    pub fn destroy(mut self) -> Result<()> {
        self.destroyed = true;
        destroy(&self.root)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        if let Err(e) = destroy(&self.root) {
            warn!(error = %e, "failed to remove sandbox");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let path = create().unwrap();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SANDBOX_PREFIX));

        destroy(&path).unwrap();
        assert!(!path.exists());
        // second destroy is a no-op
        destroy(&path).unwrap();
    }

    #[test]
    fn test_write_creates_parents() {
        let sandbox = Sandbox::create().unwrap();
        let path = sandbox.write_file("foo/bar/file", "Hello, World!").unwrap();

        assert!(path.starts_with(sandbox.path()));
        assert_eq!(sandbox.read_file("foo/bar/file").unwrap(), "Hello, World!");
        assert!(sandbox.file_exists("foo/bar"));
        assert!(!sandbox.file_is_empty("foo/bar/file").unwrap());
    }

    #[test]
    fn test_file_is_empty() {
        let sandbox = Sandbox::create().unwrap();
        sandbox.write_file("empty", "").unwrap();
        assert!(sandbox.file_is_empty("empty").unwrap());
        assert!(sandbox.file_is_empty("missing").is_err());
    }

    #[test]
    fn test_env_overlay() {
        let mut sandbox = Sandbox::create().unwrap();
        let home = sandbox.overlay_home("home/user").unwrap();
        let histfile = sandbox.overlay_histfile("home/user/.history");
        sandbox.set_env("LANG", "C");

        assert!(home.is_dir());
        assert!(!histfile.exists());
        assert_eq!(sandbox.env()["HOME"], home.to_string_lossy());
        assert_eq!(sandbox.env()["HISTFILE"], histfile.to_string_lossy());
        assert_eq!(sandbox.env()["LANG"], "C");
    }

    #[test]
    fn test_prepend_path() {
        let mut sandbox = Sandbox::create().unwrap();
        let bin = sandbox.prepend_path("bin").unwrap();
        assert!(bin.is_dir());
        assert!(sandbox.env()["PATH"].starts_with(&*bin.to_string_lossy()));
    }

    #[test]
    fn test_drop_removes_tree() {
        let root = {
            let sandbox = Sandbox::create().unwrap();
            sandbox.write_file("a/b", "x").unwrap();
            sandbox.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_concurrent_sandboxes_are_isolated() {
        let first = Sandbox::create().unwrap();
        let second = Sandbox::create().unwrap();
        assert_ne!(first.path(), second.path());

        first.write_file("shared-name", "one").unwrap();
        second.write_file("shared-name", "two").unwrap();

        let second_root = second.path().to_path_buf();
        first.destroy().unwrap();

        assert!(second_root.exists());
        assert_eq!(second.read_file("shared-name").unwrap(), "two");
    }
}
