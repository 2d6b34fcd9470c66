use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("No such file in the engine filesystem: {0}")]
    NotFound(String),

    #[error("File already exists in the engine filesystem: {0}")]
    AlreadyExists(String),

    #[error("Engine filesystem rejected the write to {0}")]
    WriteRejected(String),

    #[error("Directory does not exist in the engine filesystem: {0}")]
    MissingDirectory(String),
}

/// The engine module's private file namespace.
///
/// Paths are engine-relative. `./name` and `name` refer to the same file, and `.` is the
/// always-present working directory.
pub trait VirtualFs: fmt::Debug {
    /// Creates `name` inside `dir` and returns the path the engine should be handed.
    fn create_file(&self, dir: &str, name: &str, bytes: &[u8]) -> Result<String, FsError>;

    /// Overwrites or creates the file at `path`; used by engine operations that write output.
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FsError>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError>;

    fn unlink(&self, path: &str) -> Result<(), FsError>;

    fn mkdir(&self, path: &str) -> Result<(), FsError>;

    fn exists(&self, path: &str) -> bool;

    /// All file paths currently present, in normalized form.
    fn files(&self) -> Vec<String>;
}

pub fn normalize_path(path: &str) -> String {
    let mut trimmed = path;
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_end_matches('/').to_string()
}

pub fn join_path(dir: &str, name: &str) -> String {
    let dir = normalize_path(dir);
    if dir.is_empty() || dir == "." {
        normalize_path(name)
    } else {
        format!("{}/{}", dir, normalize_path(name))
    }
}

fn parent_dir(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// An in-memory [`VirtualFs`] with optional write-fault injection.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    dirs: RefCell<BTreeSet<String>>,
    reject_writes: Cell<bool>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every subsequent create or write fails with [`FsError::WriteRejected`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path.is_empty() || path == "." || self.dirs.borrow().contains(&path)
    }

    fn check_parent(&self, path: &str) -> Result<(), FsError> {
        match parent_dir(path) {
            Some(parent) if !self.is_dir(parent) => {
                Err(FsError::MissingDirectory(parent.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl VirtualFs for MemoryFs {
    fn create_file(&self, dir: &str, name: &str, bytes: &[u8]) -> Result<String, FsError> {
        let path = join_path(dir, name);
        if self.reject_writes.get() {
            return Err(FsError::WriteRejected(path));
        }
        self.check_parent(&path)?;
        let mut files = self.files.borrow_mut();
        if files.contains_key(&path) {
            return Err(FsError::AlreadyExists(path));
        }
        files.insert(path.clone(), bytes.to_vec());
        Ok(format!("./{}", path))
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), FsError> {
        let path = normalize_path(path);
        if self.reject_writes.get() {
            return Err(FsError::WriteRejected(path));
        }
        self.check_parent(&path)?;
        self.files.borrow_mut().insert(path, bytes.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let path = normalize_path(path);
        self.files
            .borrow()
            .get(&path)
            .cloned()
            .ok_or(FsError::NotFound(path))
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        let path = normalize_path(path);
        match self.files.borrow_mut().remove(&path) {
            Some(_) => Ok(()),
            None => Err(FsError::NotFound(path)),
        }
    }

    fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let path = normalize_path(path);
        if self.is_dir(&path) || self.files.borrow().contains_key(&path) {
            return Err(FsError::AlreadyExists(path));
        }
        self.check_parent(&path)?;
        self.dirs.borrow_mut().insert(path);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.files.borrow().contains_key(&path) || self.is_dir(&path)
    }

    fn files(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }
}
