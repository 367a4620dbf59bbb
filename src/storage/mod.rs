pub mod watcher;

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of a directory entry as reported by the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Unknown,
}

/// A single entry returned by [`Storage::list_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Byte stream opened for reading.
pub trait MediaReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> MediaReader for T {}

/// Block storage capabilities consumed by the player.
///
/// Mounting is owned by the platform; implementations only expose an
/// already-mounted tree.
pub trait Storage: Send + Sync {
    /// Mount point. Well-known clips live directly below it.
    fn root(&self) -> &Path;

    /// List the entries of `path`, excluding `.` and `..`.
    fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Open `path` for reading.
    fn open_for_read(&self, path: &Path) -> io::Result<Box<dyn MediaReader>>;

    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Resolve an entry whose kind the directory listing did not report.
    fn resolve_kind(&self, path: &Path) -> EntryKind {
        let _ = path;
        EntryKind::Unknown
    }
}

/// Storage backed by the host filesystem below a mount point.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Storage for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = match entry.file_type() {
                Ok(ft) if ft.is_dir() => EntryKind::Directory,
                Ok(ft) if ft.is_file() => EntryKind::File,
                _ => EntryKind::Unknown,
            };
            entries.push(DirEntry { name, kind });
        }
        Ok(entries)
    }

    fn open_for_read(&self, path: &Path) -> io::Result<Box<dyn MediaReader>> {
        let file = std::fs::File::open(path)?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn resolve_kind(&self, path: &Path) -> EntryKind {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Unknown,
        }
    }
}

/// In-memory medium for simulation and tests.
///
/// Directories are created implicitly for every file added below the root.
#[derive(Debug, Clone)]
pub struct MemStorage {
    root: PathBuf,
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Arc<[u8]>>,
    unreadable: BTreeSet<PathBuf>,
}

impl MemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut dirs = BTreeSet::new();
        dirs.insert(root.clone());
        Self {
            root,
            dirs,
            files: BTreeMap::new(),
            unreadable: BTreeSet::new(),
        }
    }

    /// Add a directory (and its parents) relative to the root.
    pub fn with_dir(mut self, rel: impl AsRef<Path>) -> Self {
        let path = self.root.join(rel);
        self.add_dirs(&path);
        self
    }

    /// Add a file relative to the root.
    pub fn with_file(mut self, rel: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) -> Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            self.add_dirs(parent);
        }
        self.files.insert(path, Arc::from(bytes.into()));
        self
    }

    /// Make listing of a directory fail, as a damaged medium would.
    pub fn with_unreadable(mut self, rel: impl AsRef<Path>) -> Self {
        let path = self.root.join(rel);
        self.add_dirs(&path);
        self.unreadable.insert(path);
        self
    }

    fn add_dirs(&mut self, path: &Path) {
        let mut current = Some(path);
        while let Some(dir) = current {
            if !dir.starts_with(&self.root) {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

impl Storage for MemStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if self.unreadable.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"));
        }
        if !self.dirs.contains(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"));
        }

        let child_name = |p: &PathBuf| -> Option<String> {
            (p.parent() == Some(path))
                .then(|| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .flatten()
        };

        let dirs = self.dirs.iter().filter_map(|d| {
            child_name(d).map(|name| DirEntry {
                name,
                kind: EntryKind::Directory,
            })
        });
        let files = self.files.keys().filter_map(|f| {
            child_name(f).map(|name| DirEntry {
                name,
                kind: EntryKind::File,
            })
        });
        Ok(dirs.chain(files).collect())
    }

    fn open_for_read(&self, path: &Path) -> io::Result<Box<dyn MediaReader>> {
        match self.files.get(path) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.to_vec()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    fn resolve_kind(&self, path: &Path) -> EntryKind {
        if self.files.contains_key(path) {
            EntryKind::File
        } else if self.dirs.contains(path) {
            EntryKind::Directory
        } else {
            EntryKind::Unknown
        }
    }
}
