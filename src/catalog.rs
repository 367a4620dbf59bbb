use crate::error::PlayerError;
use crate::storage::{EntryKind, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A folder directly below the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub path: PathBuf,
}

/// A WAV file inside the opened folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Immutable snapshot of the opened folder's tracks.
///
/// Every rebuild gets a fresh `generation`, so a playback intent recorded
/// against an older listing can never be resolved against a newer one.
#[derive(Debug, Clone, Default)]
pub struct TrackListing {
    pub generation: u32,
    pub folder: Option<PathBuf>,
    pub entries: Vec<TrackEntry>,
}

impl TrackListing {
    pub fn get(&self, index: usize) -> Option<&TrackEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Folder names that carry the stories announcement.
pub fn is_stories_folder(name: &str) -> bool {
    name.eq_ignore_ascii_case("01") || name.eq_ignore_ascii_case("stories")
}

fn has_wav_extension(name: &str) -> bool {
    name.len() > 4
        && name
            .get(name.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".wav"))
}

fn entry_kind(storage: &dyn Storage, dir: &Path, name: &str, kind: EntryKind) -> EntryKind {
    match kind {
        EntryKind::Unknown => storage.resolve_kind(&dir.join(name)),
        known => known,
    }
}

/// List the folders directly below `root`, in the order the medium
/// reports them.
///
/// An unreadable root yields an empty list and a warning.
pub fn scan_folders(storage: &dyn Storage, root: &Path, limit: usize) -> Vec<FolderEntry> {
    let entries = match storage.list_directory(root) {
        Ok(entries) => entries,
        Err(source) => {
            let err = PlayerError::DirectoryUnreadable {
                path: root.to_path_buf(),
                source,
            };
            warn!("{err}");
            return Vec::new();
        }
    };

    let mut folders: Vec<FolderEntry> = entries
        .into_iter()
        .filter(|e| e.name != "." && e.name != "..")
        .filter(|e| entry_kind(storage, root, &e.name, e.kind) == EntryKind::Directory)
        .map(|e| FolderEntry {
            path: root.join(&e.name),
            name: e.name,
        })
        .collect();

    if folders.len() > limit {
        warn!("{} folders found, listing the first {limit}", folders.len());
        folders.truncate(limit);
    }
    for (i, f) in folders.iter().enumerate() {
        debug!("found folder [{i}]: {}", f.path.display());
    }
    info!("folders found: {}", folders.len());
    folders
}

/// List the WAV files inside `folder`, in the order the medium reports
/// them. Indices follow that order.
///
/// An unreadable folder yields an empty list and a warning.
pub fn scan_tracks(storage: &dyn Storage, folder: &Path, limit: usize) -> Vec<TrackEntry> {
    let entries = match storage.list_directory(folder) {
        Ok(entries) => entries,
        Err(source) => {
            let err = PlayerError::DirectoryUnreadable {
                path: folder.to_path_buf(),
                source,
            };
            warn!("{err}");
            return Vec::new();
        }
    };

    let mut tracks: Vec<TrackEntry> = entries
        .into_iter()
        .filter(|e| has_wav_extension(&e.name))
        .filter(|e| entry_kind(storage, folder, &e.name, e.kind) == EntryKind::File)
        .map(|e| TrackEntry {
            path: folder.join(&e.name),
            name: e.name,
        })
        .collect();

    if tracks.len() > limit {
        warn!("{} WAV files found, listing the first {limit}", tracks.len());
        tracks.truncate(limit);
    }
    info!("WAV files found: {} in {}", tracks.len(), folder.display());
    tracks
}

/// Index of the folder selected after a root scan: `01`, else `audios`,
/// else the first one.
pub fn default_folder(folders: &[FolderEntry]) -> usize {
    folders
        .iter()
        .position(|f| f.name.eq_ignore_ascii_case("01"))
        .or_else(|| {
            folders
                .iter()
                .position(|f| f.name.eq_ignore_ascii_case("audios"))
        })
        .unwrap_or(0)
}

/// The navigation task's view of the medium.
///
/// Owned and mutated only by the navigation task; the opened folder's
/// tracks are shared with the arbiter as an immutable [`TrackListing`].
#[derive(Debug)]
pub struct Catalog {
    folders: Vec<FolderEntry>,
    selected_folder: usize,
    tracks: Arc<TrackListing>,
    selected_track: usize,
    next_generation: u32,
    max_folders: usize,
    max_tracks: usize,
}

impl Catalog {
    pub fn new(max_folders: usize, max_tracks: usize) -> Self {
        Self {
            folders: Vec::new(),
            selected_folder: 0,
            tracks: Arc::new(TrackListing::default()),
            selected_track: 0,
            next_generation: 1,
            max_folders,
            max_tracks,
        }
    }

    /// Replace the folder list from the storage root and select the
    /// default folder.
    pub fn rescan_root(&mut self, storage: &dyn Storage) {
        self.folders = scan_folders(storage, storage.root(), self.max_folders);
        self.selected_folder = default_folder(&self.folders);
        if let Some(folder) = self.selected_folder() {
            info!(
                "default folder selected: index={} -> {}",
                self.selected_folder,
                folder.path.display()
            );
        } else {
            warn!("no folders found at {}", storage.root().display());
        }
    }

    /// Replace the track list with the contents of the selected folder and
    /// reset the track selection to 0. Returns the new listing.
    pub fn open_selected_folder(&mut self, storage: &dyn Storage) -> Option<Arc<TrackListing>> {
        let folder = self.selected_folder()?.path.clone();
        let entries = scan_tracks(storage, &folder, self.max_tracks);
        self.tracks = Arc::new(TrackListing {
            generation: self.bump_generation(),
            folder: Some(folder),
            entries,
        });
        self.selected_track = 0;
        Some(Arc::clone(&self.tracks))
    }

    /// Drop the track list. Returns the new, empty listing.
    pub fn close_folder(&mut self) -> Arc<TrackListing> {
        self.tracks = Arc::new(TrackListing {
            generation: self.bump_generation(),
            folder: None,
            entries: Vec::new(),
        });
        self.selected_track = 0;
        Arc::clone(&self.tracks)
    }

    fn bump_generation(&mut self) -> u32 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        generation
    }

    pub fn folders(&self) -> &[FolderEntry] {
        &self.folders
    }

    pub fn selected_folder_index(&self) -> usize {
        self.selected_folder
    }

    pub fn selected_folder(&self) -> Option<&FolderEntry> {
        self.folders.get(self.selected_folder)
    }

    pub fn tracks(&self) -> &Arc<TrackListing> {
        &self.tracks
    }

    pub fn selected_track_index(&self) -> usize {
        self.selected_track
    }

    pub fn selected_track(&self) -> Option<&TrackEntry> {
        self.tracks.get(self.selected_track)
    }

    /// Move the folder selection by `direction` modulo the folder count.
    pub fn step_folder(&mut self, direction: i8) -> Option<&FolderEntry> {
        self.selected_folder = wrap_step(self.selected_folder, direction, self.folders.len())?;
        self.selected_folder()
    }

    /// Move the track selection by `direction` modulo the track count.
    pub fn step_track(&mut self, direction: i8) -> Option<&TrackEntry> {
        self.selected_track = wrap_step(self.selected_track, direction, self.tracks.len())?;
        self.selected_track()
    }
}

fn wrap_step(current: usize, direction: i8, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = if direction >= 0 {
        (current + 1) % len
    } else {
        (current + len - 1) % len
    };
    Some(next)
}
