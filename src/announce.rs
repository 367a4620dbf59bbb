use crate::storage::Storage;
use arc_swap::ArcSwapOption;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const WELCOME_CLIP: &str = "welcome.wav";
pub const HOME_CLIP: &str = "home.wav";
pub const STORIES_CLIP: &str = "stories.wav";

/// Single-slot announcement request.
///
/// Newer requests overwrite older ones; only the most recent clip matters.
/// The slot never stops audio itself. The arbiter watches [`is_pending`]
/// and [`sequence`] to pre-empt whatever is sounding.
///
/// [`is_pending`]: AnnouncementSlot::is_pending
/// [`sequence`]: AnnouncementSlot::sequence
#[derive(Debug, Default)]
pub struct AnnouncementSlot {
    path: ArcSwapOption<PathBuf>,
    sequence: AtomicU64,
    pending: AtomicBool,
}

/// An announcement taken from the slot by the arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub path: Arc<PathBuf>,
    pub sequence: u64,
}

impl AnnouncementSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `path` and mark it pending.
    pub fn request(&self, path: PathBuf) {
        info!("announcement requested: {}", path.display());
        self.path.store(Some(Arc::new(path)));
        self.sequence.fetch_add(1, Ordering::AcqRel);
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of requests made so far. Changes whenever a newer request
    /// arrives, pending or not.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Clear the pending flag and snapshot the most recent path.
    pub fn take(&self) -> Option<Announcement> {
        if !self.pending.swap(false, Ordering::AcqRel) {
            return None;
        }
        let sequence = self.sequence.load(Ordering::Acquire);
        let path = self.path.load_full()?;
        Some(Announcement { path, sequence })
    }
}

/// Clip number encoded in a story track name: `S<n>...` or `s<n>...`.
pub fn story_number(file_name: &str) -> Option<u32> {
    let mut chars = file_name.chars();
    match (chars.next(), chars.next()) {
        (Some('S' | 's'), Some(d)) => d.to_digit(10),
        _ => None,
    }
}

/// First of `root/<clip>` and `folder/<clip>` that exists.
fn root_then_folder(storage: &dyn Storage, folder: Option<&Path>, clip: &str) -> Option<PathBuf> {
    let at_root = storage.root().join(clip);
    if storage.exists(&at_root) {
        return Some(at_root);
    }
    let in_folder = folder?.join(clip);
    storage.exists(&in_folder).then_some(in_folder)
}

/// Clip announcing the stories folder, looked up at the root first and
/// inside the folder second.
pub fn stories_clip(storage: &dyn Storage, folder: &Path) -> Option<PathBuf> {
    root_then_folder(storage, Some(folder), STORIES_CLIP)
}

/// Clip announcing a story track (`S3.wav` → `story3.wav`), looked up at the
/// root first and in the track's own folder second.
pub fn story_clip(storage: &dyn Storage, track: &Path) -> Option<PathBuf> {
    let name = track.file_name()?.to_str()?;
    let n = story_number(name)?;
    let clip = root_then_folder(storage, track.parent(), &format!("story{n}.wav"));
    if clip.is_none() {
        debug!("no story{n}.wav for {}", track.display());
    }
    clip
}

/// A well-known clip at the storage root, if present.
pub fn root_clip(storage: &dyn Storage, clip: &str) -> Option<PathBuf> {
    let path = storage.root().join(clip);
    storage.exists(&path).then_some(path)
}

/// Greetings played once on boot, in order.
pub fn boot_greetings(storage: &dyn Storage) -> Vec<PathBuf> {
    [WELCOME_CLIP, HOME_CLIP]
        .into_iter()
        .filter_map(|clip| root_clip(storage, clip))
        .collect()
}
