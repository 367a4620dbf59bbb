use crate::announce::AnnouncementSlot;
use crate::catalog::TrackListing;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Volume ceiling in percent.
pub const MAX_VOLUME: u16 = 200;

/// Current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NavState {
    Home = 0,
    FolderList = 1,
    TrackList = 2,
}

impl NavState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => NavState::FolderList,
            2 => NavState::TrackList,
            _ => NavState::Home,
        }
    }
}

/// "What should be sounding": a track of a specific listing.
///
/// Packed into one atomic word as `generation << 32 | (index + 1)`;
/// the all-zero word means no intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackIntent {
    pub generation: u32,
    pub index: usize,
}

impl PlaybackIntent {
    const NONE: u64 = 0;

    fn encode(self) -> u64 {
        (u64::from(self.generation) << 32) | (self.index as u64 + 1)
    }

    fn decode(word: u64) -> Option<Self> {
        let slot = word & u64::from(u32::MAX);
        if slot == 0 {
            return None;
        }
        Some(Self {
            generation: (word >> 32) as u32,
            index: (slot - 1) as usize,
        })
    }
}

/// Snapshot of an intent word, compared by the arbiter to notice changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentWord(u64);

impl IntentWord {
    pub fn intent(self) -> Option<PlaybackIntent> {
        PlaybackIntent::decode(self.0)
    }
}

/// Derived view of what the audio output is rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_index: Option<usize>,
}

/// Process-wide volume in percent, clamped to `[0, MAX_VOLUME]`.
#[derive(Debug)]
pub struct Volume(AtomicU16);

impl Volume {
    pub fn new(percent: u16) -> Self {
        Self(AtomicU16::new(percent.min(MAX_VOLUME)))
    }

    pub fn percent(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }

    /// Raise by `step`, saturating at the ceiling. Returns the new value.
    pub fn raise(&self, step: u16) -> u16 {
        self.update(|v| v.saturating_add(step).min(MAX_VOLUME))
    }

    /// Lower by `step`, saturating at zero. Returns the new value.
    pub fn lower(&self, step: u16) -> u16 {
        self.update(|v| v.saturating_sub(step))
    }

    fn update(&self, f: impl Fn(u16) -> u16) -> u16 {
        let prev = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(f(v)))
            .unwrap_or_else(|v| v);
        f(prev)
    }
}

/// Shared control words between the navigation task and the arbiter.
///
/// Every field is read and written atomically on its own; no invariant spans
/// two fields, and readers tolerate seeing updates in any interleaving.
#[derive(Debug)]
pub struct Controls {
    nav: AtomicU8,
    intent: AtomicU64,
    paused: AtomicBool,
    now_playing: AtomicU64,
    pub volume: Volume,
    pub announcements: AnnouncementSlot,
    tracks: ArcSwap<TrackListing>,
}

impl Controls {
    pub fn new(volume: u16) -> Self {
        Self {
            nav: AtomicU8::new(NavState::Home as u8),
            intent: AtomicU64::new(PlaybackIntent::NONE),
            paused: AtomicBool::new(false),
            now_playing: AtomicU64::new(PlaybackIntent::NONE),
            volume: Volume::new(volume),
            announcements: AnnouncementSlot::new(),
            tracks: ArcSwap::from_pointee(TrackListing::default()),
        }
    }

    pub fn nav_state(&self) -> NavState {
        NavState::from_u8(self.nav.load(Ordering::Acquire))
    }

    pub fn set_nav_state(&self, state: NavState) {
        self.nav.store(state as u8, Ordering::Release);
    }

    pub fn intent_word(&self) -> IntentWord {
        IntentWord(self.intent.load(Ordering::Acquire))
    }

    pub fn intent(&self) -> Option<PlaybackIntent> {
        self.intent_word().intent()
    }

    /// Ask for `intent` to be sounding, unpaused.
    pub fn request_track(&self, intent: PlaybackIntent) {
        self.paused.store(false, Ordering::Release);
        self.intent.store(intent.encode(), Ordering::Release);
    }

    /// Drop any playback intent and its pause state.
    pub fn clear_intent(&self) {
        self.intent.store(PlaybackIntent::NONE, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    /// Clear the intent only if it is still `word`. Used by the arbiter when a
    /// track ends so a newer request is never lost.
    pub fn finish_intent(&self, word: IntentWord) -> bool {
        self.intent
            .compare_exchange(
                word.0,
                PlaybackIntent::NONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Flip the pause toggle. Returns the new state.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn tracks(&self) -> Arc<TrackListing> {
        self.tracks.load_full()
    }

    pub fn publish_tracks(&self, listing: Arc<TrackListing>) {
        self.tracks.store(listing);
    }

    pub(crate) fn set_now_playing(&self, intent: Option<PlaybackIntent>) {
        let word = intent.map_or(PlaybackIntent::NONE, PlaybackIntent::encode);
        self.now_playing.store(word, Ordering::Release);
    }

    /// What the arbiter is rendering right now.
    pub fn status(&self) -> PlaybackStatus {
        let playing = PlaybackIntent::decode(self.now_playing.load(Ordering::Acquire));
        PlaybackStatus {
            is_playing: playing.is_some(),
            is_paused: playing.is_some() && self.is_paused(),
            current_index: playing.map(|p| p.index),
        }
    }
}
