use crate::announce::{self, HOME_CLIP};
use crate::catalog::{is_stories_folder, Catalog};
use crate::event::{Button, InputEvent};
use crate::state::{Controls, NavState, PlaybackIntent};
use crate::storage::Storage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Screen state machine; the single consumer of input events.
///
/// Owns the catalog. Everything the arbiter needs is published through
/// [`Controls`]: the screen, the playback intent, announcements, volume,
/// and the opened folder's track listing.
pub struct Navigator {
    storage: Arc<dyn Storage>,
    controls: Arc<Controls>,
    catalog: Catalog,
    state: NavState,
    volume_step: u16,
    rescan_pending: bool,
}

impl Navigator {
    pub fn new(
        storage: Arc<dyn Storage>,
        controls: Arc<Controls>,
        catalog: Catalog,
        volume_step: u16,
    ) -> Self {
        controls.set_nav_state(NavState::Home);
        Self {
            storage,
            controls,
            catalog,
            state: NavState::Home,
            volume_step,
            rescan_pending: false,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Rebuild the folder list from the storage root.
    pub fn rescan_root(&mut self) {
        self.catalog.rescan_root(self.storage.as_ref());
        self.rescan_pending = false;
    }

    /// The medium changed. Folder indices only change while at Home, so a
    /// rescan from a list screen waits until Home is entered.
    pub fn media_changed(&mut self) {
        if self.state == NavState::Home {
            info!("storage changed, rescanning root");
            self.rescan_root();
        } else {
            info!("storage changed, rescan deferred until home");
            self.rescan_pending = true;
        }
    }

    pub fn handle(&mut self, event: InputEvent) {
        debug!("input {event:?} in {:?}", self.state);
        match event {
            InputEvent::RotaryStep { direction } => self.on_step(direction),
            InputEvent::RotarySwitch | InputEvent::ButtonPress(Button::PlayPause) => {
                self.on_confirm();
            }
            InputEvent::ButtonPress(Button::Home) => self.on_home(),
            InputEvent::ButtonPress(Button::VolUp) => {
                let v = self.controls.volume.raise(self.volume_step);
                info!("Vol+ -> {v}%");
            }
            InputEvent::ButtonPress(Button::VolDown) => {
                let v = self.controls.volume.lower(self.volume_step);
                info!("Vol- -> {v}%");
            }
        }
    }

    fn set_state(&mut self, next: NavState) {
        info!("{:?} -> {next:?}", self.state);
        self.state = next;
        self.controls.set_nav_state(next);
    }

    fn on_step(&mut self, direction: i8) {
        match self.state {
            NavState::Home | NavState::FolderList => {
                let Some(folder) = self.catalog.step_folder(direction).cloned() else {
                    return;
                };
                info!(
                    "folder selected: {} -> {}",
                    self.catalog.selected_folder_index(),
                    folder.path.display()
                );
                if is_stories_folder(&folder.name) {
                    self.announce_stories(&folder.path);
                }
            }
            NavState::TrackList => {
                let Some(track) = self.catalog.step_track(direction).cloned() else {
                    return;
                };
                info!(
                    "track selected: {} -> {}",
                    self.catalog.selected_track_index(),
                    track.path.display()
                );
                self.announce_story(&track.path);
            }
        }
    }

    fn on_confirm(&mut self) {
        match self.state {
            NavState::Home => {
                if self.catalog.folders().is_empty() {
                    info!("no folders to enter");
                } else {
                    self.set_state(NavState::FolderList);
                }
            }
            NavState::FolderList => self.enter_folder(),
            NavState::TrackList => self.play_or_toggle(),
        }
    }

    fn on_home(&mut self) {
        match self.state {
            NavState::TrackList => {
                self.controls.clear_intent();
                let listing = self.catalog.close_folder();
                self.controls.publish_tracks(listing);
                self.set_state(NavState::FolderList);
            }
            NavState::FolderList => {
                self.set_state(NavState::Home);
                if self.rescan_pending {
                    self.rescan_root();
                }
                if let Some(clip) = announce::root_clip(self.storage.as_ref(), HOME_CLIP) {
                    self.controls.announcements.request(clip);
                }
            }
            NavState::Home => debug!("already at home"),
        }
    }

    fn enter_folder(&mut self) {
        let Some(folder) = self.catalog.selected_folder().cloned() else {
            return;
        };

        self.controls.clear_intent();
        if is_stories_folder(&folder.name) {
            self.announce_stories(&folder.path);
        }

        let Some(listing) = self.catalog.open_selected_folder(self.storage.as_ref()) else {
            return;
        };
        let count = listing.len();
        self.controls.publish_tracks(listing);
        self.set_state(NavState::TrackList);
        info!("entered folder {} (files={count})", folder.path.display());

        if let Some(first) = self.catalog.selected_track() {
            let path = first.path.clone();
            self.announce_story(&path);
        }
    }

    fn play_or_toggle(&mut self) {
        let tracks = self.catalog.tracks();
        if tracks.is_empty() {
            info!("no tracks to play");
            return;
        }
        let selected = PlaybackIntent {
            generation: tracks.generation,
            index: self.catalog.selected_track_index(),
        };

        match self.controls.intent() {
            Some(current) if current == selected => {
                let paused = self.controls.toggle_pause();
                info!("toggle pause -> {}", if paused { "PAUSED" } else { "PLAYING" });
            }
            Some(current) => {
                info!("switch from track {} to {}", current.index, selected.index);
                self.controls.request_track(selected);
            }
            None => {
                info!("request play {}", selected.index);
                self.controls.request_track(selected);
            }
        }
    }

    fn announce_stories(&self, folder: &Path) {
        if let Some(clip) = announce::stories_clip(self.storage.as_ref(), folder) {
            self.controls.announcements.request(clip);
        }
    }

    fn announce_story(&self, track: &Path) {
        if let Some(clip) = announce::story_clip(self.storage.as_ref(), track) {
            self.controls.announcements.request(clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsStorage, MemStorage};
    use std::path::PathBuf;

    fn navigator(storage: MemStorage) -> (Navigator, Arc<Controls>) {
        let controls = Arc::new(Controls::new(100));
        let mut nav = Navigator::new(
            Arc::new(storage),
            Arc::clone(&controls),
            Catalog::new(32, 64),
            10,
        );
        nav.rescan_root();
        (nav, controls)
    }

    const CONFIRM: InputEvent = InputEvent::ButtonPress(Button::PlayPause);
    const HOME: InputEvent = InputEvent::ButtonPress(Button::Home);
    const NEXT: InputEvent = InputEvent::RotaryStep { direction: 1 };

    fn taken(controls: &Controls) -> Option<PathBuf> {
        controls.announcements.take().map(|a| (*a.path).clone())
    }

    #[test]
    fn empty_catalog_is_inert() {
        let (mut nav, controls) = navigator(MemStorage::new("/sd"));
        for event in [CONFIRM, NEXT, InputEvent::RotarySwitch, HOME] {
            nav.handle(event);
        }
        assert_eq!(nav.state(), NavState::Home);
        assert!(controls.intent().is_none());
        assert!(!controls.announcements.is_pending());
    }

    #[test]
    fn home_to_folder_list_to_track_list_and_back() {
        let storage = MemStorage::new("/sd")
            .with_file("music/a.wav", vec![])
            .with_file("music/b.wav", vec![]);
        let (mut nav, controls) = navigator(storage);

        nav.handle(InputEvent::RotarySwitch);
        assert_eq!(nav.state(), NavState::FolderList);
        assert_eq!(controls.nav_state(), NavState::FolderList);

        nav.handle(CONFIRM);
        assert_eq!(nav.state(), NavState::TrackList);
        assert_eq!(controls.tracks().len(), 2);

        nav.handle(HOME);
        assert_eq!(nav.state(), NavState::FolderList);
        assert!(controls.tracks().is_empty());

        nav.handle(HOME);
        assert_eq!(nav.state(), NavState::Home);
    }

    #[test]
    fn entering_stories_folder_announces_once() {
        // Scenario B, navigation half
        let storage = MemStorage::new("/sd")
            .with_file("stories.wav", vec![])
            .with_file("01/tale.wav", vec![]);
        let (mut nav, controls) = navigator(storage);

        nav.handle(CONFIRM);
        assert!(!controls.announcements.is_pending());
        nav.handle(CONFIRM);

        assert_eq!(controls.announcements.sequence(), 1);
        assert_eq!(taken(&controls), Some(PathBuf::from("/sd/stories.wav")));
    }

    #[test]
    fn first_story_track_announced_after_entry() {
        let storage = MemStorage::new("/sd")
            .with_file("01/S1.wav", vec![])
            .with_file("01/story1.wav", vec![]);
        let (mut nav, controls) = navigator(storage);
        nav.handle(CONFIRM);
        nav.handle(CONFIRM);
        assert_eq!(taken(&controls), Some(PathBuf::from("/sd/01/story1.wav")));
    }

    #[test]
    fn track_steps_announce_story_tracks_only() {
        // Scenario C
        let storage = MemStorage::new("/sd")
            .with_file("story1.wav", vec![])
            .with_file("story2.wav", vec![])
            .with_file("tales/S1.wav", vec![])
            .with_file("tales/S2.wav", vec![])
            .with_file("tales/other.wav", vec![]);
        let (mut nav, controls) = navigator(storage);
        nav.handle(CONFIRM);
        nav.handle(CONFIRM);
        assert_eq!(taken(&controls), Some(PathBuf::from("/sd/story1.wav")));

        nav.handle(NEXT);
        assert_eq!(taken(&controls), Some(PathBuf::from("/sd/story2.wav")));

        nav.handle(NEXT);
        assert_eq!(nav.catalog().selected_track().unwrap().name, "other.wav");
        assert!(taken(&controls).is_none());

        nav.handle(NEXT);
        assert_eq!(nav.catalog().selected_track_index(), 0);
    }

    #[test]
    fn rotating_onto_stories_folder_announces() {
        let storage = MemStorage::new("/sd")
            .with_file("stories/stories.wav", vec![])
            .with_dir("music");
        let (mut nav, controls) = navigator(storage);
        assert_eq!(nav.catalog().selected_folder().unwrap().name, "music");

        nav.handle(NEXT);
        assert_eq!(nav.state(), NavState::Home);
        assert_eq!(
            taken(&controls),
            Some(PathBuf::from("/sd/stories/stories.wav"))
        );
        nav.handle(NEXT);
        assert!(taken(&controls).is_none());
    }

    #[test]
    fn play_then_toggle_then_switch() {
        // Scenario D, navigation half
        let storage = MemStorage::new("/sd")
            .with_file("music/a.wav", vec![])
            .with_file("music/b.wav", vec![]);
        let (mut nav, controls) = navigator(storage);
        nav.handle(CONFIRM);
        nav.handle(CONFIRM);

        nav.handle(CONFIRM);
        let first = controls.intent().unwrap();
        assert_eq!(first.index, 0);
        assert!(!controls.is_paused());

        nav.handle(InputEvent::RotarySwitch);
        assert_eq!(controls.intent(), Some(first));
        assert!(controls.is_paused());

        nav.handle(NEXT);
        nav.handle(CONFIRM);
        assert_eq!(controls.intent().unwrap().index, 1);
        assert!(!controls.is_paused());
    }

    #[test]
    fn home_from_track_list_clears_intent() {
        // Scenario E, navigation half
        let storage = MemStorage::new("/sd").with_file("music/a.wav", vec![]);
        let (mut nav, controls) = navigator(storage);
        nav.handle(CONFIRM);
        nav.handle(CONFIRM);
        nav.handle(CONFIRM);
        assert!(controls.intent().is_some());

        nav.handle(HOME);
        assert!(controls.intent().is_none());
        assert_eq!(controls.nav_state(), NavState::FolderList);
        assert!(nav.catalog().tracks().is_empty());
    }

    #[test]
    fn home_clip_on_return_home() {
        let storage = MemStorage::new("/sd")
            .with_file("home.wav", vec![])
            .with_dir("music");
        let (mut nav, controls) = navigator(storage);
        nav.handle(CONFIRM);
        nav.handle(HOME);
        assert_eq!(taken(&controls), Some(PathBuf::from("/sd/home.wav")));
    }

    #[test]
    fn volume_buttons_saturate() {
        let (mut nav, controls) = navigator(MemStorage::new("/sd"));
        for _ in 0..15 {
            nav.handle(InputEvent::ButtonPress(Button::VolUp));
        }
        assert_eq!(controls.volume.percent(), 200);
        for _ in 0..25 {
            nav.handle(InputEvent::ButtonPress(Button::VolDown));
        }
        assert_eq!(controls.volume.percent(), 0);
    }

    #[test]
    fn media_change_deferred_until_home() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("music")).unwrap();
        let controls = Arc::new(Controls::new(100));
        let mut nav = Navigator::new(
            Arc::new(FsStorage::new(dir.path())),
            Arc::clone(&controls),
            Catalog::new(32, 64),
            10,
        );
        nav.rescan_root();
        nav.handle(CONFIRM);

        std::fs::create_dir(dir.path().join("news")).unwrap();
        nav.media_changed();
        assert_eq!(nav.catalog().folders().len(), 1);

        nav.handle(HOME);
        assert_eq!(nav.state(), NavState::Home);
        assert_eq!(nav.catalog().folders().len(), 2);
    }

    #[test]
    fn media_change_at_home_rescans_now() {
        let dir = tempfile::tempdir().unwrap();
        let controls = Arc::new(Controls::new(100));
        let mut nav = Navigator::new(
            Arc::new(FsStorage::new(dir.path())),
            controls,
            Catalog::new(32, 64),
            10,
        );
        nav.rescan_root();
        assert!(nav.catalog().folders().is_empty());

        std::fs::create_dir(dir.path().join("01")).unwrap();
        nav.media_changed();
        assert_eq!(nav.catalog().selected_folder().unwrap().name, "01");
    }
}
