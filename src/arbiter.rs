use crate::announce::Announcement;
use crate::audio::output::AudioOutput;
use crate::audio::{AudioEngine, StreamControl, StreamOutcome};
use crate::error::StreamError;
use crate::state::{Controls, IntentWord, NavState, PlaybackIntent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one arbitration cycle did.
#[derive(Debug)]
pub enum Cycle {
    /// Nothing to play.
    Idle,
    Announcement {
        path: PathBuf,
        result: Result<StreamOutcome, StreamError>,
    },
    Track {
        intent: PlaybackIntent,
        result: Result<StreamOutcome, StreamError>,
    },
    /// The intent referred to a listing that no longer exists and was dropped.
    Stale(PlaybackIntent),
}

/// Where an interrupted track stopped, kept while its intent is unchanged.
#[derive(Debug, Clone, Copy)]
struct ResumePoint {
    word: IntentWord,
    frame: u64,
}

/// Sole owner of the audio engine. Decides what sounds next: a pending
/// announcement first, then the intended track while the track list is on
/// screen, otherwise silence.
pub struct Arbiter<O> {
    engine: AudioEngine<O>,
    controls: Arc<Controls>,
    cancel: CancellationToken,
    idle: Duration,
    resume: Option<ResumePoint>,
}

impl<O: AudioOutput> Arbiter<O> {
    pub fn new(
        engine: AudioEngine<O>,
        controls: Arc<Controls>,
        cancel: CancellationToken,
        idle: Duration,
    ) -> Self {
        Self {
            engine,
            controls,
            cancel,
            idle,
            resume: None,
        }
    }

    pub fn engine(&self) -> &AudioEngine<O> {
        &self.engine
    }

    /// Play the boot greetings, then arbitrate until cancelled.
    pub fn run(mut self, greetings: Vec<PathBuf>) {
        info!("audio arbiter started");
        for clip in &greetings {
            if self.cancel.is_cancelled() || self.controls.announcements.is_pending() {
                debug!("skipping remaining greetings");
                break;
            }
            self.play_greeting(clip);
        }

        while !self.cancel.is_cancelled() {
            if let Cycle::Idle = self.step() {
                std::thread::sleep(self.idle);
            }
        }
        info!("audio arbiter stopped");
    }

    /// Run one arbitration cycle. Blocks for as long as something plays.
    pub fn step(&mut self) -> Cycle {
        if let Some(announcement) = self.controls.announcements.take() {
            return self.play_announcement(&announcement);
        }

        let word = self.controls.intent_word();
        match word.intent() {
            Some(intent) if self.controls.nav_state() == NavState::TrackList => {
                self.play_track(word, intent)
            }
            _ => Cycle::Idle,
        }
    }

    fn play_greeting(&mut self, clip: &Path) {
        let controls = &self.controls;
        let cancel = &self.cancel;
        let abort = || controls.announcements.is_pending() || cancel.is_cancelled();
        let control = StreamControl {
            volume: &controls.volume,
            pause: &|| false,
            abort: &abort,
        };
        if let Err(e) = self.engine.stream(clip, &control) {
            warn!("greeting failed: {e}");
        }
    }

    fn play_announcement(&mut self, announcement: &Announcement) -> Cycle {
        let path = PathBuf::clone(&announcement.path);
        info!("playing announcement: {}", path.display());

        let controls = &self.controls;
        let cancel = &self.cancel;
        let sequence = announcement.sequence;
        let abort = || {
            controls.announcements.is_pending()
                || controls.announcements.sequence() != sequence
                || cancel.is_cancelled()
        };
        let control = StreamControl {
            volume: &controls.volume,
            pause: &|| false,
            abort: &abort,
        };

        let result = self.engine.stream(&path, &control);
        match &result {
            Ok(StreamOutcome::Completed) => debug!("announcement finished"),
            Ok(StreamOutcome::Aborted { .. }) => debug!("announcement superseded"),
            Err(e) => warn!("announcement failed: {e}"),
        }
        Cycle::Announcement { path, result }
    }

    fn play_track(&mut self, word: IntentWord, intent: PlaybackIntent) -> Cycle {
        let listing = self.controls.tracks();
        let track = (listing.generation == intent.generation)
            .then(|| listing.get(intent.index))
            .flatten();
        let Some(track) = track else {
            warn!(
                "track {} of listing {} is gone (current listing {}), dropping",
                intent.index, intent.generation, listing.generation
            );
            self.controls.finish_intent(word);
            self.resume = None;
            return Cycle::Stale(intent);
        };
        let path = track.path.clone();
        let start = self
            .resume
            .take()
            .filter(|r| r.word == word)
            .map_or(0, |r| r.frame);

        info!("playing track {}: {}", intent.index, path.display());
        self.controls.set_now_playing(Some(intent));

        let controls = &self.controls;
        let cancel = &self.cancel;
        let abort = || {
            controls.announcements.is_pending()
                || controls.intent_word() != word
                || controls.nav_state() != NavState::TrackList
                || cancel.is_cancelled()
        };
        let pause = || controls.is_paused();
        let control = StreamControl {
            volume: &controls.volume,
            pause: &pause,
            abort: &abort,
        };
        let result = self.engine.stream_from(&path, start, &control);

        self.controls.set_now_playing(None);
        match &result {
            Ok(StreamOutcome::Completed) => {
                info!("track {} finished", intent.index);
                self.controls.finish_intent(word);
            }
            Ok(StreamOutcome::Aborted { frame }) => {
                // Only an announcement leaves the intent untouched.
                if self.controls.intent_word() == word && !self.cancel.is_cancelled() {
                    debug!("track {} paused for announcement at frame {frame}", intent.index);
                    self.resume = Some(ResumePoint { word, frame: *frame });
                }
            }
            Err(e) => {
                warn!("track {} failed: {e}", intent.index);
                self.controls.finish_intent(word);
            }
        }
        Cycle::Track { intent, result }
    }
}
