use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Navigation and volume settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Mount point of the removable storage.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Boot volume in percent (0-200).
    #[serde(default = "default_volume")]
    pub volume: u16,

    /// Percent added or removed per volume button press.
    #[serde(default = "default_volume_step")]
    pub volume_step: u16,

    /// Maximum number of folders listed from the root.
    #[serde(default = "default_max_folders")]
    pub max_folders: usize,

    /// Maximum number of tracks listed from a folder.
    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,

    /// Play welcome.wav and home.wav on boot.
    #[serde(default = "default_true")]
    pub greetings: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            volume: default_volume(),
            volume_step: default_volume_step(),
            max_folders: default_max_folders(),
            max_tracks: default_max_tracks(),
            greetings: true,
        }
    }
}

/// Encoder and button timing.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Minimum gap between accepted rotary steps.
    #[serde(default = "default_step_debounce")]
    pub step_debounce_ms: u64,

    /// Minimum gap between accepted presses of the same switch or button.
    #[serde(default = "default_press_debounce")]
    pub press_debounce_ms: u64,

    /// Button scan period.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,

    /// Capacity of the raw edge queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Swap the meaning of the rotary direction pin.
    #[serde(default)]
    pub invert_direction: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            step_debounce_ms: default_step_debounce(),
            press_debounce_ms: default_press_debounce(),
            scan_interval_ms: default_scan_interval(),
            queue_capacity: default_queue_capacity(),
            invert_direction: false,
        }
    }
}

impl InputConfig {
    pub fn step_debounce(&self) -> Duration {
        Duration::from_millis(self.step_debounce_ms)
    }

    pub fn press_debounce(&self) -> Duration {
        Duration::from_millis(self.press_debounce_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// Streaming loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Frames read and written per loop iteration.
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,

    /// Sleep between flag checks while paused.
    #[serde(default = "default_pause_poll")]
    pub pause_poll_ms: u64,

    /// Sleep of the arbiter when there is nothing to play.
    #[serde(default = "default_idle_poll")]
    pub idle_poll_ms: u64,

    /// Output write timeout.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Where PCM goes: the default sound device, or a paced null sink.
    #[serde(default)]
    pub output: OutputKind,
}

/// Audio output backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Default output device of the host audio API.
    #[default]
    Device,
    /// Discard PCM at real-time pace.
    Null,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_frames: default_chunk_frames(),
            pause_poll_ms: default_pause_poll(),
            idle_poll_ms: default_idle_poll(),
            write_timeout_ms: default_write_timeout(),
            output: OutputKind::Device,
        }
    }
}

/// Removable storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Watch the root for media changes and rescan.
    #[serde(default = "default_true")]
    pub watch: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { watch: true }
    }
}

// --- Defaults ---

fn default_root() -> PathBuf {
    PathBuf::from("/sdcard")
}

fn default_volume() -> u16 {
    100
}

fn default_volume_step() -> u16 {
    10
}

fn default_max_folders() -> usize {
    32
}

fn default_max_tracks() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_step_debounce() -> u64 {
    60
}

fn default_press_debounce() -> u64 {
    50
}

fn default_scan_interval() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    16
}

fn default_chunk_frames() -> usize {
    1024
}

fn default_pause_poll() -> u64 {
    50
}

fn default_idle_poll() -> u64 {
    10
}

fn default_write_timeout() -> u64 {
    1000
}
