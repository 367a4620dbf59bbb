use crate::announce;
use crate::arbiter::Arbiter;
use crate::audio::device::CpalOutput;
use crate::audio::output::{AudioOutput, PacedOutput};
use crate::audio::AudioEngine;
use crate::catalog::Catalog;
use crate::config::schema::{AppConfig, OutputKind};
use crate::device::console::{self, ConsoleBus};
use crate::error::Result;
use crate::input::{self, DebounceConfig, EdgeProducer};
use crate::nav::Navigator;
use crate::state::Controls;
use crate::storage::{watcher, FsStorage, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const MEDIA_CHANNEL_CAPACITY: usize = 4;

/// Run the player until ctrl-c, a console quit, or the input queue closes.
///
/// # Errors
/// Returns `PlayerError` if a fatal error occurs in any subsystem.
pub async fn run(config: AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(&config.player.root));
    let controls = Arc::new(Controls::new(config.player.volume));

    let (producer, mut input) = input::edge_queue(
        config.input.queue_capacity,
        DebounceConfig {
            step: config.input.step_debounce(),
            press: config.input.press_debounce(),
            invert_direction: config.input.invert_direction,
        },
    );

    let mut navigator = Navigator::new(
        Arc::clone(&storage),
        Arc::clone(&controls),
        Catalog::new(config.player.max_folders, config.player.max_tracks),
        config.player.volume_step,
    );
    navigator.rescan_root();

    let greetings = if config.player.greetings {
        announce::boot_greetings(storage.as_ref())
    } else {
        Vec::new()
    };
    let arbiter_handle = spawn_arbiter(&config, &storage, &controls, &cancel, greetings);

    let bus = Arc::new(ConsoleBus::new());
    let console_handle = spawn_console(&bus, &producer, &cancel);
    let scan_handle = spawn_button_scan(bus, producer, &config, &cancel);

    let (media_tx, mut media_rx) = mpsc::channel::<()>(MEDIA_CHANNEL_CAPACITY);
    let watcher_handle = config
        .storage
        .watch
        .then(|| spawn_storage_watcher(config.player.root.clone(), media_tx, &cancel));

    info!(
        "player running, root: {}, volume: {}%",
        storage.root().display(),
        controls.volume.percent()
    );

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = async { tokio::signal::ctrl_c().await.ok(); } => {
                info!("received SIGINT, shutting down");
                cancel.cancel();
                break;
            }
            event = input.poll_or_wait() => match event {
                Some(event) => navigator.handle(event),
                None => {
                    info!("input queue closed");
                    break;
                }
            },
            Some(()) = media_rx.recv() => navigator.media_changed(),
        }
    }

    info!("player shutting down...");
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = arbiter_handle.await;
        let _ = console_handle.await;
        let _ = scan_handle.await;
        if let Some(handle) = watcher_handle {
            let _ = handle.await;
        }
    })
    .await;

    info!("player stopped");
    Ok(())
}

fn spawn_arbiter(
    config: &AppConfig,
    storage: &Arc<dyn Storage>,
    controls: &Arc<Controls>,
    cancel: &CancellationToken,
    greetings: Vec<PathBuf>,
) -> JoinHandle<()> {
    let output = audio_output(config);
    let engine = AudioEngine::new(
        output,
        Arc::clone(storage),
        config.audio.chunk_frames,
        Duration::from_millis(config.audio.pause_poll_ms),
    );
    let arbiter = Arbiter::new(
        engine,
        Arc::clone(controls),
        cancel.clone(),
        Duration::from_millis(config.audio.idle_poll_ms),
    );
    tokio::task::spawn_blocking(move || arbiter.run(greetings))
}

fn audio_output(config: &AppConfig) -> Box<dyn AudioOutput> {
    let write_timeout = Duration::from_millis(config.audio.write_timeout_ms);
    match config.audio.output {
        OutputKind::Device => {
            info!("audio output: default sound device");
            Box::new(CpalOutput::new(write_timeout))
        }
        OutputKind::Null => {
            info!("audio output: null sink");
            Box::new(PacedOutput::new(write_timeout))
        }
    }
}

fn spawn_console(
    bus: &Arc<ConsoleBus>,
    producer: &EdgeProducer,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let console_bus = Arc::clone(bus);
    let console_producer = producer.clone();
    let console_cancel = cancel.clone();
    tokio::spawn(async move {
        console::read_input_loop(console_bus, console_producer, console_cancel).await;
    })
}

fn spawn_button_scan(
    bus: Arc<ConsoleBus>,
    producer: EdgeProducer,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let period = config.input.scan_interval();
    let scan_cancel = cancel.clone();
    tokio::spawn(async move {
        input::scan::run(bus, producer, period, scan_cancel).await;
    })
}

fn spawn_storage_watcher(
    root: PathBuf,
    tx: mpsc::Sender<()>,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let watcher_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = watcher::watch_root(root, tx, watcher_cancel).await {
            error!("storage watcher error: {e}");
        }
    })
}
